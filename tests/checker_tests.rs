use std::sync::Arc;
use std::thread;

use sqlranger::classifier::checker::{check_partition_usage, CheckerOptions, PartitionChecker};
use sqlranger::classifier::partition_spec::PartitionSpec;
use sqlranger::classifier::patterns::{AliasPolicy, RangeShape, ViolationKind};

mod support;

use support::{date_spec, day_spec, verdicts};

fn sales_checker() -> PartitionChecker {
    PartitionChecker::new(vec![day_spec("sales_history")])
}

fn kinds(checker: &PartitionChecker, sql: &str) -> Vec<ViolationKind> {
    checker.check_query(sql).into_iter().map(|v| v.kind).collect()
}

#[test]
fn point_filter_is_compliant() {
    let reports = sales_checker()
        .check_tables(
            "SELECT day, SUM(quantity) AS total_quantity FROM gridhive.fact.sales_history \
             WHERE product_id = 12345 AND store_id = 100 AND day = '2025-12-02'",
        )
        .expect("query parses");
    assert_eq!(verdicts(&reports), vec![("sales_history", None)]);
    assert_eq!(reports[0].shape, RangeShape::Point);
}

#[test]
fn between_and_conjoined_bounds_are_compliant() {
    let checker = PartitionChecker::new(vec![day_spec("sales_history"), day_spec("inventory_log")]);
    assert!(checker
        .check_query(
            "SELECT * FROM gridhive.fact.sales_history \
             WHERE day BETWEEN '2021-09-13' AND '2021-09-26' AND product_id = 789"
        )
        .is_empty());
    assert!(checker
        .check_query(
            "SELECT * FROM gridhive.fact.inventory_log \
             WHERE day >= '2021-09-13' AND day <= '2021-09-26' AND gridhive_id = 5"
        )
        .is_empty());
    assert!(checker
        .check_query(
            "SELECT * FROM gridhive.fact.inventory_log \
             WHERE '2021-09-13' <= day AND '2021-09-26' >= day"
        )
        .is_empty());
}

#[test]
fn missing_filter_without_where_clause() {
    let violations = sales_checker().check_query("SELECT * FROM gridhive.fact.sales_history");
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ViolationKind::MissingDayFilter);
    assert_eq!(violations[0].table_name, "sales_history");
    assert!(violations[0].message.contains("without a WHERE clause"));
}

#[test]
fn missing_filter_with_other_predicates() {
    let checker = PartitionChecker::new(vec![day_spec("inventory_log")]);
    let violations = checker.check_query(
        "SELECT * FROM gridhive.fact.inventory_log WHERE product_id = 12345 AND gridhive_id = 10",
    );
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ViolationKind::MissingDayFilter);
    assert!(violations[0].message.contains("without a 'day' column filter"));
}

#[test]
fn filters_outside_where_do_not_count() {
    let checker = sales_checker();
    assert_eq!(
        kinds(
            &checker,
            "SELECT day, quantity FROM gridhive.fact.sales_history WHERE quantity > 100"
        ),
        vec![ViolationKind::MissingDayFilter]
    );
    assert_eq!(
        kinds(
            &checker,
            "SELECT day, SUM(quantity) AS total FROM gridhive.fact.sales_history \
             GROUP BY day HAVING day = '2021-09-13'"
        ),
        vec![ViolationKind::MissingDayFilter]
    );
}

#[test]
fn or_branches_cannot_satisfy_the_filter() {
    let violations = sales_checker().check_query(
        "SELECT * FROM gridhive.fact.sales_history \
         WHERE (day = '2021-09-13' OR day = '2021-09-14') AND product_id = 100",
    );
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ViolationKind::MissingDayFilter);
    assert!(violations[0].message.contains("OR/NOT"));
}

#[test]
fn wrapped_columns_disable_partitioning() {
    let checker = PartitionChecker::new(vec![day_spec("sales_history"), day_spec("inventory_log")]);
    let violations = checker.check_query(
        "SELECT * FROM gridhive.fact.sales_history \
         WHERE DATE_FORMAT(day, '%Y-%m') = '2021-09' AND product_id = 100",
    );
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ViolationKind::DayFilterWithFunction);
    assert!(violations[0].message.contains("with a function"));

    assert_eq!(
        kinds(
            &checker,
            "SELECT * FROM gridhive.fact.inventory_log WHERE EXTRACT(YEAR FROM day) = 2021"
        ),
        vec![ViolationKind::DayFilterWithFunction]
    );
}

#[test]
fn special_syntax_wrappers_disable_partitioning() {
    let checker = PartitionChecker::new(vec![day_spec("t")]);
    for sql in [
        "SELECT * FROM t WHERE SUBSTRING(day, 1, 7) = '2021-09'",
        "SELECT * FROM t WHERE SUBSTRING(day FROM 1 FOR 10) = '2021-09-13'",
        "SELECT * FROM t WHERE TRIM(day) = '2021-09-13'",
        "SELECT * FROM t WHERE CASE WHEN day > '2021' THEN 1 ELSE 0 END = 1",
        "SELECT * FROM t WHERE CEIL(day) = 5",
    ] {
        assert_eq!(
            kinds(&checker, sql),
            vec![ViolationKind::DayFilterWithFunction],
            "{sql}"
        );
    }
}

#[test]
fn subqueries_inside_expressions_are_checked() {
    let checker = PartitionChecker::new(vec![day_spec("t")]);
    let reports = checker
        .check_tables("SELECT CASE WHEN 1 = 1 THEN (SELECT max(x) FROM t) END FROM u")
        .expect("query parses");
    assert_eq!(
        verdicts(&reports),
        vec![("t", Some(ViolationKind::MissingDayFilter))]
    );
}

#[test]
fn wrapping_a_compliant_filter_flips_the_verdict() {
    let checker = sales_checker();
    assert!(checker
        .check_query("SELECT * FROM sales_history WHERE day = '2021-09-13'")
        .is_empty());
    assert_eq!(
        kinds(
            &checker,
            "SELECT * FROM sales_history WHERE CAST(day AS DATE) = '2021-09-13'"
        ),
        vec![ViolationKind::DayFilterWithFunction]
    );
}

#[test]
fn single_bounds_are_not_finite() {
    let checker = PartitionChecker::new(vec![day_spec("sales_history"), day_spec("inventory_log")]);
    let violations = checker.check_query(
        "SELECT * FROM gridhive.fact.sales_history WHERE day >= '2021-09-13' AND product_id = 500",
    );
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ViolationKind::NoFiniteRange);
    assert!(violations[0].message.contains("finite date range"));

    assert_eq!(
        kinds(
            &checker,
            "SELECT * FROM gridhive.fact.inventory_log WHERE day <= '2021-09-26'"
        ),
        vec![ViolationKind::NoFiniteRange]
    );
}

#[test]
fn strict_operators_need_the_option() {
    let sql = "SELECT SUM(quantity) FROM gridhive.fact.sales_history \
               WHERE day > '2021-09-13' AND day < '2021-09-26' AND product_id = 456";
    assert_eq!(
        kinds(&sales_checker(), sql),
        vec![ViolationKind::NoFiniteRange]
    );

    let lenient = PartitionChecker::with_options(
        vec![date_spec("sales_history", "day", Some(20))],
        CheckerOptions {
            strict_bounds_are_finite: true,
            ..CheckerOptions::default()
        },
    )
    .expect("generic dialect is known");
    let reports = lenient.check_tables(sql).expect("query parses");
    assert!(reports[0].is_compliant());
    assert_eq!(reports[0].estimated_days, Some(12));
}

#[test]
fn multiple_partitioned_tables_are_reported_in_discovery_order() {
    let checker = PartitionChecker::new(vec![day_spec("inventory_log"), day_spec("sales_history")]);
    let reports = checker
        .check_tables(
            "SELECT a.day, b.quantity FROM gridhive.fact.sales_history a \
             JOIN gridhive.fact.inventory_log b ON a.day = b.day \
             WHERE a.day = '2021-09-13' AND b.day = '2021-09-13'",
        )
        .expect("query parses");
    assert_eq!(
        verdicts(&reports),
        vec![("sales_history", None), ("inventory_log", None)]
    );
}

#[test]
fn unconfigured_tables_never_appear() {
    let checker = sales_checker();
    assert!(checker
        .check_tables("SELECT * FROM gridhive.dim.products WHERE product_id = 12345")
        .expect("query parses")
        .is_empty());

    let reports = checker
        .check_tables(
            "SELECT a.day, b.product_name FROM gridhive.fact.sales_history a \
             JOIN gridhive.dim.products b ON a.product_id = b.id WHERE a.day = '2021-09-13'",
        )
        .expect("query parses");
    assert_eq!(verdicts(&reports), vec![("sales_history", None)]);
}

#[test]
fn filters_on_another_table_do_not_count() {
    let violations = sales_checker().check_query(
        "SELECT * FROM gridhive.fact.sales_history a JOIN gridhive.fact.inventory b ON a.day = b.day \
         WHERE '2021-09-13' <= b.day AND '2021-09-26' >= b.day",
    );
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ViolationKind::MissingDayFilter);
}

#[test]
fn table_and_column_names_are_case_insensitive() {
    let checker = PartitionChecker::new(vec![PartitionSpec::new("Sales_History", "DAY")
        .expect("valid spec")]);
    assert!(checker
        .check_query("SELECT * FROM gridhive.fact.SALES_HISTORY WHERE Day = '2021-09-13'")
        .is_empty());
}

#[test]
fn qualified_spec_names_match_qualified_references() {
    let checker = PartitionChecker::new(vec![day_spec("gridhive.fact.sales_history")]);
    let reports = checker
        .check_tables("SELECT day FROM gridhive.fact.sales_history WHERE day = '2025-12-02'")
        .expect("query parses");
    assert_eq!(verdicts(&reports), vec![("sales_history", None)]);
}

#[test]
fn custom_partition_column_names() {
    let checker = PartitionChecker::new(vec![PartitionSpec::new("log_table", "event_date")
        .expect("valid spec")]);
    assert!(checker
        .check_query("SELECT COUNT(*) FROM events.log_table WHERE event_date = '2025-12-02'")
        .is_empty());

    let violations =
        checker.check_query("SELECT COUNT(*) FROM events.log_table WHERE user_id = 123");
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].table_name, "log_table");
    assert!(violations[0].message.contains("event_date"));
}

#[test]
fn ctes_subqueries_and_unions_are_analyzed() {
    let checker = PartitionChecker::new(vec![day_spec("sales_history"), day_spec("inventory_log")]);
    assert!(checker
        .check_query(
            "WITH daily_totals AS (SELECT sum(quantity) AS total_qty FROM gridhive.fact.sales_history \
             WHERE day = '2025-12-01' AND store_id = 9) SELECT * FROM daily_totals"
        )
        .is_empty());
    assert!(checker
        .check_query(
            "SELECT total FROM (SELECT SUM(quantity) AS total FROM gridhive.fact.sales_history \
             WHERE day = '2021-09-13') subq"
        )
        .is_empty());

    let reports = checker
        .check_tables(
            "SELECT day FROM gridhive.fact.sales_history WHERE day = '2021-09-13' \
             UNION ALL SELECT day FROM gridhive.fact.inventory_log",
        )
        .expect("query parses");
    assert_eq!(
        verdicts(&reports),
        vec![
            ("sales_history", None),
            ("inventory_log", Some(ViolationKind::MissingDayFilter)),
        ]
    );
}

#[test]
fn every_union_branch_must_filter() {
    let checker = PartitionChecker::new(vec![day_spec("t")]);
    let violations = checker
        .check_query("SELECT * FROM t UNION ALL SELECT * FROM t WHERE day = '2021-09-13'");
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ViolationKind::MissingDayFilter);
    assert!(violations[0].message.contains("without a WHERE clause"));

    assert!(checker
        .check_query(
            "SELECT * FROM t WHERE day = '2021-09-12' \
             UNION ALL SELECT * FROM t WHERE day = '2021-09-13'"
        )
        .is_empty());
}

#[test]
fn filtered_subqueries_do_not_cover_an_unfiltered_outer_scan() {
    let checker = PartitionChecker::new(vec![day_spec("t")]);
    let reports = checker
        .check_tables(
            "SELECT * FROM t WHERE id IN (SELECT id FROM t WHERE day = '2021-09-13')",
        )
        .expect("query parses");
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].occurrences, 2);
    assert_eq!(
        reports[0].violation.as_ref().map(|v| v.kind),
        Some(ViolationKind::MissingDayFilter)
    );
}

#[test]
fn each_statement_is_checked() {
    let checker = PartitionChecker::new(vec![date_spec("t", "day", Some(7))]);
    let violations = checker.check_query(
        "SELECT * FROM t WHERE day BETWEEN '2021-09-01' AND '2021-09-15'; \
         SELECT * FROM t WHERE day = '2021-09-01'",
    );
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ViolationKind::ExcessiveDateRange);
    assert_eq!(violations[0].estimated_days, Some(15));

    let policies = [AliasPolicy::Any, AliasPolicy::All, AliasPolicy::First];
    for alias_policy in policies {
        let checker = PartitionChecker::with_options(
            vec![day_spec("t")],
            CheckerOptions {
                alias_policy,
                ..CheckerOptions::default()
            },
        )
        .expect("generic dialect is known");
        assert_eq!(
            kinds(
                &checker,
                "SELECT * FROM t WHERE day = '2021-09-01'; SELECT * FROM t"
            ),
            vec![ViolationKind::MissingDayFilter],
            "{alias_policy}"
        );
    }
}

#[test]
fn outer_filters_do_not_reach_into_subqueries() {
    let violations = sales_checker().check_query(
        "SELECT * FROM (SELECT * FROM sales_history) s WHERE s.day = '2021-09-13'",
    );
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ViolationKind::MissingDayFilter);
}

#[test]
fn invalid_sql_fails_open() {
    assert!(sales_checker()
        .check_query("THIS IS NOT VALID SQL !!!")
        .is_empty());
    assert!(sales_checker()
        .check_tables("THIS IS NOT VALID SQL !!!")
        .is_err());
}

#[test]
fn date_ranges_within_the_limit_pass() {
    let checker = PartitionChecker::new(vec![
        date_spec("sales_history", "day", Some(20)),
        date_spec("inventory_log", "day", Some(5)),
    ]);
    let reports = checker
        .check_tables(
            "SELECT * FROM gridhive.fact.sales_history WHERE day BETWEEN '2021-09-13' AND '2021-09-26'",
        )
        .expect("query parses");
    assert!(reports[0].is_compliant());
    assert_eq!(reports[0].estimated_days, Some(14));

    let reports = checker
        .check_tables("SELECT * FROM gridhive.fact.inventory_log WHERE day = '2021-09-13'")
        .expect("query parses");
    assert!(reports[0].is_compliant());
    assert_eq!(reports[0].estimated_days, Some(1));

    assert!(checker
        .check_query(
            "SELECT * FROM gridhive.fact.sales_history \
             WHERE day >= date('2021-09-13') AND day <= date('2021-09-26')"
        )
        .is_empty());
}

#[test]
fn excessive_ranges_report_the_estimate() {
    let checker = PartitionChecker::new(vec![date_spec("sales_history", "day", Some(100))]);
    let violations = checker.check_query(
        "SELECT * FROM gridhive.fact.sales_history WHERE day BETWEEN '2021-01-01' AND '2021-12-31'",
    );
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ViolationKind::ExcessiveDateRange);
    assert_eq!(violations[0].estimated_days, Some(365));
    assert_eq!(
        violations[0].message,
        "Table 'sales_history' has an excessive date range of approximately 365 days (max: 100)"
    );
}

#[test]
fn no_max_range_skips_the_range_check() {
    let specs = vec![
        day_spec("sales_history"),
        date_spec("inventory_log", "day", None),
    ];
    assert!(check_partition_usage(
        "SELECT * FROM gridhive.fact.sales_history WHERE day BETWEEN '2021-01-01' AND '2021-12-31'",
        &specs
    )
    .is_empty());
    assert!(check_partition_usage(
        "SELECT * FROM gridhive.fact.inventory_log WHERE day BETWEEN '2021-01-01' AND '2021-12-31'",
        &specs
    )
    .is_empty());
}

#[test]
fn joined_tables_are_limited_independently() {
    let specs = vec![
        date_spec("sales_history", "day", Some(7)),
        date_spec("log_table", "event_time", Some(30)),
    ];
    let sql = "SELECT a.day, b.event_time FROM gridhive.fact.sales_history a \
               JOIN events.log_table b ON a.day = b.event_time \
               WHERE a.day BETWEEN '2021-09-01' AND '2021-09-15' \
               AND b.event_time BETWEEN '2021-09-01' AND '2021-09-15'";

    let violations = check_partition_usage(sql, &specs);
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ViolationKind::ExcessiveDateRange);
    assert_eq!(violations[0].table_name, "sales_history");
    assert_eq!(violations[0].estimated_days, Some(15));
}

#[test]
fn unparseable_bounds_skip_estimation() {
    let checker = PartitionChecker::new(vec![date_spec("sales_history", "day", Some(1))]);
    assert!(checker
        .check_query(
            "SELECT * FROM sales_history WHERE day BETWEEN '2021-09-01' AND CURRENT_DATE"
        )
        .is_empty());
    assert!(checker
        .check_query(
            "SELECT * FROM sales_history WHERE day BETWEEN '2021-09-15' AND '2021-09-01'"
        )
        .is_empty());
}

#[test]
fn self_join_follows_the_alias_policy() {
    let sql = "SELECT * FROM events a JOIN events b ON a.id = b.id WHERE a.day = '2021-09-13'";
    let specs = vec![day_spec("events")];

    let any = PartitionChecker::new(specs.clone());
    assert!(any.check_query(sql).is_empty());

    let all = PartitionChecker::with_options(
        specs.clone(),
        CheckerOptions {
            alias_policy: AliasPolicy::All,
            ..CheckerOptions::default()
        },
    )
    .expect("generic dialect is known");
    let violations = all.check_query(sql);
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ViolationKind::MissingDayFilter);

    let first = PartitionChecker::with_options(
        specs,
        CheckerOptions {
            alias_policy: AliasPolicy::First,
            ..CheckerOptions::default()
        },
    )
    .expect("generic dialect is known");
    assert!(first.check_query(sql).is_empty());

    let reports = any.check_tables(sql).expect("query parses");
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].occurrences, 2);
}

#[test]
fn checks_are_idempotent() {
    let checker = PartitionChecker::new(vec![date_spec("sales_history", "day", Some(10))]);
    let sql = "SELECT * FROM sales_history WHERE day BETWEEN '2021-01-01' AND '2021-03-01'";
    assert_eq!(checker.check_query(sql), checker.check_query(sql));
    assert_eq!(checker.check_tables(sql), checker.check_tables(sql));
}

#[test]
fn checker_can_be_shared_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<PartitionChecker>();

    let checker = Arc::new(sales_checker());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let checker = Arc::clone(&checker);
            thread::spawn(move || {
                let sql = format!("SELECT * FROM sales_history WHERE day = '2021-09-1{i}'");
                checker.check_query(&sql).len()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().expect("thread should not panic"), 0);
    }
}
