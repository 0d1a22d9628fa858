use std::fmt;
use std::str::FromStr;

use chrono::format::{Fixed, Item, Numeric, StrftimeItems};
use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised while compiling a date pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatePatternError {
    /// The pattern is empty.
    #[error("date pattern must not be empty")]
    Empty,
    /// The pattern contains a letter run that is not a known token.
    #[error("unknown token '{token}' in date pattern '{pattern}'")]
    UnknownToken {
        /// Offending token.
        token: String,
        /// Full pattern.
        pattern: String,
    },
    /// Year, month or day is missing.
    #[error("date pattern '{pattern}' has no {component} component")]
    MissingComponent {
        /// `"year"`, `"month"` or `"day"`.
        component: &'static str,
        /// Full pattern.
        pattern: String,
    },
    /// A `%`-style pattern that `chrono` rejects.
    #[error("invalid strftime pattern '{0}'")]
    InvalidStrftime(String),
}

/// A literal that does not match the configured pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{text}' does not match date pattern '{pattern}'")]
pub struct DateParseError {
    /// Literal text.
    pub text: String,
    /// Pattern source.
    pub pattern: String,
}

/// A compiled date pattern such as `YYYY-mm-dd`.
///
/// Token patterns understand `YYYY`/`yyyy`, `YY`/`yy`, `MM`/`mm` and `DD`/`dd`;
/// every non-alphanumeric character is a literal separator. A pattern that
/// contains `%` is used as a `chrono` strftime format as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatePattern {
    source: String,
    format: String,
}

impl DatePattern {
    /// Compile a pattern.
    pub fn new(pattern: &str) -> Result<Self, DatePatternError> {
        let source = pattern.trim();
        if source.is_empty() {
            return Err(DatePatternError::Empty);
        }

        let format = if source.contains('%') {
            check_strftime(source)?;
            source.to_string()
        } else {
            translate_tokens(source)?
        };

        Ok(Self {
            source: source.to_string(),
            format,
        })
    }

    /// The pattern as configured.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The equivalent `chrono` format string.
    pub fn strftime(&self) -> &str {
        &self.format
    }

    /// Parse a literal into a calendar date.
    pub fn parse_date(&self, text: &str) -> Result<NaiveDate, DateParseError> {
        NaiveDate::parse_from_str(text.trim(), &self.format).map_err(|_| DateParseError {
            text: text.to_string(),
            pattern: self.source.clone(),
        })
    }
}

impl FromStr for DatePattern {
    type Err = DatePatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for DatePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// A strftime pattern must be valid and name a year, a month and a day
/// (or a year and a day of the year).
fn check_strftime(pattern: &str) -> Result<(), DatePatternError> {
    let (mut year, mut month, mut day) = (false, false, false);
    for item in StrftimeItems::new(pattern) {
        match item {
            Item::Error => return Err(DatePatternError::InvalidStrftime(pattern.to_string())),
            Item::Numeric(Numeric::Year | Numeric::YearMod100, _) => year = true,
            Item::Numeric(Numeric::Month, _)
            | Item::Fixed(Fixed::ShortMonthName | Fixed::LongMonthName) => month = true,
            Item::Numeric(Numeric::Day, _) => day = true,
            Item::Numeric(Numeric::Ordinal, _) => {
                month = true;
                day = true;
            }
            _ => {}
        }
    }
    require_components(pattern, year, month, day)
}

fn require_components(
    pattern: &str,
    year: bool,
    month: bool,
    day: bool,
) -> Result<(), DatePatternError> {
    for (present, component) in [(year, "year"), (month, "month"), (day, "day")] {
        if !present {
            return Err(DatePatternError::MissingComponent {
                component,
                pattern: pattern.to_string(),
            });
        }
    }
    Ok(())
}

fn translate_tokens(pattern: &str) -> Result<String, DatePatternError> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let (mut year, mut month, mut day) = (false, false, false);
    let mut i = 0usize;

    while i < chars.len() {
        let ch = chars[i];
        if !ch.is_ascii_alphanumeric() {
            out.push(ch);
            i += 1;
            continue;
        }

        let run_end = chars[i..]
            .iter()
            .position(|c| *c != ch)
            .map_or(chars.len(), |offset| i + offset);
        let token: String = chars[i..run_end].iter().collect();
        let spec = match token.as_str() {
            "YYYY" | "yyyy" => {
                year = true;
                "%Y"
            }
            "YY" | "yy" => {
                year = true;
                "%y"
            }
            "MM" | "mm" => {
                month = true;
                "%m"
            }
            "DD" | "dd" => {
                day = true;
                "%d"
            }
            _ => {
                return Err(DatePatternError::UnknownToken {
                    token,
                    pattern: pattern.to_string(),
                })
            }
        };
        out.push_str(spec);
        i = run_end;
    }

    require_components(pattern, year, month, day)?;
    Ok(out)
}
