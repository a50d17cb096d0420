use std::{fmt, str::FromStr};

use logos::Logos;
use thiserror::Error;
use time::{Date, Month, PrimitiveDateTime, Time};

pub const TEMPERATURE_COLUMN: &str = "TEMPERATURA DO AR - BULBO SECO, HORARIA (°C)";

const DASHED_DATE_COLUMN: &str = "DATA (YYYY-MM-DD)";
const SLASHED_DATE_COLUMN: &str = "Data";
const UPPER_HOUR_COLUMN: &str = "HORA (UTC)";
const LOWER_HOUR_COLUMN: &str = "Hora UTC";

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t]+")] // Date and hour are joined by a single blank
enum Token {
    #[regex("[0-9]+")]
    Number,
    #[token("-")]
    Dash,
    #[token("/")]
    Slash,
    #[token(":")]
    Colon,
    #[token("UTC")]
    Utc,
}

/// The two header layouts found in INMET hourly exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// `DATA (YYYY-MM-DD)` and `HORA (UTC)`, rows like `2020-01-31;13:00`.
    Dashed,
    /// `Data` and `Hora UTC` (older files use `HORA (UTC)`), rows like
    /// `2020/01/31;1300 UTC`.
    Slashed { hour_column: &'static str },
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Unrecognized header, no `DATA (YYYY-MM-DD)` or `Data` column among {columns:?}")]
    Unrecognized { columns: Vec<String> },
}

impl Schema {
    pub fn detect<'a>(columns: impl IntoIterator<Item = &'a str>) -> Result<Self, SchemaError> {
        let columns: Vec<&str> = columns.into_iter().collect();

        if columns.contains(&DASHED_DATE_COLUMN) {
            Ok(Schema::Dashed)
        } else if columns.contains(&SLASHED_DATE_COLUMN) {
            let hour_column = if columns.contains(&LOWER_HOUR_COLUMN) {
                LOWER_HOUR_COLUMN
            } else {
                UPPER_HOUR_COLUMN
            };
            Ok(Schema::Slashed { hour_column })
        } else {
            Err(SchemaError::Unrecognized {
                columns: columns.iter().map(|c| c.to_string()).collect(),
            })
        }
    }

    pub fn date_column(&self) -> &'static str {
        match self {
            Schema::Dashed => DASHED_DATE_COLUMN,
            Schema::Slashed { .. } => SLASHED_DATE_COLUMN,
        }
    }

    pub fn hour_column(&self) -> &'static str {
        match self {
            Schema::Dashed => UPPER_HOUR_COLUMN,
            Schema::Slashed { hour_column } => hour_column,
        }
    }

    pub fn temperature_column(&self) -> &'static str {
        TEMPERATURE_COLUMN
    }

    pub fn format(&self) -> TimestampFormat {
        match self {
            Schema::Dashed => TimestampFormat::Dashed,
            Schema::Slashed { .. } => TimestampFormat::Slashed,
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "`{}` + `{}` as {}",
            self.date_column(),
            self.hour_column(),
            self.format()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFormat {
    /// `%Y-%m-%d %H:%M`
    Dashed,
    /// `%Y/%m/%d %H%M UTC`
    Slashed,
}

impl fmt::Display for TimestampFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampFormat::Dashed => f.write_str("%Y-%m-%d %H:%M"),
            TimestampFormat::Slashed => f.write_str("%Y/%m/%d %H%M UTC"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("Unexpected character `{0}`")]
    Lexing(String),
    #[error("Expected {expected}, found `{found}`")]
    Unexpected {
        expected: &'static str,
        found: String,
    },
    #[error("Bad number `{0}`")]
    BadNumber(String),
    #[error("Invalid timestamp: {0}")]
    InvalidComponent(#[from] time::error::ComponentRange),
}

impl TimestampFormat {
    pub fn parse(&self, s: &str) -> Result<PrimitiveDateTime, TimestampError> {
        let mut cursor = Cursor {
            lexer: Token::lexer(s),
        };

        let separator = match self {
            TimestampFormat::Dashed => Token::Dash,
            TimestampFormat::Slashed => Token::Slash,
        };

        let year: i32 = cursor.number("year")?;
        cursor.expect(&separator, "date separator")?;
        let month: u8 = cursor.number("month")?;
        cursor.expect(&separator, "date separator")?;
        let day: u8 = cursor.number("day")?;

        let (hour, minute) = match self {
            TimestampFormat::Dashed => {
                let hour = cursor.number("hour")?;
                cursor.expect(&Token::Colon, "`:`")?;
                (hour, cursor.number("minute")?)
            }
            TimestampFormat::Slashed => {
                let hhmm = cursor.expect(&Token::Number, "HHMM")?;
                if hhmm.len() != 4 {
                    return Err(TimestampError::Unexpected {
                        expected: "HHMM",
                        found: hhmm.to_string(),
                    });
                }
                let hour = parse_number(&hhmm[..2])?;
                let minute = parse_number(&hhmm[2..])?;
                cursor.expect(&Token::Utc, "`UTC`")?;
                (hour, minute)
            }
        };
        cursor.finish()?;

        let date = Date::from_calendar_date(year, Month::try_from(month)?, day)?;
        let time = Time::from_hms(hour, minute, 0)?;

        Ok(PrimitiveDateTime::new(date, time))
    }
}

struct Cursor<'s> {
    lexer: logos::Lexer<'s, Token>,
}

impl<'s> Cursor<'s> {
    fn expect(&mut self, expected: &Token, what: &'static str) -> Result<&'s str, TimestampError> {
        match self.lexer.next() {
            Some(Ok(token)) if token == *expected => Ok(self.lexer.slice()),
            Some(Ok(_)) => Err(TimestampError::Unexpected {
                expected: what,
                found: self.lexer.slice().to_string(),
            }),
            Some(Err(())) => Err(TimestampError::Lexing(self.lexer.slice().to_string())),
            None => Err(TimestampError::Unexpected {
                expected: what,
                found: String::from("end of input"),
            }),
        }
    }

    fn number<T: FromStr>(&mut self, what: &'static str) -> Result<T, TimestampError> {
        let slice = self.expect(&Token::Number, what)?;
        parse_number(slice)
    }

    fn finish(mut self) -> Result<(), TimestampError> {
        match self.lexer.next() {
            None => Ok(()),
            Some(_) => Err(TimestampError::Unexpected {
                expected: "end of input",
                found: self.lexer.slice().to_string(),
            }),
        }
    }
}

fn parse_number<T: FromStr>(s: &str) -> Result<T, TimestampError> {
    s.parse()
        .map_err(|_| TimestampError::BadNumber(s.to_string()))
}
