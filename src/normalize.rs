use std::{fs, io, path::Path};

use csv::{ReaderBuilder, StringRecord};
use thiserror::Error;

use crate::{
    dataset::{Record, StationCode},
    schema::{Schema, TimestampError},
};

/// Station metadata lines sitting above the real header.
pub const PREAMBLE_LINES: usize = 8;

#[derive(Debug, Error)]
pub enum StationCodeError {
    #[error("`{file_name}` is too short to hold a {len} characters code at offset {start}")]
    TooShort {
        file_name: String,
        start: usize,
        len: usize,
    },
    #[error("No station code in `{0}`")]
    NoMatch(String),
}

/// Derives the station code from the base name of an export.
pub trait StationCodeExtractor {
    fn extract(&self, file_name: &str) -> Result<StationCode, StationCodeError>;
}

/// The code sits at a fixed character offset, `INMET_CO_DF_A001_BRASILIA_…`
/// holds `A001` at 12.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedOffset {
    pub start: usize,
    pub len: usize,
}

impl Default for FixedOffset {
    fn default() -> Self {
        Self { start: 12, len: 4 }
    }
}

impl StationCodeExtractor for FixedOffset {
    fn extract(&self, file_name: &str) -> Result<StationCode, StationCodeError> {
        let code: String = file_name.chars().skip(self.start).take(self.len).collect();
        if code.chars().count() != self.len {
            return Err(StationCodeError::TooShort {
                file_name: file_name.to_string(),
                start: self.start,
                len: self.len,
            });
        }
        Ok(StationCode::new(code))
    }
}

impl<F> StationCodeExtractor for F
where
    F: Fn(&str) -> Option<String>,
{
    fn extract(&self, file_name: &str) -> Result<StationCode, StationCodeError> {
        self(file_name)
            .map(StationCode::new)
            .ok_or_else(|| StationCodeError::NoMatch(file_name.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    StationCode(#[from] StationCodeError),
    #[error("Missing column `{0}`")]
    MissingColumn(&'static str),
    #[error("Line {line}: bad timestamp `{value}`")]
    Timestamp {
        line: u64,
        value: String,
        #[source]
        source: TimestampError,
    },
    #[error("Line {line}: bad temperature `{value}`")]
    Temperature { line: u64, value: String },
}

/// The tabular part of an export, cells kept as text.
#[derive(Debug, Clone)]
pub struct RawTable {
    columns: StringRecord,
    rows: Vec<StringRecord>,
}

impl RawTable {
    pub fn read(path: &Path) -> Result<Self, NormalizeError> {
        let bytes = fs::read(path)?;
        Self::parse(&decode_latin1(&bytes))
    }

    pub fn parse(text: &str) -> Result<Self, NormalizeError> {
        let body = text
            .splitn(PREAMBLE_LINES + 1, '\n')
            .nth(PREAMBLE_LINES)
            .unwrap_or("");

        // Exports end every line with a `;`, hence the flexible rows
        let mut reader = ReaderBuilder::new()
            .delimiter(b';')
            .flexible(true)
            .from_reader(body.as_bytes());

        let columns = reader.headers()?.clone();
        let rows = reader.records().collect::<Result<Vec<_>, _>>()?;

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn column(&self, name: &'static str) -> Result<usize, NormalizeError> {
        self.columns
            .iter()
            .position(|column| column == name)
            .ok_or(NormalizeError::MissingColumn(name))
    }
}

pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Turns every row into a record of `station`, keeping the row order.
pub fn normalize(
    table: &RawTable,
    schema: Schema,
    station: &StationCode,
) -> Result<Vec<Record>, NormalizeError> {
    let date_idx = table.column(schema.date_column())?;
    let hour_idx = table.column(schema.hour_column())?;
    let temperature_idx = table.column(schema.temperature_column())?;
    let format = schema.format();

    let mut records = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let line = row.position().map_or(0, |p| p.line()) + PREAMBLE_LINES as u64;

        let value = format!(
            "{} {}",
            row.get(date_idx).unwrap_or_default(),
            row.get(hour_idx).unwrap_or_default()
        );
        let timestamp = match format.parse(&value) {
            Ok(timestamp) => timestamp,
            Err(source) => {
                return Err(NormalizeError::Timestamp {
                    line,
                    value,
                    source,
                })
            }
        };

        let temperature = parse_temperature(row.get(temperature_idx).unwrap_or_default()).map_err(
            |value| NormalizeError::Temperature { line, value },
        )?;

        records.push(Record {
            station: station.clone(),
            timestamp,
            temperature,
        });
    }

    Ok(records)
}

/// `,` is the decimal mark, an empty cell is a missing reading.
fn parse_temperature(cell: &str) -> Result<Option<f64>, String> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(None);
    }

    match cell.replace(',', ".").parse::<f64>() {
        Ok(t) if t.is_nan() => Ok(None),
        Ok(t) => Ok(Some(t)),
        Err(_) => Err(cell.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::schema::TEMPERATURE_COLUMN;

    const PREAMBLE: &str = "REGIAO:;CO\nUF:;DF\nESTACAO:;BRASILIA\nCODIGO (WMO):;A001\n\
        LATITUDE:;-15,78944444\nLONGITUDE:;-47,92583332\nALTITUDE:;1160,96\n\
        DATA DE FUNDACAO:;07/05/00\n";

    fn raw_table(header: &str, rows: &[&str]) -> RawTable {
        let mut text = String::from(PREAMBLE);
        text.push_str(header);
        text.push('\n');
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        RawTable::parse(&text).unwrap()
    }

    fn dashed_header() -> String {
        format!("DATA (YYYY-MM-DD);HORA (UTC);PRECIPITAÇÃO TOTAL, HORÁRIO (mm);{TEMPERATURE_COLUMN};")
    }

    #[test]
    fn fixed_offset_reads_inmet_names() {
        let code = FixedOffset::default()
            .extract("INMET_CO_DF_A001_BRASILIA_01-01-2020_A_31-12-2020.CSV")
            .unwrap();
        assert_eq!(code.as_str(), "A001");

        let code = FixedOffset { start: 0, len: 3 }.extract("XYZ.csv").unwrap();
        assert_eq!(code.as_str(), "XYZ");
    }

    #[test]
    fn fixed_offset_rejects_short_names() {
        assert!(matches!(
            FixedOffset::default().extract("INMET_CO_DF_A0"),
            Err(StationCodeError::TooShort { .. })
        ));
    }

    #[test]
    fn closures_are_extractors() {
        let by_prefix = |name: &str| name.split('_').next().map(str::to_string);
        assert_eq!(by_prefix.extract("83377_2020.csv").unwrap().as_str(), "83377");

        let never = |_: &str| -> Option<String> { None };
        assert!(matches!(
            never.extract("whatever.csv"),
            Err(StationCodeError::NoMatch(_))
        ));
    }

    #[test]
    fn latin1_is_decoded_byte_per_char() {
        assert_eq!(decode_latin1(b"(\xb0C) PRECIPITA\xc7\xc3O"), "(°C) PRECIPITAÇÃO");
    }

    #[test]
    fn preamble_is_skipped() {
        let table = raw_table(&dashed_header(), &["2020-01-01;10:00;0;25,3;"]);
        let columns: Vec<_> = table.columns().collect();
        assert_eq!(columns[0], "DATA (YYYY-MM-DD)");
        assert_eq!(columns[3], TEMPERATURE_COLUMN);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn normalizes_dashed_rows() {
        let table = raw_table(
            &dashed_header(),
            &[
                "2020-01-01;10:00;0;25,3;",
                "2020-01-01;11:00;0;;",
                "2020-01-01;12:00;0;-9999;",
            ],
        );
        let schema = Schema::detect(table.columns()).unwrap();
        let records = normalize(&table, schema, &StationCode::from("A001")).unwrap();

        assert_eq!(
            records,
            vec![
                Record {
                    station: StationCode::from("A001"),
                    timestamp: datetime!(2020-01-01 10:00),
                    temperature: Some(25.3),
                },
                Record {
                    station: StationCode::from("A001"),
                    timestamp: datetime!(2020-01-01 11:00),
                    temperature: None,
                },
                Record {
                    station: StationCode::from("A001"),
                    timestamp: datetime!(2020-01-01 12:00),
                    temperature: Some(-9999.0),
                },
            ]
        );
    }

    #[test]
    fn normalizes_slashed_rows() {
        let header = format!("Data;Hora UTC;{TEMPERATURE_COLUMN};");
        let table = raw_table(&header, &["2019/07/04;1300 UTC;18,5;"]);
        let schema = Schema::detect(table.columns()).unwrap();
        let records = normalize(&table, schema, &StationCode::from("A002")).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].timestamp, datetime!(2019-07-04 13:00));
        assert_eq!(records[0].temperature, Some(18.5));
    }

    #[test]
    fn missing_columns_are_fatal() {
        let table = raw_table("Data;HORA (UTC);UMIDADE;", &["2019/07/04;1300 UTC;80;"]);
        let schema = Schema::detect(table.columns()).unwrap();
        assert!(matches!(
            normalize(&table, schema, &StationCode::from("A001")),
            Err(NormalizeError::MissingColumn(TEMPERATURE_COLUMN))
        ));

        let header = format!("Data;{TEMPERATURE_COLUMN};");
        let table = raw_table(&header, &["2019/07/04;20;"]);
        let schema = Schema::detect(table.columns()).unwrap();
        assert!(matches!(
            normalize(&table, schema, &StationCode::from("A001")),
            Err(NormalizeError::MissingColumn("HORA (UTC)"))
        ));
    }

    #[test]
    fn bad_timestamp_reports_its_line() {
        let table = raw_table(
            &dashed_header(),
            &["2020-01-01;10:00;0;20;", "2020/01/01;11:00;0;20;"],
        );
        let schema = Schema::detect(table.columns()).unwrap();
        match normalize(&table, schema, &StationCode::from("A001")) {
            Err(NormalizeError::Timestamp { line, value, .. }) => {
                assert_eq!(line, 11);
                assert_eq!(value, "2020/01/01 11:00");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bad_temperature_is_fatal() {
        let table = raw_table(&dashed_header(), &["2020-01-01;10:00;0;warm;"]);
        let schema = Schema::detect(table.columns()).unwrap();
        assert!(matches!(
            normalize(&table, schema, &StationCode::from("A001")),
            Err(NormalizeError::Temperature { line: 10, .. })
        ));
    }
}
