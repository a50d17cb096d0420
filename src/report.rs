use std::path::Path;

use csv::{Reader, Writer};
use time::macros::format_description;

use crate::{
    dataset::{Dataset, MonthlyMeans, StationCode},
    Error,
};

pub const REPORT_HEADER: [&str; 13] = [
    "Codigo", "m01", "m02", "m03", "m04", "m05", "m06", "m07", "m08", "m09", "m10", "m11", "m12",
];
pub const DATASET_HEADER: [&str; 3] = ["Codigo", "Timestamp", "Temp"];

/// Writes one line per station, a month without data is an empty cell.
pub fn write_report(path: &Path, rows: &[MonthlyMeans]) -> Result<(), Error> {
    let output = |source| Error::Output {
        path: path.to_owned(),
        source,
    };

    let mut writer = Writer::from_path(path).map_err(output)?;
    writer.write_record(REPORT_HEADER).map_err(output)?;
    for row in rows {
        let mut record = Vec::with_capacity(REPORT_HEADER.len());
        record.push(row.station.to_string());
        record.extend(row.means.iter().map(|mean| format_value(*mean)));
        writer.write_record(&record).map_err(output)?;
    }
    writer.flush().map_err(|source| Error::Io {
        path: path.to_owned(),
        source,
    })
}

pub fn read_report(path: &Path) -> Result<Vec<MonthlyMeans>, Error> {
    let bad = |reason: String| Error::Report {
        path: path.to_owned(),
        reason,
    };
    let input = |source| Error::Read {
        path: path.to_owned(),
        source,
    };

    let mut reader = Reader::from_path(path).map_err(input)?;
    let header = reader.headers().map_err(input)?;
    if header.iter().ne(REPORT_HEADER) {
        return Err(bad(format!("unexpected header {header:?}")));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(input)?;
        let mut cells = record.iter();
        let station = StationCode::from(cells.next().unwrap_or_default());

        let mut means = [None; 12];
        for mean in means.iter_mut() {
            let cell = cells
                .next()
                .ok_or_else(|| bad(format!("missing months for {station}")))?;
            if !cell.is_empty() {
                let value: f64 = cell
                    .parse()
                    .map_err(|_| bad(format!("bad mean `{cell}` for {station}")))?;
                *mean = Some(value);
            }
        }

        rows.push(MonthlyMeans { station, means });
    }

    Ok(rows)
}

/// Full normalized dataset, before any filtering.
pub fn write_dataset(path: &Path, dataset: &Dataset) -> Result<(), Error> {
    let output = |source| Error::Output {
        path: path.to_owned(),
        source,
    };

    let mut writer = Writer::from_path(path).map_err(output)?;
    writer.write_record(DATASET_HEADER).map_err(output)?;
    for record in dataset.records() {
        writer
            .write_record([
                record.station.to_string(),
                record.timestamp.format(format_description!(
                    "[year]-[month]-[day] [hour]:[minute]:[second]"
                ))?,
                format_value(record.temperature),
            ])
            .map_err(output)?;
    }
    writer.flush().map_err(|source| Error::Io {
        path: path.to_owned(),
        source,
    })
}

// `{:?}` keeps the decimal point, `20.0` rather than `20`
fn format_value(value: Option<f64>) -> String {
    value.map(|v| format!("{v:?}")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::dataset::Record;

    #[test]
    fn report_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("medias_mensais.csv");

        let mut means = [None; 12];
        means[0] = Some(20.0);
        means[11] = Some(30.67);
        write_report(
            &path,
            &[MonthlyMeans {
                station: StationCode::from("A001"),
                means,
            }],
        )
        .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "Codigo,m01,m02,m03,m04,m05,m06,m07,m08,m09,m10,m11,m12\n\
             A001,20.0,,,,,,,,,,,30.67\n"
        );
    }

    #[test]
    fn report_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");

        let rows = vec![
            MonthlyMeans {
                station: StationCode::from("A001"),
                means: [
                    Some(25.1),
                    Some(25.37),
                    None,
                    Some(24.0),
                    None,
                    None,
                    Some(19.99),
                    None,
                    None,
                    Some(26.5),
                    None,
                    Some(10.01),
                ],
            },
            MonthlyMeans {
                station: StationCode::from("A002"),
                means: [None; 12],
            },
        ];
        write_report(&path, &rows).unwrap();

        assert_eq!(read_report(&path).unwrap(), rows);
    }

    #[test]
    fn foreign_tables_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.csv");
        std::fs::write(&path, "Codigo,Timestamp,Temp\nA001,2020-01-01 10:00:00,20.0\n").unwrap();

        assert!(matches!(read_report(&path), Err(Error::Report { .. })));
    }

    #[test]
    fn missing_report_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nowhere.csv");

        let err = read_report(&path).unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
        assert!(err.to_string().starts_with("Could not read"));
    }

    #[test]
    fn dataset_dump_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all_temp.csv");

        let mut dataset = Dataset::new();
        dataset.append(vec![
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
        ]);
        write_dataset(&path, &dataset).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "Codigo,Timestamp,Temp\n\
             A001,2020-01-01 10:00:00,25.3\n\
             A001,2020-01-01 11:00:00,\n"
        );
    }
}
