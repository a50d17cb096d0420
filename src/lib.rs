use std::{
    fs, io,
    path::{Path, PathBuf},
};

use miette::Diagnostic;
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod dataset;
pub mod normalize;
pub mod plot;
pub mod report;
pub mod schema;

pub use dataset::{
    Dataset, FilterStats, MonthlyMeans, Reading, Record, StationCode, StationSeries,
};
pub use normalize::{FixedOffset, NormalizeError, RawTable, StationCodeError, StationCodeExtractor};
pub use schema::{Schema, SchemaError, TimestampError, TimestampFormat};

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Could not access {}", path.display())]
    #[diagnostic(code(clima::io))]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Could not detect the header of {}", path.display())]
    #[diagnostic(
        code(clima::schema),
        help("only the `DATA (YYYY-MM-DD)` and `Data` header layouts are known, check the header format manually")
    )]
    Schema {
        path: PathBuf,
        #[source]
        source: SchemaError,
    },
    #[error("Could not load {}", path.display())]
    #[diagnostic(code(clima::input))]
    Input {
        path: PathBuf,
        #[source]
        source: NormalizeError,
    },
    #[error("Could not write {}", path.display())]
    #[diagnostic(code(clima::output))]
    Output {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Could not read {}", path.display())]
    #[diagnostic(code(clima::read))]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Bad report {}: {reason}", path.display())]
    #[diagnostic(code(clima::report))]
    Report { path: PathBuf, reason: String },
    #[error("Could not plot station {station}: {reason}")]
    #[diagnostic(code(clima::plot))]
    Plot { station: StationCode, reason: String },
    #[error(transparent)]
    #[diagnostic(code(clima::timestamp))]
    Format(#[from] time::error::Format),
}

impl Error {
    fn io(path: &Path, source: io::Error) -> Self {
        Error::Io {
            path: path.to_owned(),
            source,
        }
    }

    fn input(path: &Path, source: NormalizeError) -> Self {
        Error::Input {
            path: path.to_owned(),
            source,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub report_name: String,
    /// Where to dump every normalized record, if anywhere.
    pub dump_dataset: Option<PathBuf>,
    pub plots: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("Automaticas_INMET"),
            output_dir: PathBuf::from("."),
            report_name: String::from("medias_mensais.csv"),
            dump_dataset: None,
            plots: true,
        }
    }
}

impl Config {
    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(&self.report_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub files: usize,
    pub records: usize,
    pub stations: usize,
    pub plots: usize,
    pub report: PathBuf,
}

/// Regular files of `dir`, sorted by name. Hidden files are skipped.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Reads one export and returns its records, tagged with the station code
/// found in the file name.
pub fn load_file(path: &Path, extractor: &impl StationCodeExtractor) -> Result<Vec<Record>, Error> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let station = extractor
        .extract(&file_name)
        .map_err(|e| Error::input(path, e.into()))?;

    let table = RawTable::read(path).map_err(|e| Error::input(path, e))?;
    let schema = Schema::detect(table.columns()).map_err(|source| Error::Schema {
        path: path.to_owned(),
        source,
    })?;
    let records = normalize::normalize(&table, schema, &station).map_err(|e| Error::input(path, e))?;

    info!(
        "{file_name}: {} records of station {station}, header {schema}",
        records.len()
    );
    Ok(records)
}

/// Loads every export then writes the monthly means of each station.
/// Nothing is written if any export fails to load.
pub fn run(config: &Config, extractor: &impl StationCodeExtractor) -> Result<Summary, Error> {
    let files = list_files(&config.input_dir)?;
    if files.is_empty() {
        warn!("no exports in {}", config.input_dir.display());
    }

    let mut dataset = Dataset::new();
    for file in &files {
        dataset.append(load_file(file, extractor)?);
    }
    info!("loaded {} records from {} files", dataset.len(), files.len());

    if let Some(path) = &config.dump_dataset {
        report::write_dataset(path, &dataset)?;
        info!("dumped the dataset to {}", path.display());
    }

    fs::create_dir_all(&config.output_dir).map_err(|e| Error::io(&config.output_dir, e))?;

    let mut rows = Vec::new();
    let mut plots = 0;
    for station in dataset.stations() {
        let series = dataset.station(&station);
        let FilterStats {
            outside_window,
            sentinels,
            outliers,
        } = series.stats;
        debug!(
            "{station}: kept {} readings, {outside_window} outside daytime, {sentinels} sentinels, {outliers} outliers",
            series.readings.len()
        );

        if config.plots {
            match plot::plot_station(&config.output_dir, &series) {
                Ok(path) => {
                    plots += 1;
                    debug!("plotted {}", path.display());
                }
                Err(e) => warn!("{e}"),
            }
        }

        rows.push(series.monthly_means());
    }

    let report = config.report_path();
    report::write_report(&report, &rows)?;
    info!("wrote {} stations to {}", rows.len(), report.display());

    Ok(Summary {
        files: files.len(),
        records: dataset.len(),
        stations: rows.len(),
        plots,
        report,
    })
}
