use std::{collections::HashSet, fmt, ops::RangeInclusive};

use time::{macros::time, Month, PrimitiveDateTime, Time};

/// Reported by the stations when the sensor could not take a reading.
pub const SENTINEL: f64 = -9999.0;
/// Plausible dry bulb temperatures, in °C. Anything else is an outlier.
pub const PLAUSIBLE_TEMPERATURE: RangeInclusive<f64> = 10.0..=41.0;
/// Clock time kept every day, both ends included.
pub const DAYTIME: RangeInclusive<Time> = time!(9:00)..=time!(21:00);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StationCode(String);

impl StationCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StationCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<String> for StationCode {
    fn from(code: String) -> Self {
        Self(code)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub station: StationCode,
    pub timestamp: PrimitiveDateTime,
    pub temperature: Option<f64>,
}

/// Every record of every file, in file order then row order.
/// Overlapping files are kept as is, nothing is deduplicated.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, records: Vec<Record>) {
        self.records.extend(records);
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct station codes, in the order they first show up.
    pub fn stations(&self) -> Vec<StationCode> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter(|record| seen.insert(&record.station))
            .map(|record| record.station.clone())
            .collect()
    }

    /// Rows of one station restricted to the daytime window, with the
    /// sentinel and implausible temperatures blanked.
    pub fn station(&self, code: &StationCode) -> StationSeries {
        let mut stats = FilterStats::default();
        let mut readings = Vec::new();

        for record in self.records.iter().filter(|record| &record.station == code) {
            if !DAYTIME.contains(&record.timestamp.time()) {
                stats.outside_window += 1;
                continue;
            }

            let temperature = match record.temperature {
                Some(t) if t == SENTINEL => {
                    stats.sentinels += 1;
                    None
                }
                Some(t) if !PLAUSIBLE_TEMPERATURE.contains(&t) => {
                    stats.outliers += 1;
                    None
                }
                t => t,
            };

            readings.push(Reading {
                timestamp: record.timestamp,
                temperature,
            });
        }

        StationSeries {
            station: code.clone(),
            readings,
            stats,
        }
    }
}

impl Extend<Record> for Dataset {
    fn extend<T: IntoIterator<Item = Record>>(&mut self, iter: T) {
        self.records.extend(iter)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub outside_window: usize,
    pub sentinels: usize,
    pub outliers: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub timestamp: PrimitiveDateTime,
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct StationSeries {
    pub station: StationCode,
    // Source order, blanked readings are kept
    pub readings: Vec<Reading>,
    pub stats: FilterStats,
}

impl StationSeries {
    /// Climatological mean of every calendar month, whatever the year.
    pub fn monthly_means(&self) -> MonthlyMeans {
        // Blanked readings stay in as zeros so the summation order only
        // depends on the row layout, they are left out of the count.
        let mut values: [Vec<f64>; 12] = Default::default();
        let mut counts = [0usize; 12];

        for reading in &self.readings {
            let month = reading.timestamp.month() as usize - 1;
            values[month].push(reading.temperature.unwrap_or(0.0));
            if reading.temperature.is_some() {
                counts[month] += 1;
            }
        }

        let mut means = [None; 12];
        for (month, mean) in means.iter_mut().enumerate() {
            if counts[month] > 0 {
                *mean = Some(round(sum(&values[month]) / counts[month] as f64, 2));
            }
        }

        MonthlyMeans {
            station: self.station.clone(),
            means,
        }
    }
}

const PAIRWISE_BLOCK: usize = 128;

/// First value plus the pairwise sum of the rest, the order a float64
/// `add.reduce` uses. Rounding of ties at 2 decimals depends on it.
pub fn sum(values: &[f64]) -> f64 {
    match values.split_first() {
        Some((first, rest)) => first + pairwise_sum(rest),
        None => 0.0,
    }
}

fn pairwise_sum(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 8 {
        values.iter().fold(-0.0, |acc, v| acc + v)
    } else if n <= PAIRWISE_BLOCK {
        let mut r = [0.0; 8];
        r.copy_from_slice(&values[..8]);
        let unrolled = n - n % 8;
        for chunk in values[8..unrolled].chunks_exact(8) {
            for (acc, v) in r.iter_mut().zip(chunk) {
                *acc += v;
            }
        }
        let mut res = ((r[0] + r[1]) + (r[2] + r[3])) + ((r[4] + r[5]) + (r[6] + r[7]));
        for v in &values[unrolled..] {
            res += v;
        }
        res
    } else {
        let mut half = n / 2;
        half -= half % 8;
        pairwise_sum(&values[..half]) + pairwise_sum(&values[half..])
    }
}

/// One line of the final report.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyMeans {
    pub station: StationCode,
    pub means: [Option<f64>; 12],
}

impl MonthlyMeans {
    pub fn month(&self, month: Month) -> Option<f64> {
        self.means[month as usize - 1]
    }
}

/// Rounds half to even on the scaled value, so `0.125` gives `0.12` and
/// `2.675` (really `2.67499…`) gives `2.67`.
pub fn round(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}
