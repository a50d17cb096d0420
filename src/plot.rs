use std::{
    ops::Range,
    path::{Path, PathBuf},
};

use plotters::{prelude::*, series::DottedLineSeries};
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::{
    dataset::{StationCode, StationSeries},
    Error,
};

const SIZE: (u32, u32) = (1400, 500);
const SECONDS_PER_DAY: f64 = 86_400.0;

pub fn plot_path(dir: &Path, station: &StationCode) -> PathBuf {
    dir.join(format!("ts_{station}.png"))
}

/// Draws the temperature time series of a station in `dir/ts_<code>.png`.
/// The dotted line breaks wherever a reading was blanked.
pub fn plot_station(dir: &Path, series: &StationSeries) -> Result<PathBuf, Error> {
    let output = plot_path(dir, &series.station);
    draw(&output, series).map_err(|e| Error::Plot {
        station: series.station.clone(),
        reason: e.to_string(),
    })?;
    Ok(output)
}

fn draw(output: &Path, series: &StationSeries) -> Result<(), Box<dyn std::error::Error>> {
    // x is a fractional number of days since the epoch
    let points: Vec<Option<(f64, f64)>> = series
        .readings
        .iter()
        .map(|reading| {
            reading
                .temperature
                .map(|t| (days_since_epoch(reading.timestamp), t))
        })
        .collect();

    let x_range = padded_range(
        series.readings.iter().map(|r| days_since_epoch(r.timestamp)),
        0.5,
    )
    .unwrap_or(0.0..1.0);
    let y_range = padded_range(points.iter().flatten().map(|&(_, t)| t), 1.0).unwrap_or(10.0..41.0);

    let root = BitMapBackend::new(output, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(series.station.as_str(), ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .x_labels(10)
        .x_label_formatter(&|x| format_day(*x))
        .y_desc("°C")
        .draw()?;

    for run in points.split(Option::is_none) {
        chart.draw_series(DottedLineSeries::new(
            run.iter().flatten().copied(),
            0,
            4,
            |c| Circle::new(c, 1, BLUE.filled()),
        ))?;
    }
    chart.draw_series(
        points
            .iter()
            .flatten()
            .map(|&point| Circle::new(point, 3, BLUE.filled())),
    )?;

    root.present()?;
    Ok(())
}

fn days_since_epoch(timestamp: PrimitiveDateTime) -> f64 {
    timestamp.assume_utc().unix_timestamp() as f64 / SECONDS_PER_DAY
}

fn format_day(days: f64) -> String {
    OffsetDateTime::from_unix_timestamp((days * SECONDS_PER_DAY) as i64)
        .map(|datetime| datetime.date().to_string())
        .unwrap_or_default()
}

fn padded_range(values: impl Iterator<Item = f64>, pad: f64) -> Option<Range<f64>> {
    let (min, max) = values.fold(None, |range: Option<(f64, f64)>, v| match range {
        None => Some((v, v)),
        Some((min, max)) => Some((min.min(v), max.max(v))),
    })?;
    Some(min - pad..max + pad)
}
