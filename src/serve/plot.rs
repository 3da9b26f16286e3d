//! Time-series plot rendering.
//!
//! Each plot is drawn with plotters into an RGB buffer and PNG-encoded in
//! memory. Axis labels follow the original dashboard: rotated m/d/y H:M
//! timestamps on x, a horizontal grid on y.

use chrono::{DateTime, Utc};
use image::{ImageFormat, RgbImage};
use plotters::prelude::*;
use thiserror::Error;

use crate::api::VehicleSnapshot;

const WIDTH: u32 = 1000;
const HEIGHT: u32 = 600;

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("no telemetry recorded yet")]
    NoData,

    #[error("failed to render plot: {0}")]
    Render(String),

    #[error("failed to encode plot as png: {0}")]
    Encode(String),
}

/// Which series to plot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotSeries {
    Charge,
    Mileage,
    Range,
}

impl PlotSeries {
    pub fn title(self) -> &'static str {
        match self {
            PlotSeries::Charge => "Charging Level Over Time",
            PlotSeries::Mileage => "Total Miles",
            PlotSeries::Range => "Estimated Driving Range",
        }
    }

    pub fn y_label(self) -> &'static str {
        match self {
            PlotSeries::Charge => "%",
            PlotSeries::Mileage => "Miles",
            PlotSeries::Range => "Miles",
        }
    }

    pub fn value(self, snapshot: &VehicleSnapshot) -> f64 {
        match self {
            PlotSeries::Charge => snapshot.charge_percent,
            PlotSeries::Mileage => snapshot.odometer,
            PlotSeries::Range => snapshot.range_estimate,
        }
    }
}

/// y-axis bounds with a little headroom; flat series still get a band.
fn y_bounds(values: &[f64]) -> (f64, f64) {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let pad = ((max - min) * 0.1).max(1.0);
    (min - pad, max + pad)
}

fn format_timestamp(secs: f64) -> String {
    DateTime::<Utc>::from_timestamp(secs as i64, 0)
        .map(|dt| dt.format("%m/%d/%y %H:%M").to_string())
        .unwrap_or_default()
}

/// Render one series from the full log as a PNG.
pub fn render_png(snapshots: &[VehicleSnapshot], series: PlotSeries) -> Result<Vec<u8>, PlotError> {
    if snapshots.is_empty() {
        return Err(PlotError::NoData);
    }

    let points: Vec<(f64, f64)> = snapshots
        .iter()
        .map(|s| (s.timestamp.timestamp() as f64, series.value(s)))
        .collect();

    let values: Vec<f64> = points.iter().map(|(_, y)| *y).collect();
    let (y_min, y_max) = y_bounds(&values);
    let x_min = points.first().map(|(x, _)| *x).unwrap_or(0.0);
    let x_max = points.last().map(|(x, _)| *x).unwrap_or(0.0);
    // a single point still needs a non-degenerate x range
    let x_max = if x_max > x_min { x_max } else { x_min + 1.0 };

    let mut buffer = vec![0u8; (WIDTH * HEIGHT * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| PlotError::Render(e.to_string()))?;

        let mut chart = ChartBuilder::on(&root)
            .caption(series.title(), ("sans-serif", 28))
            .margin(20)
            .x_label_area_size(70)
            .y_label_area_size(60)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)
            .map_err(|e| PlotError::Render(e.to_string()))?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(8)
            .x_label_formatter(&|x| format_timestamp(*x))
            .x_label_style(("sans-serif", 14).into_font().transform(FontTransform::Rotate90))
            .y_desc(series.y_label())
            .draw()
            .map_err(|e| PlotError::Render(e.to_string()))?;

        chart
            .draw_series(LineSeries::new(points.iter().copied(), &BLUE))
            .map_err(|e| PlotError::Render(e.to_string()))?;
        chart
            .draw_series(
                points
                    .iter()
                    .map(|(x, y)| Circle::new((*x, *y), 3, BLUE.filled())),
            )
            .map_err(|e| PlotError::Render(e.to_string()))?;

        root.present().map_err(|e| PlotError::Render(e.to_string()))?;
    }

    let img = RgbImage::from_raw(WIDTH, HEIGHT, buffer)
        .ok_or_else(|| PlotError::Encode("buffer size mismatch".to_string()))?;

    let mut png = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| PlotError::Encode(e.to_string()))?;

    Ok(png)
}
