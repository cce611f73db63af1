use anyhow::{Error, ensure};
use charming::{
    Chart, ImageFormat, ImageRenderer,
    component::{Axis, Grid, Legend, Title, VisualMap},
    datatype::DataPoint,
    element::{AxisLabel, AxisType, Label, LineStyle, SplitArea, SplitLine, Symbol, TextStyle},
    series::{Heatmap, Line},
};

use crate::stats::CorrelationMatrix;

const LINE_WIDTH: u32 = 1200;
const LINE_HEIGHT: u32 = 600;
const HEATMAP_WIDTH: u32 = 2400;
const HEATMAP_HEIGHT: u32 = 2000;

/// Single-series line chart of `values` against `dates`.
pub fn time_series(
    title: &str,
    column: &str,
    dates: &[String],
    values: &[f64],
) -> Result<Chart, Error> {
    ensure!(
        dates.len() == values.len(),
        "length mismatch: dates={}, values={}",
        dates.len(),
        values.len()
    );

    let chart = Chart::new()
        .background_color("#ffffff")
        .title(
            Title::new()
                .text(title)
                .left("center")
                .top("2%")
                .text_style(TextStyle::new().color("#202020").font_size(14)),
        )
        .legend(Legend::new().top("8%"))
        .x_axis(
            Axis::new()
                .type_(AxisType::Category)
                .name("Date")
                .data(dates.to_vec())
                .axis_label(AxisLabel::new().rotate(45).color("#505050")),
        )
        .y_axis(
            Axis::new()
                .type_(AxisType::Value)
                .name(column)
                .scale(true)
                .axis_label(AxisLabel::new().color("#505050"))
                .split_line(SplitLine::new().line_style(LineStyle::new().color("#e0e0e0"))),
        )
        .series(
            Line::new()
                .name(column)
                .data(values.to_vec())
                .symbol(Symbol::None)
                .line_style(LineStyle::new().width(1).color("#1f4eb4")),
        );

    Ok(chart)
}

/// Annotated heatmap of a correlation matrix, values shown to two decimals.
pub fn correlation_heatmap(title: &str, matrix: &CorrelationMatrix) -> Result<Chart, Error> {
    let n = matrix.names.len();
    ensure!(
        matrix.values.len() == n && matrix.values.iter().all(|row| row.len() == n),
        "correlation matrix is not {n}x{n}"
    );

    let mut cells: Vec<Vec<DataPoint>> = Vec::with_capacity(n * n);
    for (i, row) in matrix.values.iter().enumerate() {
        for (j, &r) in row.iter().enumerate() {
            cells.push(vec![
                DataPoint::from(j as f64),
                DataPoint::from(i as f64),
                DataPoint::from((r * 100.0).round() / 100.0),
            ]);
        }
    }

    let chart = Chart::new()
        .background_color("#ffffff")
        .title(Title::new().text(title).left("center").top("1%"))
        .grid(Grid::new().left("14%").right("8%").top("4%").bottom("14%"))
        .x_axis(
            Axis::new()
                .type_(AxisType::Category)
                .data(matrix.names.clone())
                .axis_label(AxisLabel::new().rotate(90))
                .split_area(SplitArea::new().show(true)),
        )
        .y_axis(
            Axis::new()
                .type_(AxisType::Category)
                .data(matrix.names.clone())
                .split_area(SplitArea::new().show(true)),
        )
        .visual_map(VisualMap::new().min(-1).max(1).calculable(true))
        .series(
            Heatmap::new()
                .name("correlation")
                .label(Label::new().show(true))
                .data(cells),
        );

    Ok(chart)
}

pub fn render_png(chart: &Chart, width: u32, height: u32) -> Result<Vec<u8>, Error> {
    let mut renderer = ImageRenderer::new(width, height);
    let png_bytes = renderer.render_format(ImageFormat::Png, chart)?;
    Ok(png_bytes)
}

pub fn render_time_series(
    title: &str,
    column: &str,
    dates: &[String],
    values: &[f64],
) -> Result<Vec<u8>, Error> {
    render_png(
        &time_series(title, column, dates, values)?,
        LINE_WIDTH,
        LINE_HEIGHT,
    )
}

pub fn render_correlation_heatmap(
    title: &str,
    matrix: &CorrelationMatrix,
) -> Result<Vec<u8>, Error> {
    render_png(
        &correlation_heatmap(title, matrix)?,
        HEATMAP_WIDTH,
        HEATMAP_HEIGHT,
    )
}
