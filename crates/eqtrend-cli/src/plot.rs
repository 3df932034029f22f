//! SVG charts for `eqtrend plot`.

use std::path::{Path, PathBuf};

use anyhow::Result;
use plotters::prelude::*;

use eqtrend_core::stats::{auto_bins, histogram, linear_fit, value_counts, Bin, Observation, Periods};
use eqtrend_core::time::centuries_to_year;

pub struct PlotOptions {
    pub size: (u32, u32),
    pub metric_name: String,
    pub top_places: usize,
    pub periods: Periods,
    /// Complexities at or above this are left out of the period histogram.
    pub outlier_cutoff: f64,
}

/// Padded axis range; a single value gets a unit-wide range around it.
fn padded(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() || !hi.is_finite() {
        return None;
    }
    let pad = if hi > lo { (hi - lo) * 0.05 } else { 0.5 };
    Some((lo - pad, hi + pad))
}

pub fn birth_places(path: &Path, obs: &[Observation], opts: &PlotOptions) -> Result<bool> {
    let places = value_counts(obs.iter().filter_map(|o| o.place.as_deref()), opts.top_places);
    if places.is_empty() {
        return Ok(false);
    }
    let n = places.len() as u32;
    let max = places.iter().map(|p| p.1).max().unwrap_or(1) as u32;

    let root = SVGBackend::new(path, opts.size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Birth places", ("sans-serif", 22))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(50)
        .build_cartesian_2d((0u32..n).into_segmented(), 0u32..max + 1)?;

    let label = |v: &SegmentValue<u32>| match v {
        SegmentValue::CenterOf(i) => places
            .get(*i as usize)
            .map(|p| p.0.clone())
            .unwrap_or_default(),
        _ => String::new(),
    };
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(places.len())
        .x_label_formatter(&label)
        .y_desc("Equations")
        .draw()?;

    chart.draw_series(
        Histogram::vertical(&chart)
            .style(BLUE.mix(0.7).filled())
            .margin(8)
            .data(places.iter().enumerate().map(|(i, p)| (i as u32, p.1 as u32))),
    )?;

    root.present()?;
    Ok(true)
}

pub fn complexity_time(path: &Path, obs: &[Observation], opts: &PlotOptions) -> Result<bool> {
    let points: Vec<(f64, f64)> = obs
        .iter()
        .filter_map(|o| Some((o.centuries?, o.complexity?)))
        .collect();
    let (Some(xr), Some(yr)) = (
        padded(points.iter().map(|p| p.0)),
        padded(points.iter().map(|p| p.1)),
    ) else {
        return Ok(false);
    };

    let root = SVGBackend::new(path, opts.size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Complexity ({}) over time", opts.metric_name),
            ("sans-serif", 22),
        )
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(xr.0..xr.1, yr.0.min(0.0)..yr.1)?;

    chart
        .configure_mesh()
        .x_desc("Birth (centuries since year 1)")
        .y_desc(opts.metric_name.as_str())
        .draw()?;

    chart.draw_series(
        points
            .iter()
            .map(|&(x, y)| Circle::new((x, y), 3, BLUE.mix(0.6).filled())),
    )?;

    if let Some(fit) = linear_fit(&points) {
        let line = vec![
            (xr.0, fit.slope * xr.0 + fit.intercept),
            (xr.1, fit.slope * xr.1 + fit.intercept),
        ];
        chart
            .draw_series(LineSeries::new(line, &RED))?
            .label(format!("slope {:.2}/century, r = {:.2}", fit.slope, fit.r))
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));
        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
    }

    root.present()?;
    Ok(true)
}

/// Histogram with the automatic bin rule, as one rectangle per bin.
fn histogram_chart(
    path: &Path,
    values: &[f64],
    caption: &str,
    x_desc: &str,
    size: (u32, u32),
) -> Result<bool> {
    let bins = histogram(values, auto_bins(values));
    let (Some(first), Some(last)) = (bins.first(), bins.last()) else {
        return Ok(false);
    };
    let max = bins.iter().map(|b| b.count).max().unwrap_or(1) as u32;

    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 22))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(first.start..last.end, 0u32..max + 1)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(x_desc)
        .y_desc("Count")
        .draw()?;

    chart.draw_series(bins.iter().map(|b| {
        Rectangle::new(
            [(b.start, 0), (b.end, b.count as u32)],
            BLUE.mix(0.6).filled(),
        )
    }))?;

    root.present()?;
    Ok(true)
}

pub fn years_distribution(path: &Path, obs: &[Observation], opts: &PlotOptions) -> Result<bool> {
    let years: Vec<f64> = obs
        .iter()
        .filter_map(|o| o.centuries)
        .map(|c| centuries_to_year(c) as f64)
        .collect();
    histogram_chart(path, &years, "Birth years", "Year", opts.size)
}

/// One translucent histogram per time period, overlaid on shared axes.
pub fn complexity_hist(path: &Path, obs: &[Observation], opts: &PlotOptions) -> Result<bool> {
    let groups: Vec<(&String, Vec<Bin>)> = opts
        .periods
        .labels()
        .iter()
        .zip(opts.periods.split_below(obs, opts.outlier_cutoff))
        .filter(|(_, values)| !values.is_empty())
        .map(|(label, values)| (label, histogram(&values, auto_bins(&values))))
        .collect();
    let bins = || groups.iter().flat_map(|(_, bins)| bins.iter());
    let (Some(lo), Some(hi)) = (
        bins().map(|b| b.start).reduce(f64::min),
        bins().map(|b| b.end).reduce(f64::max),
    ) else {
        return Ok(false);
    };
    let max = bins().map(|b| b.count).max().unwrap_or(1) as u32;

    let root = SVGBackend::new(path, opts.size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Complexity ({}) by time period", opts.metric_name),
            ("sans-serif", 22),
        )
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(lo..hi, 0u32..max + 1)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(opts.metric_name.as_str())
        .y_desc("Count")
        .draw()?;

    // Latest period first so the earliest one ends up on top.
    for (i, (label, bins)) in groups.iter().enumerate().rev() {
        let color = Palette99::pick(i).to_rgba();
        chart
            .draw_series(bins.iter().map(|b| {
                Rectangle::new(
                    [(b.start, 0), (b.end, b.count as u32)],
                    color.mix(0.5).filled(),
                )
            }))?
            .label(format!("Time period: {label}"))
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }
    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(true)
}

/// Draw every chart into `dir`. Charts without data are skipped.
pub fn plot_all(dir: &Path, obs: &[Observation], opts: &PlotOptions) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    type Chart = fn(&Path, &[Observation], &PlotOptions) -> Result<bool>;
    let charts: [(&str, Chart); 4] = [
        ("birth_places.svg", birth_places),
        ("complexity_time.svg", complexity_time),
        ("years_distribution.svg", years_distribution),
        ("complexity_hist.svg", complexity_hist),
    ];

    let mut written = Vec::new();
    for (name, draw) in charts {
        let path = dir.join(name);
        if draw(&path, obs, opts)? {
            written.push(path);
        } else {
            tracing::warn!(chart = name, "no data, skipped");
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{self, tests::sample_store};
    use eqtrend_core::{Backend, ScoreMetric};

    fn options() -> PlotOptions {
        PlotOptions {
            size: (640, 480),
            metric_name: "ops".into(),
            top_places: 10,
            periods: Periods::default(),
            outlier_cutoff: 100.0,
        }
    }

    #[test]
    fn test_padded() {
        assert_eq!(padded([1.0, 3.0].into_iter()), Some((0.9, 3.1)));
        assert_eq!(padded([2.0].into_iter()), Some((1.5, 2.5)));
        assert_eq!(padded(std::iter::empty()), None);
    }

    #[test]
    fn test_plot_all_writes_svgs() {
        let dir = tempfile::tempdir().unwrap();
        let rows = dataset::load(&sample_store(), Backend::Grammar).unwrap();
        let obs = dataset::observations(&rows, ScoreMetric::Ops);

        let written = plot_all(&dir.path().join("plots"), &obs, &options()).unwrap();
        assert_eq!(written.len(), 4);
        for path in &written {
            let svg = std::fs::read_to_string(path).unwrap();
            assert!(svg.contains("<svg"), "{}", path.display());
        }
    }

    #[test]
    fn test_empty_data_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let written = plot_all(dir.path(), &[], &options()).unwrap();
        assert!(written.is_empty());
        assert!(!dir.path().join("birth_places.svg").exists());
    }

    fn dated(centuries: f64, complexity: f64) -> Observation {
        Observation {
            centuries: Some(centuries),
            complexity: Some(complexity),
            parsed: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_complexity_hist_overlays_periods() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hist.svg");
        let obs = [dated(10.0, 3.0), dated(10.0, 5.0), dated(19.0, 7.0), dated(19.0, 400.0)];

        assert!(complexity_hist(&path, &obs, &options()).unwrap());
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("Time period: Before 15"));
        assert!(svg.contains("Time period: After 18"));
        // no rows in (15, 18]
        assert!(!svg.contains("Time period: 15-18"));
    }

    #[test]
    fn test_complexity_hist_only_outliers_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hist.svg");
        let obs = [dated(10.0, 100.0), dated(19.0, 250.0)];
        assert!(!complexity_hist(&path, &obs, &options()).unwrap());
        assert!(!path.exists());
    }
}
