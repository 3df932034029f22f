//! Text report for `eqtrend analyze`.

use std::fmt::Write;

use eqtrend_core::stats::{
    linear_fit, page_means, summary, value_counts, InvalidCounts, Observation, Periods, Summary,
};
use eqtrend_core::time::centuries_to_year;
use eqtrend_fetch::wikipedia::page_title;

pub struct ReportOptions {
    pub title: String,
    pub periods: Periods,
    pub top_places: usize,
}

fn summary_line(s: Option<Summary>) -> String {
    match s {
        Some(s) => format!(
            "n={:<5} mean={:<7.2} median={:<6.1} min={:<4} max={}",
            s.n, s.mean, s.median, s.min, s.max
        ),
        None => "no data".into(),
    }
}

pub fn render(obs: &[Observation], opts: &ReportOptions) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", opts.title);
    let _ = writeln!(out, "{}", "=".repeat(opts.title.chars().count()));

    let missing = InvalidCounts::of(obs);
    let _ = writeln!(out, "\nMissing values ({} rows)", missing.total);
    for (name, n) in [
        ("label", missing.label),
        ("latex", missing.latex),
        ("parse", missing.parse),
        ("time", missing.time),
        ("complexity", missing.complexity),
        ("place", missing.place),
    ] {
        let _ = writeln!(out, "  {name:<11} {n}");
    }

    let complexities: Vec<f64> = obs.iter().filter_map(|o| o.complexity).collect();
    let _ = writeln!(out, "\nComplexity\n  {}", summary_line(summary(&complexities)));

    let _ = writeln!(out, "\nBy period");
    for (label, group) in opts.periods.labels().iter().zip(opts.periods.split(obs)) {
        let _ = writeln!(out, "  {label:<10} {}", summary_line(summary(&group)));
    }

    let points: Vec<(f64, f64)> = obs
        .iter()
        .filter_map(|o| Some((o.centuries?, o.complexity?)))
        .collect();
    let _ = writeln!(out, "\nTrend (complexity vs. centuries)");
    match linear_fit(&points) {
        Some(fit) => {
            let _ = writeln!(
                out,
                "  slope={:.3} per century  intercept={:.3}  r={:.3}  n={}",
                fit.slope, fit.intercept, fit.r, fit.n
            );
            if let (Some(lo), Some(hi)) = (
                points.iter().map(|p| p.0).reduce(f64::min),
                points.iter().map(|p| p.0).reduce(f64::max),
            ) {
                let _ = writeln!(
                    out,
                    "  births span {} to {}",
                    centuries_to_year(lo),
                    centuries_to_year(hi)
                );
            }
        }
        None => {
            let _ = writeln!(out, "  not enough dated scores");
        }
    }

    let places = value_counts(obs.iter().filter_map(|o| o.place.as_deref()), opts.top_places);
    if !places.is_empty() {
        let _ = writeln!(out, "\nTop birth places");
        for (place, n) in &places {
            let _ = writeln!(out, "  {n:>4}  {place}");
        }
    }

    let pages = page_means(obs);
    if !pages.is_empty() {
        let _ = writeln!(out, "\nMost complex pages ({} scored)", pages.len());
        for (page, mean) in pages.iter().take(opts.top_places) {
            let _ = writeln!(out, "  {mean:>7.2}  {}", page_title(page));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{self, tests::sample_store};
    use eqtrend_core::{Backend, ScoreMetric};

    fn options() -> ReportOptions {
        ReportOptions {
            title: "grammar / ops".into(),
            periods: Periods::default(),
            top_places: 10,
        }
    }

    #[test]
    fn test_report_sections() {
        let rows = dataset::load(&sample_store(), Backend::Grammar).unwrap();
        let obs = dataset::observations(&rows, ScoreMetric::Ops);
        let text = render(&obs, &options());

        assert!(text.starts_with("grammar / ops\n============="));
        assert!(text.contains("Missing values (4 rows)"));
        // the broken formula failed to parse and so has no complexity
        assert!(text.contains("  parse       1"));
        assert!(text.contains("  complexity  1"));
        assert!(text.contains("Before 15"));
        assert!(text.contains("After 18"));
        assert!(text.contains("Basel"));
        assert!(text.contains("Ohm's law"));
        assert!(text.contains("slope="));
    }

    #[test]
    fn test_report_on_empty_data() {
        let text = render(&[], &options());
        assert!(text.contains("Missing values (0 rows)"));
        assert!(text.contains("  parse       0"));
        assert!(text.contains("no data"));
        assert!(text.contains("not enough dated scores"));
        assert!(!text.contains("Top birth places"));
    }
}
