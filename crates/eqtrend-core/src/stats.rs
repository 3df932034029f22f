//! Aggregation over scored equations: the numbers behind the report and
//! the plots.

use std::collections::HashMap;

/// One equation as the analysis sees it. Any field may be missing; each
/// analysis skips the rows it cannot use.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    pub label: Option<String>,
    pub latex: Option<String>,
    pub centuries: Option<f64>,
    pub complexity: Option<f64>,
    pub place: Option<String>,
    /// Wikipedia page the equation was scraped from.
    pub page: Option<String>,
    /// A backend parsed the formula. False for unscored and failed rows.
    pub parsed: bool,
}

/// How many rows lack each field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvalidCounts {
    pub total: usize,
    pub label: usize,
    pub latex: usize,
    pub parse: usize,
    pub time: usize,
    pub complexity: usize,
    pub place: usize,
}

impl InvalidCounts {
    pub fn of(rows: &[Observation]) -> Self {
        let mut c = Self {
            total: rows.len(),
            ..Self::default()
        };
        for r in rows {
            c.label += usize::from(r.label.is_none());
            c.latex += usize::from(r.latex.is_none());
            c.parse += usize::from(!r.parsed);
            c.time += usize::from(r.centuries.is_none());
            c.complexity += usize::from(r.complexity.is_none());
            c.place += usize::from(r.place.is_none());
        }
        c
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub n: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

pub fn summary(values: &[f64]) -> Option<Summary> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    let median = if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    };
    Some(Summary {
        n,
        mean: sorted.iter().sum::<f64>() / n as f64,
        median,
        min: sorted[0],
        max: sorted[n - 1],
    })
}

/// Ordinary least squares fit `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation coefficient.
    pub r: f64,
    pub n: usize,
}

pub fn linear_fit(points: &[(f64, f64)]) -> Option<LinearFit> {
    let pts: Vec<(f64, f64)> = points
        .iter()
        .copied()
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();
    let n = pts.len();
    if n < 2 {
        return None;
    }
    let nf = n as f64;
    let mx = pts.iter().map(|p| p.0).sum::<f64>() / nf;
    let my = pts.iter().map(|p| p.1).sum::<f64>() / nf;
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (x, y) in &pts {
        let (dx, dy) = (x - mx, y - my);
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    if sxx == 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    let r = if syy == 0.0 { 0.0 } else { sxy / (sxx * syy).sqrt() };
    Some(LinearFit {
        slope,
        intercept: my - slope * mx,
        r,
        n,
    })
}

/// Historical periods cut on century breaks. Bins are right-inclusive:
/// with breaks `[15, 18]` the periods are `(-inf, 15]`, `(15, 18]`, `(18, inf)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Periods {
    breaks: Vec<f64>,
    labels: Vec<String>,
}

impl Periods {
    pub fn new(mut breaks: Vec<f64>) -> Self {
        breaks.retain(|b| b.is_finite());
        breaks.sort_by(f64::total_cmp);
        breaks.dedup();
        let labels = if breaks.is_empty() {
            vec!["All".to_string()]
        } else {
            let mut labels = vec![format!("Before {}", breaks[0])];
            labels.extend(breaks.windows(2).map(|w| format!("{}-{}", w[0], w[1])));
            labels.push(format!("After {}", breaks[breaks.len() - 1]));
            labels
        };
        Self { breaks, labels }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Index of the period containing `centuries`.
    pub fn index_of(&self, centuries: f64) -> usize {
        self.breaks
            .iter()
            .position(|&b| centuries <= b)
            .unwrap_or(self.breaks.len())
    }

    pub fn label_of(&self, centuries: f64) -> &str {
        &self.labels[self.index_of(centuries)]
    }

    /// Complexity values grouped by period, in period order.
    pub fn split(&self, rows: &[Observation]) -> Vec<Vec<f64>> {
        let mut groups = vec![Vec::new(); self.labels.len()];
        for r in rows {
            if let (Some(t), Some(c)) = (r.centuries, r.complexity) {
                groups[self.index_of(t)].push(c);
            }
        }
        groups
    }

    /// Like [`Periods::split`], keeping only complexities below `cutoff`.
    pub fn split_below(&self, rows: &[Observation], cutoff: f64) -> Vec<Vec<f64>> {
        let mut groups = self.split(rows);
        for g in &mut groups {
            g.retain(|c| *c < cutoff);
        }
        groups
    }
}

impl Default for Periods {
    fn default() -> Self {
        Self::new(vec![15.0, 18.0])
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// numpy's `auto` rule: the larger bin count of Sturges and Freedman–Diaconis.
pub fn auto_bins(values: &[f64]) -> usize {
    let n = values.len();
    if n < 2 {
        return 1;
    }
    let sturges = (n as f64).log2().ceil() as usize + 1;

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let range = sorted[n - 1] - sorted[0];
    let iqr = quantile(&sorted, 0.75) - quantile(&sorted, 0.25);
    let fd = if iqr > 0.0 && range > 0.0 {
        let width = 2.0 * iqr / (n as f64).cbrt();
        (range / width).ceil() as usize
    } else {
        0
    };
    sturges.max(fd).max(1)
}

/// Linear-interpolated quantile of sorted data.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Equal-width histogram. The last bin is closed on the right.
pub fn histogram(values: &[f64], bins: usize) -> Vec<Bin> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || bins == 0 {
        return Vec::new();
    }
    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let mut max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == min {
        max = min + 1.0;
    }
    let width = (max - min) / bins as f64;
    let mut out: Vec<Bin> = (0..bins)
        .map(|i| Bin {
            start: min + width * i as f64,
            end: min + width * (i + 1) as f64,
            count: 0,
        })
        .collect();
    for v in finite {
        let idx = (((v - min) / width) as usize).min(bins - 1);
        out[idx].count += 1;
    }
    out
}

/// Most common values, ties broken alphabetically.
pub fn value_counts<'a>(values: impl IntoIterator<Item = &'a str>, top: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in values {
        *counts.entry(v).or_default() += 1;
    }
    let mut sorted: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted.truncate(top);
    sorted
}

/// Mean complexity per scraped page, pages without any scored equation
/// left out.
pub fn page_means(rows: &[Observation]) -> Vec<(String, f64)> {
    let mut acc: HashMap<&str, (f64, usize)> = HashMap::new();
    for r in rows {
        if let (Some(page), Some(c)) = (r.page.as_deref(), r.complexity) {
            let e = acc.entry(page).or_default();
            e.0 += c;
            e.1 += 1;
        }
    }
    let mut out: Vec<(String, f64)> = acc
        .into_iter()
        .map(|(p, (sum, n))| (p.to_string(), sum / n as f64))
        .collect();
    out.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}
