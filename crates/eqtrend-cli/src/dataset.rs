//! The analysis table: one row per equation, joined with its score for
//! one backend.

use std::collections::HashMap;

use anyhow::Result;

use eqtrend_core::latex::clean;
use eqtrend_core::stats::Observation;
use eqtrend_core::{parse_centuries, parse_year, Backend, EquationStore, Origin, ScoreMetric};

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: String,
    pub source: String,
    pub eq_name: Option<String>,
    pub eq_raw: Option<String>,
    pub eq_parsed: Option<String>,
    pub person: Option<String>,
    pub year: Option<i64>,
    pub place: Option<String>,
    pub centuries: Option<f64>,
    pub ops: Option<u32>,
    pub depth: Option<u32>,
    pub nodes: Option<u32>,
    /// Scored by the backend, successfully or not.
    pub scored: bool,
    pub error: Option<String>,
    /// Wikipedia page, for per-page means.
    pub page: Option<String>,
}

impl Row {
    pub fn metric(&self, metric: ScoreMetric) -> Option<u32> {
        match metric {
            ScoreMetric::Ops => self.ops,
            ScoreMetric::Depth => self.depth,
            ScoreMetric::Nodes => self.nodes,
        }
    }

    pub fn parsed(&self) -> bool {
        self.scored && self.error.is_none()
    }

    /// Row as the statistics see it.
    pub fn observation(&self, metric: ScoreMetric) -> Observation {
        Observation {
            label: self.eq_name.clone(),
            latex: self.eq_raw.clone(),
            centuries: self.centuries,
            complexity: self.metric(metric).map(f64::from),
            place: self.place.clone(),
            page: self.page.clone(),
            parsed: self.parsed(),
        }
    }
}

pub fn load(store: &impl EquationStore, backend: Backend) -> Result<Vec<Row>> {
    let scores: HashMap<String, _> = store
        .scores(backend)?
        .into_iter()
        .map(|s| (s.equation_id.clone(), s))
        .collect();

    Ok(store
        .list()?
        .into_iter()
        .map(|eq| {
            let score = scores.get(&eq.id);
            let page = match &eq.origin {
                Origin::Wikipedia { page } => Some(page.clone()),
                Origin::Wikidata { .. } => None,
            };
            // the grammar backend keeps its tree; the others show the input
            let parsed = match score {
                Some(s) if s.parsed.is_some() => s.parsed.clone(),
                Some(s) if s.error.is_none() => eq.latex.as_deref().map(clean),
                _ => None,
            };
            Row {
                source: eq.origin.to_string(),
                eq_name: eq.label.clone(),
                eq_parsed: parsed,
                person: eq.person.clone(),
                year: eq.birth.as_deref().and_then(parse_year),
                place: eq.birth_place.clone(),
                centuries: eq.birth.as_deref().and_then(parse_centuries),
                ops: score.and_then(|s| s.ops),
                depth: score.and_then(|s| s.depth),
                nodes: score.and_then(|s| s.nodes),
                scored: score.is_some(),
                error: score.and_then(|s| s.error.clone()),
                page,
                eq_raw: eq.latex,
                id: eq.id,
            }
        })
        .collect())
}

pub fn observations(rows: &[Row], metric: ScoreMetric) -> Vec<Observation> {
    rows.iter().map(|r| r.observation(metric)).collect()
}
