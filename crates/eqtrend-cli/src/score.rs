//! Scoring: turn stored equations into per-backend complexity scores.

use std::time::Duration;

use anyhow::{Context, Result};

use eqtrend_core::xml::latexml::{embeddable, Latexml};
use eqtrend_core::xml::mathml::MathmlConverter;
use eqtrend_core::{parse_latex, Backend, EqResult, Equation, EquationStore, Score};
use eqtrend_store::SqliteStore;

use crate::config::LatexmlConfig;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ScoreRun {
    pub scored: usize,
    pub failed: usize,
}

impl ScoreRun {
    fn add(&mut self, score: &Score) {
        if score.error.is_some() {
            self.failed += 1;
        } else {
            self.scored += 1;
        }
    }
}

const NO_LATEX: &str = "no LaTeX source";

pub fn score_grammar(eq: &Equation) -> Score {
    let Some(latex) = eq.latex.as_deref() else {
        return Score::failed(eq.id.clone(), Backend::Grammar, NO_LATEX);
    };
    match parse_latex(latex) {
        Ok(expr) => {
            let mut score = Score::measured(
                eq.id.clone(),
                Backend::Grammar,
                expr.count_ops(),
                expr.depth(),
                expr.node_count(),
            );
            score.parsed = Some(expr.to_string());
            score
        }
        Err(e) => Score::failed(eq.id.clone(), Backend::Grammar, e.to_string()),
    }
}

pub fn score_mathml(conv: &MathmlConverter, eq: &Equation) -> Score {
    let Some(latex) = eq.latex.as_deref() else {
        return Score::failed(eq.id.clone(), Backend::Mathml, NO_LATEX);
    };
    match conv.measure(latex) {
        Ok(m) => Score::measured(eq.id.clone(), Backend::Mathml, m.ops, m.depth, m.nodes),
        Err(e) => Score::failed(eq.id.clone(), Backend::Mathml, e.to_string()),
    }
}

/// One tool run for the whole slice. A tool that cannot run at all is an
/// error; a formula it could not convert, or that cannot go into the batch
/// document, is a failed score.
pub fn score_latexml(tool: &Latexml, eqs: &[Equation]) -> EqResult<Vec<Score>> {
    let items: Vec<(String, String)> = eqs
        .iter()
        .filter_map(|e| Some((e.id.clone(), e.latex.clone()?)))
        .filter(|(_, latex)| embeddable(latex).is_ok())
        .collect();
    let metrics = tool.run(&items)?;

    Ok(eqs
        .iter()
        .map(|eq| {
            let Some(latex) = eq.latex.as_deref() else {
                return Score::failed(eq.id.clone(), Backend::Latexml, NO_LATEX);
            };
            if let Err(reason) = embeddable(latex) {
                return Score::failed(eq.id.clone(), Backend::Latexml, reason);
            }
            match metrics.get(&eq.id) {
                Some(m) => Score::measured(eq.id.clone(), Backend::Latexml, m.ops, m.depth, m.nodes),
                None => Score::failed(eq.id.clone(), Backend::Latexml, "no XMath in latexml output"),
            }
        })
        .collect())
}

/// Score every equation that has no score for `backend` yet, or all of
/// them with `force`.
pub fn run(
    store: &SqliteStore,
    backend: Backend,
    force: bool,
    latexml: &LatexmlConfig,
) -> Result<ScoreRun> {
    if force {
        let cleared = store.clear_scores(backend)?;
        tracing::info!(%backend, cleared, "rescoring everything");
    }
    let pending = store.unscored(backend)?;
    tracing::info!(%backend, pending = pending.len(), "scoring");

    let mut run = ScoreRun::default();
    match backend {
        Backend::Grammar => store.batch(|s| {
            for eq in &pending {
                let score = score_grammar(eq);
                run.add(&score);
                s.put_score(&score)?;
            }
            Ok(())
        })?,
        Backend::Mathml => {
            let conv = MathmlConverter::new().context("cannot set up MathML converter")?;
            store.batch(|s| {
                for eq in &pending {
                    let score = score_mathml(&conv, eq);
                    run.add(&score);
                    s.put_score(&score)?;
                }
                Ok(())
            })?
        }
        Backend::Latexml => {
            let tool = Latexml::new(
                latexml.command.as_str(),
                Duration::from_secs(latexml.timeout_secs),
            );
            let total = pending.len();
            for (i, chunk) in pending.chunks(latexml.batch_size.max(1)).enumerate() {
                let scores = score_latexml(&tool, chunk)
                    .with_context(|| format!("latexml batch {} failed", i + 1))?;
                store.batch(|s| {
                    for score in &scores {
                        run.add(score);
                        s.put_score(score)?;
                    }
                    Ok(())
                })?;
                tracing::info!(done = run.scored + run.failed, total, "latexml batch stored");
            }
        }
    }
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eqtrend_core::Origin;

    fn eq(item: &str, latex: Option<&str>) -> Equation {
        Equation::new(
            Origin::Wikidata { item: item.into() },
            latex.map(String::from),
        )
    }

    #[test]
    fn test_score_grammar() {
        let s = score_grammar(&eq("Q1", Some("{\\displaystyle E=mc^{2}}")));
        assert_eq!(s.ops, Some(3));
        assert_eq!(s.parsed.as_deref(), Some("(= E (* m (^ c 2)))"));
        assert!(s.error.is_none());

        let bad = score_grammar(&eq("Q2", Some("\\frac{")));
        assert!(bad.ops.is_none());
        assert!(bad.error.is_some());

        let none = score_grammar(&eq("Q3", None));
        assert_eq!(none.error.as_deref(), Some(NO_LATEX));
    }

    #[test]
    fn test_score_mathml() {
        let conv = MathmlConverter::new().unwrap();
        let s = score_mathml(&conv, &eq("Q1", Some("a+b")));
        assert!(s.error.is_none(), "{:?}", s.error);
        assert!(s.ops.unwrap() >= 1);
        assert!(s.depth.unwrap() >= 2);
    }

    #[test]
    fn test_latexml_without_tool_is_an_error() {
        let tool = Latexml::new("definitely-not-latexml-xyz", Duration::from_secs(1));
        assert!(score_latexml(&tool, &[eq("Q1", Some("x"))]).is_err());
        // nothing to convert: the tool is never started
        let scores = score_latexml(&tool, &[eq("Q1", None)]).unwrap();
        assert_eq!(scores[0].error.as_deref(), Some(NO_LATEX));
    }

    #[test]
    fn test_latexml_unbalanced_formula_fails_without_tool() {
        let tool = Latexml::new("definitely-not-latexml-xyz", Duration::from_secs(1));
        let scores = score_latexml(&tool, &[eq("Q1", Some("{\\displaystyle {a}"))]).unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].error.as_deref(), Some("unbalanced braces"));
        assert!(scores[0].ops.is_none());
    }

    #[test]
    fn test_run_scores_pending_only() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert(&eq("Q1", Some("a+b"))).unwrap();
        store.insert(&eq("Q2", Some("\\frac{"))).unwrap();
        let cfg = LatexmlConfig::default();

        let first = run(&store, Backend::Grammar, false, &cfg).unwrap();
        assert_eq!(first, ScoreRun { scored: 1, failed: 1 });

        let second = run(&store, Backend::Grammar, false, &cfg).unwrap();
        assert_eq!(second, ScoreRun::default());

        let forced = run(&store, Backend::Grammar, true, &cfg).unwrap();
        assert_eq!(forced, ScoreRun { scored: 1, failed: 1 });
        assert_eq!(store.scores(Backend::Grammar).unwrap().len(), 2);
    }
}
