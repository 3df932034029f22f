use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// One scraped equation together with whatever context came with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Equation {
    pub id: String,
    pub origin: Origin,
    pub fetched_at: DateTime<Utc>,

    /// Name of the concept the equation defines ("Bernoulli's principle").
    pub label: Option<String>,
    /// Raw LaTeX as found in the alttext/annotation, still wrapped.
    pub latex: Option<String>,

    pub person: Option<String>,
    /// Raw Wikidata time literal, e.g. `1700-02-08T00:00:00Z`.
    pub birth: Option<String>,
    pub birth_place: Option<String>,
}

impl Equation {
    pub fn new(origin: Origin, latex: Option<String>) -> Self {
        Self {
            id: equation_id(&origin, latex.as_deref()),
            origin,
            fetched_at: Utc::now(),
            label: None,
            latex,
            person: None,
            birth: None,
            birth_place: None,
        }
    }
}

/// Stable id: the same formula from the same source always hashes the same,
/// so re-running a scrape upserts instead of duplicating.
pub fn equation_id(origin: &Origin, latex: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(origin.key().as_bytes());
    hasher.update([0u8]);
    hasher.update(latex.unwrap_or_default().as_bytes());
    hasher.finalize()[..8]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Origin {
    Wikidata { item: String },
    Wikipedia { page: String },
}

impl Origin {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Wikidata { .. } => "wikidata",
            Self::Wikipedia { .. } => "wikipedia",
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Wikidata { item } => item,
            Self::Wikipedia { page } => page,
        }
    }

    pub fn from_parts(kind: &str, key: String) -> Option<Self> {
        match kind {
            "wikidata" => Some(Self::Wikidata { item: key }),
            "wikipedia" => Some(Self::Wikipedia { page: key }),
            _ => None,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.key())
    }
}

/// How a formula was turned into a tree before measuring it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// LaTeX grammar built with LALRPOP.
    Grammar,
    /// In-process LaTeX → MathML conversion.
    Mathml,
    /// External `latexml` run, measured on its XMath trees.
    Latexml,
}

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::Grammar, Backend::Mathml, Backend::Latexml];
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grammar => write!(f, "grammar"),
            Self::Mathml => write!(f, "mathml"),
            Self::Latexml => write!(f, "latexml"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "grammar" => Ok(Self::Grammar),
            "mathml" => Ok(Self::Mathml),
            "latexml" => Ok(Self::Latexml),
            _ => Err(format!("invalid backend: {s}")),
        }
    }
}

/// Which scalar stands in for "complexity".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreMetric {
    #[default]
    Ops,
    Depth,
    Nodes,
}

impl fmt::Display for ScoreMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ops => write!(f, "ops"),
            Self::Depth => write!(f, "depth"),
            Self::Nodes => write!(f, "nodes"),
        }
    }
}

impl std::str::FromStr for ScoreMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ops" | "count" => Ok(Self::Ops),
            "depth" => Ok(Self::Depth),
            "nodes" => Ok(Self::Nodes),
            _ => Err(format!("invalid metric: {s}")),
        }
    }
}

/// Result of measuring one equation with one backend. A failed parse is
/// still a score: metrics are `None` and `error` says why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Score {
    pub equation_id: String,
    pub backend: Backend,
    pub ops: Option<u32>,
    pub depth: Option<u32>,
    pub nodes: Option<u32>,
    /// Rendered tree, when the backend produces one worth keeping.
    pub parsed: Option<String>,
    pub error: Option<String>,
    pub scored_at: DateTime<Utc>,
}

impl Score {
    pub fn measured(equation_id: String, backend: Backend, ops: u32, depth: u32, nodes: u32) -> Self {
        Self {
            equation_id,
            backend,
            ops: Some(ops),
            depth: Some(depth),
            nodes: Some(nodes),
            parsed: None,
            error: None,
            scored_at: Utc::now(),
        }
    }

    pub fn failed(equation_id: String, backend: Backend, error: impl Into<String>) -> Self {
        Self {
            equation_id,
            backend,
            ops: None,
            depth: None,
            nodes: None,
            parsed: None,
            error: Some(error.into()),
            scored_at: Utc::now(),
        }
    }

    pub fn metric(&self, metric: ScoreMetric) -> Option<u32> {
        match metric {
            ScoreMetric::Ops => self.ops,
            ScoreMetric::Depth => self.depth,
            ScoreMetric::Nodes => self.nodes,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub total_equations: usize,
    pub wikidata: usize,
    pub wikipedia: usize,
    pub with_birth: usize,
    /// (backend, scored ok, failed)
    pub scores: Vec<(Backend, usize, usize)>,
    pub oldest_fetch: Option<DateTime<Utc>>,
    pub newest_fetch: Option<DateTime<Utc>>,
}
