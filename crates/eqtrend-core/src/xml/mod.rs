//! Structure metrics over XML renderings of a formula (MathML from the
//! in-process converter, XMath from LaTeXML).

pub mod latexml;
pub mod mathml;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{EqError, EqResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeMetrics {
    /// A single leaf element has depth 1.
    pub depth: u32,
    /// Element count, text nodes excluded.
    pub nodes: u32,
    pub ops: u32,
}

/// Which XML vocabulary is being measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Mathml,
    Xmath,
}

/// `mo` contents that group or separate rather than operate.
const FENCES: &[&str] = &[
    "", "(", ")", "[", "]", "{", "}", "|", "‖", "⟨", "⟩", ",", ";", ".", ":",
];

impl Dialect {
    fn root(self) -> &'static [u8] {
        match self {
            Self::Mathml => b"math",
            Self::Xmath => b"XMath",
        }
    }

    /// Elements that are an operation by themselves, whatever their content.
    fn is_structural_op(self, name: &[u8]) -> bool {
        match self {
            Self::Mathml => matches!(
                name,
                b"mfrac" | b"msqrt" | b"mroot" | b"msup" | b"msubsup" | b"munderover"
            ),
            Self::Xmath => name == b"XMApp",
        }
    }
}

/// One measured subtree, with the label of the LaTeXML `equation` around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subtree {
    pub label: Option<String>,
    pub metrics: TreeMetrics,
}

#[derive(Default)]
struct Walk {
    level: u32,
    metrics: TreeMetrics,
    /// Text of the `mo` currently open, if any.
    mo_text: Option<String>,
}

fn attr_value(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Measure every subtree rooted at the dialect's root element.
pub fn measure_subtrees(xml: &str, dialect: Dialect) -> EqResult<Vec<Subtree>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let root = dialect.root();
    let mut out = Vec::new();
    let mut label: Option<String> = None;
    let mut walk: Option<Walk> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| EqError::Parse(format!("malformed xml: {e}")))?;
        match event {
            Event::Start(ref e) => {
                let name = e.local_name();
                let name = name.as_ref();
                match walk.as_mut() {
                    Some(w) => {
                        w.level += 1;
                        w.metrics.nodes += 1;
                        w.metrics.depth = w.metrics.depth.max(w.level);
                        if dialect.is_structural_op(name) {
                            w.metrics.ops += 1;
                        }
                        if dialect == Dialect::Mathml && name == b"mo" {
                            w.mo_text = Some(String::new());
                        }
                    }
                    None if name == root => {
                        walk = Some(Walk {
                            level: 1,
                            metrics: TreeMetrics {
                                depth: 1,
                                nodes: 1,
                                ops: 0,
                            },
                            mo_text: None,
                        });
                    }
                    None if name == b"equation" => label = attr_value(e, b"labels"),
                    None => {}
                }
            }
            Event::Empty(ref e) => {
                let name = e.local_name();
                let name = name.as_ref();
                match walk.as_mut() {
                    Some(w) => {
                        w.metrics.nodes += 1;
                        w.metrics.depth = w.metrics.depth.max(w.level + 1);
                        if dialect.is_structural_op(name) {
                            w.metrics.ops += 1;
                        }
                    }
                    None if name == root => out.push(Subtree {
                        label: label.clone(),
                        metrics: TreeMetrics {
                            depth: 1,
                            nodes: 1,
                            ops: 0,
                        },
                    }),
                    None => {}
                }
            }
            Event::Text(ref t) => {
                if let Some(text) = walk.as_mut().and_then(|w| w.mo_text.as_mut()) {
                    match t.unescape() {
                        Ok(s) => text.push_str(&s),
                        Err(_) => text.push_str(&String::from_utf8_lossy(t)),
                    }
                }
            }
            Event::End(ref e) => {
                let name = e.local_name();
                let name = name.as_ref();
                if let Some(w) = walk.as_mut() {
                    if name == b"mo" {
                        if let Some(text) = w.mo_text.take() {
                            if !FENCES.contains(&text.trim()) {
                                w.metrics.ops += 1;
                            }
                        }
                    }
                    w.level -= 1;
                    if w.level == 0 {
                        out.push(Subtree {
                            label: label.clone(),
                            metrics: w.metrics,
                        });
                        walk = None;
                    }
                } else if name == b"equation" {
                    label = None;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out)
}

/// Metrics of the first subtree, or an error if the document has none.
pub fn tree_metrics(xml: &str, dialect: Dialect) -> EqResult<TreeMetrics> {
    measure_subtrees(xml, dialect)?
        .into_iter()
        .next()
        .map(|s| s.metrics)
        .ok_or_else(|| EqError::Parse("no formula element in xml".into()))
}
