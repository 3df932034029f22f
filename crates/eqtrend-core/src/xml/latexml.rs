//! Batch conversion through the external `latexml` tool.
//!
//! All formulas go into one mock TeX document, one labelled `equation`
//! each, so the tool starts once per batch. Labels in the output map the
//! XMath trees back to equation ids.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use super::{measure_subtrees, Dialect, TreeMetrics};
use crate::error::{EqError, EqResult};
use crate::latex::strip_display;

const LABEL_PREFIX: &str = "LABEL:eq:";

/// Environments a formula may not open or close inside the batch document.
const RESERVED_ENVIRONMENTS: [&str; 4] = [
    "\\begin{document}",
    "\\end{document}",
    "\\begin{equation}",
    "\\end{equation}",
];

/// The formula as it goes into the batch document, or why it cannot.
/// Every formula shares one document, so an unclosed group, a comment or a
/// stray environment would swallow the equations after it.
pub fn embeddable(raw: &str) -> Result<String, &'static str> {
    let latex = strip_display(raw);
    if latex.is_empty() {
        return Err("empty formula");
    }
    if RESERVED_ENVIRONMENTS.iter().any(|env| latex.contains(env)) {
        return Err("formula opens or closes a document environment");
    }
    let mut depth = 0usize;
    let mut chars = latex.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1).ok_or("unbalanced braces")?;
            }
            '%' => return Err("unescaped % comment"),
            _ => {}
        }
    }
    if depth > 0 {
        return Err("unbalanced braces");
    }
    Ok(latex)
}

pub struct Latexml {
    command: String,
    timeout: Duration,
}

impl Latexml {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    /// Build the TeX source for a batch of `(id, raw latex)` pairs.
    /// Formulas that are not [`embeddable`] are left out.
    pub fn document(items: &[(String, String)]) -> String {
        let mut doc = String::from(
            "\\documentclass{article}\n\\usepackage{amsmath}\n\\usepackage{amssymb}\n\\begin{document}\n",
        );
        for (id, raw) in items {
            let Ok(latex) = embeddable(raw) else {
                continue;
            };
            doc.push_str(&format!(
                "\\begin{{equation}}\\label{{eq:{id}}}\n{latex}\n\\end{{equation}}\n"
            ));
        }
        doc.push_str("\\end{document}\n");
        doc
    }

    /// Run the tool over a batch. Formulas the tool could not turn into an
    /// XMath tree are simply absent from the result.
    pub fn run(&self, items: &[(String, String)]) -> EqResult<HashMap<String, TreeMetrics>> {
        if items.is_empty() {
            return Ok(HashMap::new());
        }
        let dir = tempfile::tempdir()?;
        let tex = dir.path().join("equations.tex");
        let out = dir.path().join("equations.xml");
        std::fs::write(&tex, Self::document(items))?;

        self.invoke(dir.path(), &tex, &out)?;

        let xml = std::fs::read_to_string(&out)?;
        parse_output(&xml)
    }

    fn invoke(&self, dir: &Path, tex: &Path, out: &Path) -> EqResult<()> {
        let log = dir.join("latexml.log");
        let mut child = Command::new(&self.command)
            .arg("--quiet")
            .arg(format!("--destination={}", out.display()))
            .arg(tex)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(std::fs::File::create(&log)?)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    EqError::Tool(format!("'{}' not found on PATH", self.command))
                }
                _ => EqError::Tool(format!("cannot start '{}': {e}", self.command)),
            })?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() > self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(EqError::Tool(format!(
                    "{} timed out after {}s",
                    self.command,
                    self.timeout.as_secs()
                )));
            }
            std::thread::sleep(Duration::from_millis(100));
        };

        // latexml exits non-zero on recoverable errors but still writes output
        if !out.exists() {
            let stderr = std::fs::read_to_string(&log).unwrap_or_default();
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            return Err(EqError::Tool(format!(
                "{} exited with {status} and wrote nothing: {}",
                self.command,
                tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
            )));
        }
        Ok(())
    }
}

/// Map LaTeXML output back to ids: the first XMath under each labelled equation.
pub fn parse_output(xml: &str) -> EqResult<HashMap<String, TreeMetrics>> {
    let mut by_id = HashMap::new();
    for sub in measure_subtrees(xml, Dialect::Xmath)? {
        let Some(labels) = sub.label else {
            continue;
        };
        let id = labels
            .split_whitespace()
            .find_map(|l| l.strip_prefix(LABEL_PREFIX));
        if let Some(id) = id {
            by_id.entry(id.to_string()).or_insert(sub.metrics);
        }
    }
    Ok(by_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_labels_each_equation() {
        let doc = Latexml::document(&[
            ("abc".into(), "{\\displaystyle x+y}".into()),
            ("skip".into(), "{\\displaystyle }".into()),
            ("def".into(), "z".into()),
        ]);
        assert!(doc.contains("\\label{eq:abc}\nx+y\n"));
        assert!(doc.contains("\\label{eq:def}\nz\n"));
        assert!(!doc.contains("eq:skip"));
        assert!(doc.trim_end().ends_with("\\end{document}"));
    }

    #[test]
    fn test_document_leaves_out_unbalanced_formulas() {
        let doc = Latexml::document(&[
            ("open".into(), "{\\displaystyle {a}".into()),
            ("close".into(), "a}+b".into()),
            ("env".into(), "x \\end{equation} y".into()),
            ("ok".into(), "\\{a\\}+{b}".into()),
        ]);
        assert!(!doc.contains("eq:open"));
        assert!(!doc.contains("eq:close"));
        assert!(!doc.contains("eq:env"));
        assert!(doc.contains("\\label{eq:ok}\n\\{a\\}+{b}\n"));
        // one equation opened, one closed
        assert_eq!(doc.matches("\\begin{equation}").count(), 1);
        assert_eq!(doc.matches("\\end{equation}").count(), 1);
    }

    #[test]
    fn test_embeddable() {
        assert_eq!(embeddable("{\\displaystyle x^{2}}").unwrap(), "x^{2}");
        assert_eq!(embeddable("{\\displaystyle {a}"), Err("unbalanced braces"));
        assert_eq!(embeddable("}{"), Err("unbalanced braces"));
        assert_eq!(embeddable("50% off"), Err("unescaped % comment"));
        assert!(embeddable("50\\% off").is_ok());
        assert_eq!(embeddable("\\\\{x}").unwrap(), "\\\\{x}");
        assert_eq!(embeddable("{\\displaystyle }"), Err("empty formula"));
    }

    #[test]
    fn test_parse_output_maps_labels() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<document xmlns="http://dlmf.nist.gov/LaTeXML">
  <para>
    <equation xml:id="S0.E1" labels="LABEL:eq:abc">
      <Math mode="display" tex="x+y"><XMath><XMApp><XMTok meaning="plus" role="ADDOP">+</XMTok><XMTok role="UNKNOWN">x</XMTok><XMTok role="UNKNOWN">y</XMTok></XMApp></XMath></Math>
    </equation>
    <equation xml:id="S0.E2">
      <Math><XMath><XMTok>q</XMTok></XMath></Math>
    </equation>
  </para>
</document>"#;
        let map = parse_output(xml).unwrap();
        assert_eq!(map.len(), 1);
        let m = map["abc"];
        assert_eq!(m.ops, 1);
        assert_eq!(m.nodes, 5);
        assert_eq!(m.depth, 3);
    }

    #[test]
    fn test_missing_tool_is_reported() {
        let tool = Latexml::new("definitely-not-latexml-xyz", Duration::from_secs(5));
        let err = tool
            .run(&[("a".into(), "x".into())])
            .unwrap_err()
            .to_string();
        assert!(err.contains("not found"), "{err}");
    }

    #[test]
    fn test_empty_batch_skips_tool() {
        let tool = Latexml::new("definitely-not-latexml-xyz", Duration::from_secs(5));
        assert!(tool.run(&[]).unwrap().is_empty());
    }
}
