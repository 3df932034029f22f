//! In-process LaTeX → MathML, so the XML metrics work without LaTeXML.

use math_core::{LatexToMathML, MathCoreConfig, MathDisplay};

use super::{tree_metrics, Dialect, TreeMetrics};
use crate::error::{EqError, EqResult};
use crate::latex::strip_display;

pub struct MathmlConverter {
    inner: LatexToMathML,
}

impl MathmlConverter {
    pub fn new() -> EqResult<Self> {
        let inner = LatexToMathML::new(MathCoreConfig::default()).map_err(|(err, idx, def)| {
            EqError::Config(format!("macro #{idx} ({def}) is invalid: {err}"))
        })?;
        Ok(Self { inner })
    }

    /// The converter understands fonts and spacing itself; only the
    /// `{\displaystyle ...}` wrapper is removed.
    pub fn to_mathml(&self, raw: &str) -> EqResult<String> {
        let latex = strip_display(raw);
        if latex.is_empty() {
            return Err(EqError::Parse("empty formula".into()));
        }
        self.inner
            .convert_with_local_counter(&latex, MathDisplay::Block)
            .map_err(|e| EqError::Parse(e.to_string()))
    }

    pub fn measure(&self, raw: &str) -> EqResult<TreeMetrics> {
        let xml = self.to_mathml(raw)?;
        tree_metrics(&xml, Dialect::Mathml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converts_wrapped_formula() {
        let conv = MathmlConverter::new().unwrap();
        let xml = conv.to_mathml("{\\displaystyle E=mc^{2}}").unwrap();
        assert!(xml.starts_with("<math"));
        assert!(xml.contains("<msup>"));
    }

    #[test]
    fn test_measure_grows_with_structure() {
        let conv = MathmlConverter::new().unwrap();
        let small = conv.measure("x").unwrap();
        let big = conv.measure("\\frac{a^{2}+b}{\\sqrt{c}}").unwrap();
        assert!(big.nodes > small.nodes);
        assert!(big.depth > small.depth);
        assert!(big.ops >= 3);
    }

    #[test]
    fn test_empty_is_an_error() {
        let conv = MathmlConverter::new().unwrap();
        assert!(conv.measure("{\\displaystyle }").is_err());
    }
}
