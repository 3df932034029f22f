use std::collections::{HashMap, HashSet};
use std::time::Duration;

use scraper::{Html, Selector};
use serde::Deserialize;

use eqtrend_core::{EqResult, Equation, Origin};

use crate::{agent, http_error};

/// Concepts with a defining formula (P2534), named after (P138) or
/// discovered by (P61) a person with a known birth date (P569).
pub const DEFAULT_QUERY: &str = r#"SELECT DISTINCT ?stuff ?stuffLabel ?equation ?person ?personLabel ?birth ?birthPlaceLabel
WHERE
{
  ?stuff wdt:P2534 ?equation;
         (wdt:P138|wdt:P61) ?person.
  ?person wdt:P569 ?birth.
  OPTIONAL { ?person wdt:P19 ?birthPlace. }

  SERVICE wikibase:label { bd:serviceParam wikibase:language "[AUTO_LANGUAGE],en". }
}"#;

/// One RDF term of a result row.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Term {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    #[serde(default)]
    pub datatype: Option<String>,
}

/// A result row: variable name → term. Unbound variables are absent.
pub type Binding = HashMap<String, Term>;

#[derive(Deserialize)]
struct Response {
    results: Results,
}

#[derive(Deserialize)]
struct Results {
    bindings: Vec<Binding>,
}

pub struct SparqlClient {
    endpoint: String,
    agent: ureq::Agent,
}

impl SparqlClient {
    pub fn new(endpoint: impl Into<String>, user_agent: &str, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            agent: agent(user_agent, timeout),
        }
    }

    pub fn query(&self, sparql: &str) -> EqResult<Vec<Binding>> {
        tracing::debug!(endpoint = %self.endpoint, "sending SPARQL query");
        let body = self
            .agent
            .get(&self.endpoint)
            .set("Accept", "application/sparql-results+json")
            .query("query", sparql)
            .query("format", "json")
            .call()
            .map_err(http_error)?
            .into_string()?;
        let bindings = parse_response(&body)?;
        tracing::info!(rows = bindings.len(), "SPARQL query returned");
        Ok(bindings)
    }
}

pub fn parse_response(json: &str) -> EqResult<Vec<Binding>> {
    let resp: Response = serde_json::from_str(json)?;
    Ok(resp.results.bindings)
}

fn value<'a>(b: &'a Binding, var: &str) -> Option<&'a str> {
    b.get(var)
        .map(|t| t.value.trim())
        .filter(|v| !v.is_empty())
}

/// `http://www.wikidata.org/entity/Q11402` → `Q11402`.
fn entity_id(uri: &str) -> &str {
    uri.rsplit('/').next().unwrap_or(uri)
}

/// LaTeX of a formula literal. Wikidata serves math values as MathML with
/// the TeX source in `alttext` and in a TeX `annotation`; plain TeX
/// literals are passed through.
pub fn formula_latex(literal: &str) -> Option<String> {
    let literal = literal.trim();
    if !literal.starts_with('<') {
        return (!literal.is_empty()).then(|| literal.to_string());
    }
    let doc = Html::parse_fragment(literal);
    let math = Selector::parse("math").ok()?;
    if let Some(alt) = doc
        .select(&math)
        .find_map(|el| el.value().attr("alttext"))
        .filter(|a| !a.trim().is_empty())
    {
        return Some(alt.trim().to_string());
    }
    let annotation = Selector::parse("annotation").ok()?;
    doc.select(&annotation)
        .filter(|el| {
            el.value()
                .attr("encoding")
                .map_or(true, |enc| enc == "application/x-tex")
        })
        .map(|el| el.text().collect::<String>())
        .map(|t| t.trim().to_string())
        .find(|t| !t.is_empty())
}

/// Turn result rows into equations. The first row wins when one formula
/// of one item comes back several times (several persons or places).
pub fn equations_from_bindings(bindings: &[Binding]) -> Vec<Equation> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for b in bindings {
        let Some(item) = value(b, "stuff").map(entity_id) else {
            tracing::warn!("row without item, skipped");
            continue;
        };
        let latex = value(b, "equation").and_then(formula_latex);
        if latex.is_none() {
            tracing::warn!(item, "formula literal without LaTeX");
        }

        let mut eq = Equation::new(
            Origin::Wikidata {
                item: item.to_string(),
            },
            latex,
        );
        if !seen.insert(eq.id.clone()) {
            continue;
        }
        eq.label = value(b, "stuffLabel").map(String::from);
        eq.person = value(b, "personLabel")
            .or_else(|| value(b, "person").map(entity_id))
            .map(String::from);
        eq.birth = value(b, "birth").map(String::from);
        eq.birth_place = value(b, "birthPlaceLabel").map(String::from);
        out.push(eq);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"{
      "head": {"vars": ["stuff", "stuffLabel", "equation", "person", "personLabel", "birth", "birthPlaceLabel"]},
      "results": {"bindings": [
        {
          "stuff": {"type": "uri", "value": "http://www.wikidata.org/entity/Q11402"},
          "stuffLabel": {"type": "literal", "xml:lang": "en", "value": "mass–energy equivalence"},
          "equation": {"type": "literal", "datatype": "http://www.w3.org/1998/Math/MathML",
            "value": "<math xmlns=\"http://www.w3.org/1998/Math/MathML\" alttext=\"{\\displaystyle E=mc^{2}}\"><semantics><mrow><mi>E</mi></mrow><annotation encoding=\"application/x-tex\">{\\displaystyle E=mc^{2}}</annotation></semantics></math>"},
          "person": {"type": "uri", "value": "http://www.wikidata.org/entity/Q937"},
          "personLabel": {"type": "literal", "value": "Albert Einstein"},
          "birth": {"type": "literal", "datatype": "http://www.w3.org/2001/XMLSchema#dateTime", "value": "1879-03-14T00:00:00Z"},
          "birthPlaceLabel": {"type": "literal", "value": "Ulm"}
        },
        {
          "stuff": {"type": "uri", "value": "http://www.wikidata.org/entity/Q11402"},
          "equation": {"type": "literal",
            "value": "<math xmlns=\"http://www.w3.org/1998/Math/MathML\" alttext=\"{\\displaystyle E=mc^{2}}\"></math>"},
          "person": {"type": "uri", "value": "http://www.wikidata.org/entity/Q1"},
          "birth": {"type": "literal", "value": "1900-01-01T00:00:00Z"}
        },
        {
          "stuff": {"type": "uri", "value": "http://www.wikidata.org/entity/Q181404"},
          "equation": {"type": "literal", "value": "<math><annotation encoding=\"application/x-tex\">\\nabla \\cdot E = 0</annotation></math>"},
          "person": {"type": "uri", "value": "http://www.wikidata.org/entity/Q9095"},
          "birth": {"type": "literal", "value": "1831-06-13T00:00:00Z"}
        }
      ]}
    }"#;

    #[test]
    fn test_parse_response() {
        let rows = parse_response(RESPONSE).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["personLabel"].value, "Albert Einstein");
        assert_eq!(
            rows[0]["birth"].datatype.as_deref(),
            Some("http://www.w3.org/2001/XMLSchema#dateTime")
        );
        assert!(!rows[2].contains_key("birthPlaceLabel"));
    }

    #[test]
    fn test_parse_response_rejects_garbage() {
        assert!(parse_response("<html>rate limited</html>").is_err());
    }

    #[test]
    fn test_equations_from_bindings() {
        let rows = parse_response(RESPONSE).unwrap();
        let eqs = equations_from_bindings(&rows);
        // the duplicate formula of Q11402 collapses onto the first row
        assert_eq!(eqs.len(), 2);

        let emc = &eqs[0];
        assert_eq!(emc.origin, Origin::Wikidata { item: "Q11402".into() });
        assert_eq!(emc.latex.as_deref(), Some("{\\displaystyle E=mc^{2}}"));
        assert_eq!(emc.label.as_deref(), Some("mass–energy equivalence"));
        assert_eq!(emc.person.as_deref(), Some("Albert Einstein"));
        assert_eq!(emc.birth.as_deref(), Some("1879-03-14T00:00:00Z"));
        assert_eq!(emc.birth_place.as_deref(), Some("Ulm"));

        let gauss = &eqs[1];
        assert_eq!(gauss.latex.as_deref(), Some("\\nabla \\cdot E = 0"));
        assert!(gauss.label.is_none());
        // no label service output: fall back to the entity id
        assert_eq!(gauss.person.as_deref(), Some("Q9095"));
        assert!(gauss.birth_place.is_none());
    }

    #[test]
    fn test_formula_latex() {
        assert_eq!(formula_latex("a+b").as_deref(), Some("a+b"));
        assert_eq!(formula_latex("  "), None);
        assert_eq!(formula_latex("<math><mi>x</mi></math>"), None);
        assert_eq!(
            formula_latex(r#"<math><annotation encoding="application/x-maple">x</annotation><annotation encoding="application/x-tex">y</annotation></math>"#)
                .as_deref(),
            Some("y")
        );
    }

    #[test]
    fn test_row_without_item_is_skipped() {
        let mut row = Binding::new();
        row.insert(
            "equation".into(),
            Term {
                kind: "literal".into(),
                value: "x".into(),
                datatype: None,
            },
        );
        assert!(equations_from_bindings(&[row]).is_empty());
    }

    #[test]
    fn test_default_query_mentions_properties() {
        for p in ["wdt:P2534", "wdt:P138|wdt:P61", "wdt:P569", "wdt:P19"] {
            assert!(DEFAULT_QUERY.contains(p), "{p}");
        }
    }
}
