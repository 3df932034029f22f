//! Network side of the pipeline: Wikidata SPARQL and Wikipedia pages.

pub mod sparql;
pub mod wikipedia;

pub use sparql::{equations_from_bindings, Binding, SparqlClient, Term, DEFAULT_QUERY};
pub use wikipedia::{PageCache, WikiClient};

use eqtrend_core::EqError;

pub(crate) fn http_error(e: ureq::Error) -> EqError {
    match e {
        ureq::Error::Status(code, resp) => {
            EqError::Http(format!("{} returned HTTP {code}", resp.get_url()))
        }
        ureq::Error::Transport(t) => EqError::Http(t.to_string()),
    }
}

pub(crate) fn agent(user_agent: &str, timeout: std::time::Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
}
