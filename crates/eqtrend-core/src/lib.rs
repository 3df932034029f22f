pub mod error;
pub mod expr;
pub mod latex;
pub mod record;
pub mod stats;
pub mod store;
pub mod time;
pub mod xml;

pub use error::{EqError, EqResult};
pub use expr::Expr;
pub use latex::{parse_latex, ParseError};
pub use record::{Backend, Equation, Origin, Score, ScoreMetric, StoreStats};
pub use store::EquationStore;
pub use time::{parse_centuries, parse_year};
pub use xml::TreeMetrics;
