use crate::error::EqResult;
use crate::record::{Backend, Equation, Score, StoreStats};

pub trait EquationStore {
    // Equations
    /// Upsert by id. Returns `true` when the equation was not stored before.
    fn insert(&self, equation: &Equation) -> EqResult<bool>;
    fn get(&self, id: &str) -> EqResult<Option<Equation>>;
    fn list(&self) -> EqResult<Vec<Equation>>;
    fn count(&self) -> EqResult<usize>;

    // Scores
    fn put_score(&self, score: &Score) -> EqResult<()>;
    fn scores(&self, backend: Backend) -> EqResult<Vec<Score>>;
    fn unscored(&self, backend: Backend) -> EqResult<Vec<Equation>>;
    fn clear_scores(&self, backend: Backend) -> EqResult<usize>;

    // Stats
    fn stats(&self) -> EqResult<StoreStats>;
}
