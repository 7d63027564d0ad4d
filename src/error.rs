use thiserror::Error;

// Unified error type for sparsekron

#[derive(Error, Debug)]
pub enum SkError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("assembly error: {0}")]
    Assembly(String),
    #[error("workspace exhausted: kronmult needs {required} bytes but the budget is {available} bytes")]
    ResourceExhaustion { required: usize, available: usize },
    #[error("implicit solve did not converge after {iterations} iterations (residual {residual:e})")]
    SolverDivergence { iterations: usize, residual: f64 },
    #[error("factorization error: {0}")]
    FactorError(String),
    #[error("step aborted: {0}")]
    Aborted(String),
}

pub type Result<T> = std::result::Result<T, SkError>;
