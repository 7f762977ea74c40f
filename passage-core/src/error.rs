#[derive(thiserror::Error, Debug)]
pub enum TraversalError {
    #[error("invalid routing request: {0}")]
    InvalidRequest(String),
    #[error("state at vertex {0} is not connected to edge {1}")]
    DisconnectedEdge(usize, String),
    #[error("negative weight delta {0} produced by edge {1}")]
    NegativeWeight(f64, String),
    #[error("illegal mode transition: {0}")]
    IllegalTransition(String),
}
