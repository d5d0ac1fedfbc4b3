use ogx_graph::GraphError;
use ogx_store::StoreError;

/// Errors from transport-level send/receive operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Decomposition or reconstruction failed.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// The backing record store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
