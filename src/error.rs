/// Errors raised by the assignment engine and its loaders.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AssignError {
    /// A predecessor walk visited more edges than the network holds, which means the
    /// shortest-path tree is corrupted or cyclic.  `partial_path` holds the edge labels
    /// collected so far, in origin-to-destination order.
    #[error("path from {origin} to {destination} exceeds the network edge count; \
             partial path: {}", .partial_path.join(" "))]
    PathOverflow {
        origin: String,
        destination: String,
        partial_path: Vec<String>,
    },
    #[error("unknown vertex {0}")]
    UnknownVertex(String),
    #[error("unknown edge {0}")]
    UnknownEdge(String),
    /// A path whose consecutive edges don't connect, or that doesn't run from its
    /// origin to its destination.
    #[error("path {0} is not connected")]
    BrokenPath(String),
    /// A choice probability or flow that came out NaN or infinite, on the named path or
    /// edge.
    #[error("non-finite flow on {0}")]
    NonFiniteFlow(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}
