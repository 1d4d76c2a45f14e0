use thiserror::Error;

/// Failures raised by geometry operations on a single unit of work
/// (one feature, one obstacle, one chunk, one strategy run).
///
/// None of these abort a pipeline run: degenerate units are skipped,
/// library failures drive the connection fallback chain, and missing
/// candidates are recorded in the connection report.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GeometryError {
    /// Too few points or vertices for the operation
    #[error("degenerate geometry: {0}")]
    Degenerate(String),

    /// The geometry library rejected input that looked valid
    #[error("spatial library failure: {0}")]
    SpatialLibrary(String),

    /// No valid connection candidate within the configured distance
    #[error("no connection candidate for terrain point {point_id}")]
    NoCandidate { point_id: u64 },
}

/// Repair loop hit its iteration cap with more than one component left.
#[derive(Debug, Clone, Error, PartialEq)]
#[error(
    "connectivity repair exhausted after {iterations} iterations: {components} components, {} unreachable nodes",
    .unreachable.len()
)]
pub struct ConnectivityRepairExhausted {
    pub iterations: usize,
    pub components: usize,
    pub unreachable: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = GeometryError::Degenerate("ring has 2 points".to_string());
        assert_eq!(err.to_string(), "degenerate geometry: ring has 2 points");

        let exhausted = ConnectivityRepairExhausted {
            iterations: 3,
            components: 2,
            unreachable: vec![7, 9],
        };
        assert!(exhausted.to_string().contains("2 unreachable nodes"));
    }
}
