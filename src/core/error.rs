use thiserror::Error;

/// Errors raised at the edges of the model: bad inputs and unusable run settings.
///
/// Degenerate business states (zero sales, no paid channel) are never errors; they
/// surface as [`super::Ratio::Undefined`] or an infeasible strategy instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("{field} must be {requirement}, got {value}")]
    InvalidInput {
        field: &'static str,
        requirement: &'static str,
        value: f64,
    },
    #[error("projection needs at least one month")]
    EmptyHorizon,
    #[error("month {month} would acquire {units:.3e} units, above the limit of {limit} a month")]
    ExcessiveVolume {
        month: u32,
        units: f64,
        limit: u64,
    },
    #[error("target margin must be within (0, 1], got {0}")]
    InvalidTargetMargin(f64),
}
