use thiserror::Error;

/// Errors surfaced by the BHPT core.
///
/// The core is fully in-memory and does no I/O, so there is no `Io` variant
/// here — every error is either a programmer error (bad argument, bad
/// index) or an expected operational condition (table full, nothing to
/// select).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BhptError {
    #[error("no free index and auto_remove is disabled")]
    NoCapacity,

    #[error("index {0} is out of range")]
    InvalidIndex(usize),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no selectable entry: total weight is zero")]
    NoSelectableEntry,
}

pub type Result<T> = std::result::Result<T, BhptError>;
