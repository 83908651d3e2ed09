//! Error taxonomy for reception operations.
//!
//! Guard failures (`NotFound`, `NotApplicable`, `OutsideCheckInWindow`,
//! `MissingVaccineSelection`) are expected, user-recoverable outcomes that
//! the façade turns into notices. `Validation` and `Storage` are the hard
//! class: the operation aborts, nothing is committed, and the error is
//! surfaced upward unchanged.

use vaxdesk_types::TextError;

#[derive(Debug, thiserror::Error)]
pub enum ReceptionError {
    #[error("no such appointment at this unit")]
    NotFound,
    #[error("appointment is not in a state eligible for this transition")]
    NotApplicable,
    #[error("current time is outside the allowed check-in window")]
    OutsideCheckInWindow,
    #[error("no vaccine selected, or the vaccine is unknown to the catalog")]
    MissingVaccineSelection,
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

impl ReceptionError {
    /// Whether this error is a routine guard refusal rather than a fault.
    ///
    /// Guard refusals never mutate state and are reported to the operator
    /// as notices; everything else is unexpected and propagates as-is.
    pub fn is_guard_refusal(&self) -> bool {
        matches!(
            self,
            ReceptionError::NotFound
                | ReceptionError::NotApplicable
                | ReceptionError::OutsideCheckInWindow
                | ReceptionError::MissingVaccineSelection
        )
    }
}

impl From<TextError> for ReceptionError {
    fn from(err: TextError) -> Self {
        ReceptionError::Validation(err.to_string())
    }
}

pub type ReceptionResult<T> = std::result::Result<T, ReceptionError>;
