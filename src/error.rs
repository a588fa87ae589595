// ⚠️ Catalog Errors - Typed failures for every engine operation
//
// Each variant maps to a distinct caller remedy:
// - NotFound / InvalidRequest: fix the request
// - IneligibleSelection: re-pick within the trim's eligibility sets
// - ReferentialIntegrity: remove dependent references first
// - MergeConflict: refresh the catalog view and retry
//
// "No price at these terms" is NOT here: unavailable rates are data
// (see pricing::RateQuote), never an error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// An id passed to an operation does not exist in the catalog.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A quoted selection violates vehicle scoping, color kind, or the
    /// trim's eligibility sets.
    #[error("ineligible selection: {0}")]
    IneligibleSelection(String),

    /// A delete or link would leave dangling references behind.
    #[error("referential integrity violation: {0}")]
    ReferentialIntegrity(String),

    /// A master involved in a merge vanished or changed shape mid-flight.
    #[error("merge conflict: {0}")]
    MergeConflict(String),

    /// The request is malformed independent of current catalog state.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("sheet error: {0}")]
    Sheet(#[from] csv::Error),
}

impl CatalogError {
    pub fn not_found(entity: &'static str, id: &str) -> Self {
        CatalogError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// True for errors the caller can repair by changing the request,
    /// as opposed to storage/serialization failures.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CatalogError::NotFound { .. }
                | CatalogError::IneligibleSelection(_)
                | CatalogError::ReferentialIntegrity(_)
                | CatalogError::MergeConflict(_)
                | CatalogError::InvalidRequest(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
