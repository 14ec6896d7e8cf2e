// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Service Errors
//!
//! Every orchestrator, action and smart-folder operation returns
//! [`ServiceResult`]. Expected conditions (missing node, denied capability,
//! malformed request) are values of [`ServiceError`], never panics.
//!
//! | Variant | Raised when |
//! |---------|-------------|
//! | `NotFound` | node, action or executable is absent |
//! | `Forbidden` | the permission guard denied the capability |
//! | `BadRequest` | wrong node variant, reserved parent, missing field, bad query |
//! | `AggregationFormula` | smart folder aggregation is invalid |
//! | `Validation` | malformed action or user record |
//! | `Store` | a collaborator failed for a reason other than not-found |

use thiserror::Error;

use crate::domain::action::ActionValidationError;
use crate::domain::repository::RepositoryError;
use crate::domain::smart_folder::{AggregationFormulaError, FilterError};
use crate::domain::user::UserValidationError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid aggregation: {0}")]
    AggregationFormula(#[from] AggregationFormulaError),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(String),

    /// Failure raised by an action's own executable during a manual run.
    #[error("Action '{action}' failed: {source}")]
    ActionFailed {
        action: String,
        #[source]
        source: anyhow::Error,
    },
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    pub fn forbidden(what: impl std::fmt::Display) -> Self {
        Self::Forbidden(what.to_string())
    }

    pub fn bad_request(what: impl std::fmt::Display) -> Self {
        Self::BadRequest(what.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden(_))
    }

    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::BadRequest(_))
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => ServiceError::NotFound(what),
            RepositoryError::Conflict(what) | RepositoryError::InvalidQuery(what) => ServiceError::BadRequest(what),
            RepositoryError::Storage(what) => ServiceError::Store(what),
        }
    }
}

impl From<FilterError> for ServiceError {
    fn from(err: FilterError) -> Self {
        ServiceError::BadRequest(err.to_string())
    }
}

impl From<ActionValidationError> for ServiceError {
    fn from(err: ActionValidationError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

impl From<UserValidationError> for ServiceError {
    fn from(err: UserValidationError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}
