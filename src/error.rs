// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::models::{ConnectionType, RequestType};
use crate::storage::StorageError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure of a relationship, content or membership operation.
///
/// `NotFound` doubles as the veto answer for blocked, banned and hidden
/// parties, so callers cannot tell a veto from a true absence.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Conflict(#[from] Conflict),

    #[error(transparent)]
    Storage(StorageError),

    /// Failure of a collaborator outside the store.
    #[error("{0}")]
    Internal(String),
}

/// State conflicts the caller can act on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Conflict {
    #[error("users are already acquaintances")]
    AlreadyAcquainted,

    #[error("cannot request {requested} while a {existing} connection exists")]
    Precedence {
        existing: ConnectionType,
        requested: RequestType,
    },

    #[error("request is no longer pending (status {0})")]
    NotPending(&'static str),

    #[error("user is already a member")]
    AlreadyMember,

    #[error("a join request is already pending")]
    JoinAlreadyPending,
}

impl Conflict {
    pub fn code(&self) -> &'static str {
        match self {
            Conflict::AlreadyAcquainted => "already_acquainted",
            Conflict::Precedence { .. } => "precedence_violation",
            Conflict::NotPending(_) => "not_pending",
            Conflict::AlreadyMember => "already_member",
            Conflict::JoinAlreadyPending => "join_already_pending",
        }
    }
}

impl Error {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Error::Forbidden(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Storage(StorageError::NotFound) => StatusCode::NOT_FOUND,
            Error::Storage(StorageError::Conflict(_)) => StatusCode::CONFLICT,
            Error::Storage(StorageError::Internal(_)) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code, also used as the metrics outcome label.
    pub fn code(&self) -> &'static str {
        match self {
            Error::BadRequest(_) => "bad_request",
            Error::Unauthorized(_) => "unauthorized",
            Error::NotFound(_) => "not_found",
            Error::Forbidden(_) => "forbidden",
            Error::Conflict(conflict) => conflict.code(),
            Error::Storage(StorageError::NotFound) => "not_found",
            Error::Storage(StorageError::Conflict(_)) => "conflict",
            Error::Storage(StorageError::Internal(_)) | Error::Internal(_) => "internal_error",
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => Error::NotFound("not found".to_string()),
            other => Error::Storage(other),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Error::Storage(StorageError::Internal(detail)) => {
                error!("Storage failure: {}", detail);
                "Internal server error".to_string()
            }
            Error::Internal(detail) => {
                error!("Internal failure: {}", detail);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "data": null,
            "error": message,
            "code": self.code(),
        });
        (status, Json(body)).into_response()
    }
}
