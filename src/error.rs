//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Error handling for the schema registry
//!
//! This module provides the error type shared by the registry core and the
//! HTTP surface, together with the canonical wire codes.

use thiserror::Error;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Registry error kinds
///
/// Each variant maps onto one HTTP status and one wire `error_code`; the
/// HTTP layer serializes them as `{"error_code": <int>, "message": <text>}`.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Subject does not exist (or has no live versions)
    #[error("subject not found: {subject}")]
    SubjectNotFound { subject: String },

    /// Subject exists but the requested version does not
    #[error("version not found: {version}")]
    VersionNotFound { version: String },

    /// No schema matches the requested hash/id under this subject
    #[error("schema not found")]
    SchemaNotFound,

    /// A referenced subject version does not exist
    #[error("no schema reference found for subject {subject} and version {version}")]
    ReferenceNotFound { subject: String, version: i32 },

    /// A referenced schema has a different type than the referencing one
    #[error("cannot reference schema with a different type")]
    ReferenceTypeMismatch,

    /// Transitive reference resolution exceeded the depth cap
    #[error("hit recursive schema limit, reference chain is too deep")]
    ReferenceChainTooDeep,

    /// Permanent deletion requested on a row that is not soft-deleted
    #[error("must soft delete {target} before permanently deleting")]
    MustSoftDeleteFirst { target: String },

    /// The new schema failed the subject's compatibility policy
    #[error("schema is incompatible with an earlier schema")]
    Incompatible,

    /// The new schema's type differs from the subject's existing versions
    #[error("cannot add version of a different schema type")]
    SchemaTypeMismatch,

    /// The request named a schema type this registry does not know
    #[error("unknown schema type: {given}")]
    UnknownSchemaType { given: String },

    /// The version path segment is not `latest`, `-1` or a positive int32
    #[error("invalid version")]
    InvalidVersion,

    /// The schema body (or its references) failed validation or parsing
    #[error("error parsing schema: {message}")]
    InvalidSchema { message: String },

    /// Configuration error
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Anything unexpected, including database failures
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl RegistryError {
    /// Create a subject-not-found error
    pub fn subject_not_found(subject: &str) -> Self {
        Self::SubjectNotFound {
            subject: subject.to_string(),
        }
    }

    /// Create a version-not-found error
    pub fn version_not_found(version: &str) -> Self {
        Self::VersionNotFound {
            version: version.to_string(),
        }
    }

    /// Create an invalid-schema error
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// HTTP status for this error
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::SubjectNotFound { .. } => 404,
            Self::VersionNotFound { .. } => 404,
            Self::SchemaNotFound => 404,
            Self::ReferenceNotFound { .. } => 404,
            Self::ReferenceTypeMismatch => 409,
            Self::ReferenceChainTooDeep => 409,
            Self::MustSoftDeleteFirst { .. } => 409,
            Self::Incompatible => 409,
            Self::SchemaTypeMismatch => 409,
            Self::UnknownSchemaType { .. } => 400,
            Self::InvalidVersion => 422,
            Self::InvalidSchema { .. } => 422,
            Self::Config { .. } => 500,
            Self::Internal { .. } => 500,
        }
    }

    /// Wire `error_code` for this error
    pub fn error_code(&self) -> i32 {
        match self {
            Self::SubjectNotFound { .. } => 40401,
            Self::VersionNotFound { .. } => 40402,
            Self::SchemaNotFound => 40403,
            Self::ReferenceNotFound { .. } => 40402,
            Self::ReferenceTypeMismatch => 40901,
            Self::ReferenceChainTooDeep => 40902,
            Self::MustSoftDeleteFirst { .. } => 40901,
            Self::Incompatible => 409,
            Self::SchemaTypeMismatch => 409,
            Self::UnknownSchemaType { .. } => 400,
            Self::InvalidVersion => 42202,
            Self::InvalidSchema { .. } => 42201,
            Self::Config { .. } => 5001,
            Self::Internal { .. } => 5001,
        }
    }
}

impl From<sqlx::Error> for RegistryError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidSchema {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for RegistryError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(RegistryError::subject_not_found("a").http_status_code(), 404);
        assert_eq!(RegistryError::Incompatible.http_status_code(), 409);
        assert_eq!(RegistryError::InvalidVersion.http_status_code(), 422);
        assert_eq!(RegistryError::internal("boom").http_status_code(), 500);
    }

    #[test]
    fn test_wire_codes() {
        assert_eq!(RegistryError::subject_not_found("a").error_code(), 40401);
        assert_eq!(RegistryError::version_not_found("9").error_code(), 40402);
        assert_eq!(RegistryError::SchemaNotFound.error_code(), 40403);
        assert_eq!(
            RegistryError::MustSoftDeleteFirst {
                target: "subject".into()
            }
            .error_code(),
            40901
        );
        assert_eq!(RegistryError::ReferenceChainTooDeep.error_code(), 40902);
        assert_eq!(RegistryError::Incompatible.error_code(), 409);
        assert_eq!(RegistryError::invalid_schema("bad").error_code(), 42201);
        assert_eq!(RegistryError::internal("boom").error_code(), 5001);
    }

    #[test]
    fn test_database_errors_collapse_to_internal() {
        let err: RegistryError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, RegistryError::Internal { .. }));
    }
}
