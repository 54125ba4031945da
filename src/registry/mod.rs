//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Registry core
//!
//! [`Registry`] is the transactional heart of the service: the registration
//! pipeline, reference resolution, compatibility gating, and the query and
//! retire surface. It is stateless across requests; all shared state lives
//! in the database.

pub mod compatibility;
pub mod hash;
pub mod operations;
pub mod register;
pub mod resolver;

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, RegistryResult};
use crate::schema::SchemaType;
use crate::storage::Store;

/// A named link from a schema to the `(subject, version)` supplying one of
/// its types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaReference {
    pub name: String,
    pub subject: String,
    pub version: i32,
}

/// A registration request after wire decoding
#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub body: String,
    pub schema_type: SchemaType,
    pub references: Vec<SchemaReference>,
}

/// A version path segment: `latest`, `-1`, or a decimal int32
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSpec {
    Latest,
    Number(i32),
}

impl VersionSpec {
    /// Parse a wire version segment; anything that is neither `latest`,
    /// `-1`, nor a decimal int32 is `InvalidVersion`
    pub fn parse(raw: &str) -> RegistryResult<Self> {
        if raw == "latest" || raw == "-1" {
            return Ok(Self::Latest);
        }
        raw.parse::<i32>()
            .map(Self::Number)
            .map_err(|_| RegistryError::InvalidVersion)
    }
}

/// One subject version as the read surface reports it
#[derive(Debug, Clone)]
pub struct SubjectVersionView {
    pub subject: String,
    pub global_id: i32,
    pub version: i32,
    pub schema_type: SchemaType,
    pub body: String,
}

/// An exact-match lookup result
#[derive(Debug, Clone)]
pub struct SchemaLookupView {
    pub subject: String,
    pub global_id: i32,
    pub version: i32,
    pub body: String,
}

/// Behavior toggles resolved from configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryOptions {
    /// Report an empty version list instead of `SubjectNotFound` when the
    /// subject exists without live versions
    pub missing_versions_as_empty: bool,
}

/// The registry service
#[derive(Clone)]
pub struct Registry {
    store: Store,
    options: RegistryOptions,
}

impl Registry {
    /// Create a registry over a connected store
    pub fn new(store: Store) -> Self {
        Self::with_options(store, RegistryOptions::default())
    }

    /// Create a registry with explicit behavior toggles
    pub fn with_options(store: Store, options: RegistryOptions) -> Self {
        Self { store, options }
    }

    /// The underlying store
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Register a new version under a subject, creating the subject on
    /// first use; idempotent for an already-registered schema
    pub async fn register_version(
        &self,
        subject_name: &str,
        request: &RegisterRequest,
    ) -> RegistryResult<i32> {
        register::register_version(&self.store, subject_name, request).await
    }

    /// Find the version of `subject` that exactly matches the request
    pub async fn lookup_schema(
        &self,
        subject_name: &str,
        request: &RegisterRequest,
    ) -> RegistryResult<SchemaLookupView> {
        operations::lookup_schema(&self.store, subject_name, request).await
    }

    /// All subject names
    pub async fn list_subjects(&self, include_deleted: bool) -> RegistryResult<Vec<String>> {
        operations::list_subjects(&self.store, include_deleted).await
    }

    /// Ascending version numbers of a subject
    pub async fn list_versions(
        &self,
        subject_name: &str,
        include_deleted: bool,
    ) -> RegistryResult<Vec<i32>> {
        operations::list_versions(
            &self.store,
            subject_name,
            include_deleted,
            self.options.missing_versions_as_empty,
        )
        .await
    }

    /// One version of a subject
    pub async fn get_version(
        &self,
        subject_name: &str,
        version: VersionSpec,
    ) -> RegistryResult<SubjectVersionView> {
        operations::get_version(&self.store, subject_name, version).await
    }

    /// The raw schema body of one version
    pub async fn get_version_body(
        &self,
        subject_name: &str,
        version: VersionSpec,
    ) -> RegistryResult<String> {
        Ok(self.get_version(subject_name, version).await?.body)
    }

    /// Global ids of schemas referencing this subject version
    pub async fn referenced_by(
        &self,
        subject_name: &str,
        version: VersionSpec,
    ) -> RegistryResult<Vec<i32>> {
        operations::referenced_by(&self.store, subject_name, version).await
    }

    /// Soft- or hard-delete a subject, returning the removed version numbers
    pub async fn delete_subject(
        &self,
        subject_name: &str,
        permanent: bool,
    ) -> RegistryResult<Vec<i32>> {
        operations::delete_subject(&self.store, subject_name, permanent).await
    }

    /// Soft- or hard-delete one version, returning its number
    pub async fn delete_version(
        &self,
        subject_name: &str,
        version: VersionSpec,
        permanent: bool,
    ) -> RegistryResult<i32> {
        operations::delete_version(&self.store, subject_name, version, permanent).await
    }
}
