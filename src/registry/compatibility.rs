//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Compatibility policy and the check driver
//!
//! Each subject carries one policy. Non-transitive policies compare a
//! candidate against the most recent live version only; `_TRANSITIVE`
//! variants walk every live prior version, newest first, and any single
//! failure rejects the registration.

use std::fmt;
use std::str::FromStr;

use sqlx::SqliteConnection;

use crate::error::{RegistryError, RegistryResult};
use crate::registry::resolver;
use crate::schema::{self, ParsedSchema, SchemaType};
use crate::storage::models::{self, SubjectRow};

/// Per-subject compatibility policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompatibilityLevel {
    None,
    Backward,
    BackwardTransitive,
    Forward,
    ForwardTransitive,
    Full,
    FullTransitive,
}

impl CompatibilityLevel {
    /// Canonical spelling, as persisted on the subject row
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Backward => "BACKWARD",
            Self::BackwardTransitive => "BACKWARD_TRANSITIVE",
            Self::Forward => "FORWARD",
            Self::ForwardTransitive => "FORWARD_TRANSITIVE",
            Self::Full => "FULL",
            Self::FullTransitive => "FULL_TRANSITIVE",
        }
    }

    /// Whether the policy compares against all prior versions
    pub fn is_transitive(&self) -> bool {
        matches!(
            self,
            Self::BackwardTransitive | Self::ForwardTransitive | Self::FullTransitive
        )
    }
}

impl fmt::Display for CompatibilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompatibilityLevel {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(Self::None),
            "BACKWARD" => Ok(Self::Backward),
            "BACKWARD_TRANSITIVE" => Ok(Self::BackwardTransitive),
            "FORWARD" => Ok(Self::Forward),
            "FORWARD_TRANSITIVE" => Ok(Self::ForwardTransitive),
            "FULL" => Ok(Self::Full),
            "FULL_TRANSITIVE" => Ok(Self::FullTransitive),
            other => Err(RegistryError::internal(format!(
                "unknown compatibility level: {other}"
            ))),
        }
    }
}

/// Gate a candidate schema against the subject's policy
///
/// Prior versions are re-parsed with their own reference closures. A prior
/// version that no longer parses is a logic error, not a client error.
pub async fn check_compatibility(
    conn: &mut SqliteConnection,
    subject: &SubjectRow,
    candidate: &ParsedSchema,
    schema_type: SchemaType,
) -> RegistryResult<()> {
    let level = CompatibilityLevel::from_str(&subject.compatibility)?;
    if level == CompatibilityLevel::None {
        return Ok(());
    }

    // transitive policies walk every live version; this can be expensive on
    // subjects with long histories
    let limit = if level.is_transitive() { None } else { Some(1) };
    let existing = models::live_versions_with_schemas_desc(&mut *conn, &subject.id, limit).await?;

    for prior in existing {
        let closure = resolver::collect_references(&mut *conn, prior.schema_id.clone(), 0).await?;
        let mut parse_inputs = Vec::new();
        for reference in &closure {
            resolver::upsert_parse_input(&mut parse_inputs, &reference.name, &reference.body);
        }

        let previous = schema::parse(&prior.body, schema_type, &parse_inputs)
            .map_err(|e| RegistryError::internal(format!("error parsing existing schema: {e}")))?;

        let compatible = match level {
            CompatibilityLevel::None => true,
            CompatibilityLevel::Backward | CompatibilityLevel::BackwardTransitive => {
                candidate.is_backward_compatible_with(&previous)?
            }
            CompatibilityLevel::Forward | CompatibilityLevel::ForwardTransitive => {
                previous.is_backward_compatible_with(candidate)?
            }
            CompatibilityLevel::Full | CompatibilityLevel::FullTransitive => {
                candidate.is_backward_compatible_with(&previous)?
                    && previous.is_backward_compatible_with(candidate)?
            }
        };

        if !compatible {
            return Err(RegistryError::Incompatible);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_round_trip() {
        for level in [
            CompatibilityLevel::None,
            CompatibilityLevel::Backward,
            CompatibilityLevel::BackwardTransitive,
            CompatibilityLevel::Forward,
            CompatibilityLevel::ForwardTransitive,
            CompatibilityLevel::Full,
            CompatibilityLevel::FullTransitive,
        ] {
            assert_eq!(level.as_str().parse::<CompatibilityLevel>().unwrap(), level);
        }
        assert!("SIDEWAYS".parse::<CompatibilityLevel>().is_err());
    }

    #[test]
    fn test_transitive_detection() {
        assert!(CompatibilityLevel::BackwardTransitive.is_transitive());
        assert!(CompatibilityLevel::FullTransitive.is_transitive());
        assert!(!CompatibilityLevel::Backward.is_transitive());
        assert!(!CompatibilityLevel::None.is_transitive());
    }
}
