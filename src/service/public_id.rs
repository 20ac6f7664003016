//! Public identifiers: `{prefix}_{ulid}`.
//!
//! A public id exposes a ULID to the outside world behind a resource-type
//! prefix, e.g. `ord_01JGZ6J3Q8W9X2C4V5B6N7M8K9`. Validation checks run in a
//! fixed order and the first failure wins:
//!
//! 1. exactly one `_` separator
//! 2. prefix matches the expected resource type
//! 3. ULID segment is 26 characters
//! 4. ULID segment is valid Crockford Base32

use std::sync::Arc;

use crate::domain::{ResourceType, Ulid128};
use crate::error::{Result, ValidationError};
use crate::service::ulid::UlidGenerator;

/// Separator between prefix and ULID.
pub const SEPARATOR: char = '_';

/// Stateless encoder/decoder for public ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublicIdCodec {
    lower_case: bool,
}

impl PublicIdCodec {
    /// Codec rendering the ULID segment in upper case.
    #[must_use]
    pub const fn new() -> Self {
        Self { lower_case: false }
    }

    /// Codec rendering the ULID segment in lower case.
    #[must_use]
    pub const fn lower_case() -> Self {
        Self { lower_case: true }
    }

    /// Render a public id.
    #[must_use]
    pub fn encode(&self, resource_type: ResourceType, ulid: Ulid128) -> String {
        let body = ulid.to_string();
        let body = if self.lower_case {
            body.to_ascii_lowercase()
        } else {
            body
        };
        format!("{}{SEPARATOR}{body}", resource_type.prefix())
    }

    /// Check `candidate` against `resource_type`.
    ///
    /// # Errors
    ///
    /// The first failing check, as a [`ValidationError`].
    pub fn validate(
        &self,
        resource_type: ResourceType,
        candidate: &str,
    ) -> std::result::Result<(), ValidationError> {
        self.decode(resource_type, candidate).map(|_| ())
    }

    /// Decode `candidate`, which must belong to `resource_type`.
    ///
    /// # Errors
    ///
    /// The first failing check, as a [`ValidationError`].
    pub fn decode(
        &self,
        resource_type: ResourceType,
        candidate: &str,
    ) -> std::result::Result<Ulid128, ValidationError> {
        let (prefix, body) = split(candidate)?;
        // The separator must sit right after the expected prefix.
        if prefix.len() != resource_type.prefix().len() {
            return Err(ValidationError::MissingSeparator {
                candidate: candidate.to_string(),
            });
        }
        if prefix != resource_type.prefix() {
            return Err(ValidationError::TypeMismatch {
                expected: resource_type.prefix(),
                actual: prefix.to_string(),
            });
        }
        decode_body(body)
    }

    /// Decode `candidate` whatever its resource type.
    ///
    /// # Errors
    ///
    /// [`ValidationError::UnknownPrefix`] if the prefix names no resource
    /// type, otherwise the same failures as [`PublicIdCodec::decode`].
    pub fn decode_any(
        &self,
        candidate: &str,
    ) -> std::result::Result<(ResourceType, Ulid128), ValidationError> {
        let (prefix, body) = split(candidate)?;
        let resource_type =
            ResourceType::from_prefix(prefix).ok_or_else(|| ValidationError::UnknownPrefix {
                prefix: prefix.to_string(),
            })?;
        Ok((resource_type, decode_body(body)?))
    }
}

fn split(candidate: &str) -> std::result::Result<(&str, &str), ValidationError> {
    let mut parts = candidate.split(SEPARATOR);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(prefix), Some(body), None) => Ok((prefix, body)),
        _ => Err(ValidationError::MissingSeparator {
            candidate: candidate.to_string(),
        }),
    }
}

fn decode_body(body: &str) -> std::result::Result<Ulid128, ValidationError> {
    // Length is checked before the alphabet.
    Ok(Ulid128::parse(body)?)
}

/// Mints public ids from a ULID generator.
pub struct PublicIdFactory {
    generator: Arc<dyn UlidGenerator>,
    codec: PublicIdCodec,
}

impl PublicIdFactory {
    /// Create a factory.
    pub fn new(generator: Arc<dyn UlidGenerator>, codec: PublicIdCodec) -> Self {
        Self { generator, codec }
    }

    /// Codec used for rendering and validation.
    #[must_use]
    pub const fn codec(&self) -> &PublicIdCodec {
        &self.codec
    }

    /// Generate a fresh public id for `resource_type`.
    ///
    /// # Errors
    ///
    /// Propagates ULID generation failures.
    pub fn next_public_id(&self, resource_type: ResourceType) -> Result<String> {
        let ulid = self.generator.next_ulid()?;
        Ok(self.codec.encode(resource_type, ulid))
    }

    /// See [`PublicIdCodec::validate`].
    ///
    /// # Errors
    ///
    /// The first failing check.
    pub fn validate_public_id(
        &self,
        resource_type: ResourceType,
        candidate: &str,
    ) -> std::result::Result<(), ValidationError> {
        self.codec.validate(resource_type, candidate)
    }
}
