//! Opaque identifier generation for session IDs and API key secrets.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rootcause::Report;
use std::fmt;

/// Number of random bytes behind each generated identifier.
const RANDOM_ID_BYTES: usize = 32;

/// Error returned when the operating system cannot supply randomness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdGenerationError {
    /// The reason reported by the randomness source.
    pub reason: String,
}

impl fmt::Display for IdGenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to generate identifier: {}", self.reason)
    }
}

impl std::error::Error for IdGenerationError {}

/// Source of opaque, unguessable identifiers.
///
/// Session IDs double as the OAuth2 `state` parameter, so implementations
/// must make collisions and guessing negligible.
pub trait IdGenerator: Send + Sync {
    /// Returns a fresh identifier.
    fn generate_id(&self) -> Result<String, Report<IdGenerationError>>;
}

/// Generates URL-safe identifiers from 256 bits of OS randomness.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn generate_id(&self) -> Result<String, Report<IdGenerationError>> {
        let mut bytes = [0u8; RANDOM_ID_BYTES];
        getrandom::fill(&mut bytes).map_err(|e| IdGenerationError {
            reason: e.to_string(),
        })?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }
}
