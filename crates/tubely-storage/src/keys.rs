//! Storage key derivation.
//!
//! A key is `{prefix}{hex}.{extension}` where `hex` is 16 bytes from the
//! operating system CSPRNG. Uniqueness comes from randomness alone; no
//! coordination with the object store is needed.

use rand::rngs::OsRng;
use rand::TryRngCore;
use thiserror::Error;

/// Random bytes per key (128 bits).
pub const KEY_RANDOM_BYTES: usize = 16;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("random source unavailable: {0}")]
    RandomSource(String),

    #[error("invalid key extension: {0:?}")]
    InvalidExtension(String),
}

/// Derive a key from the OS random source.
///
/// `OsRng` is stateless, so concurrent callers need no locking.
pub fn derive_storage_key(prefix: &str, extension: &str) -> Result<String, KeyError> {
    derive_storage_key_with(&mut OsRng, prefix, extension)
}

/// Derive a key from an explicit random source.
///
/// A failing source is surfaced as [`KeyError::RandomSource`]; there is no
/// fallback to a weaker generator.
pub fn derive_storage_key_with<R>(
    rng: &mut R,
    prefix: &str,
    extension: &str,
) -> Result<String, KeyError>
where
    R: TryRngCore + ?Sized,
{
    if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(KeyError::InvalidExtension(extension.to_string()));
    }

    let mut bytes = [0u8; KEY_RANDOM_BYTES];
    rng.try_fill_bytes(&mut bytes)
        .map_err(|e| KeyError::RandomSource(e.to_string()))?;

    Ok(format!("{}{}.{}", prefix, hex::encode(bytes), extension))
}
