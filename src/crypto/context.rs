//! One-time readiness gate for the crypto backend.
//!
//! Key material and fresh randomness can only be produced through a
//! [`CryptoContext`], which is only handed out once [`ready`] has confirmed
//! that the operating system RNG works.

use crate::utils::{CryptoError, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::OnceLock;

static READY: OnceLock<()> = OnceLock::new();

/// Capability proving the crypto backend passed its readiness check.
///
/// The context is a zero-sized `Copy` token; pass it by reference wherever a
/// constructor needs randomness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CryptoContext {
    _ready: (),
}

/// Run the readiness check once per process and return the capability.
///
/// # Errors
///
/// Returns `CryptoError::Initialization` if the system RNG is unavailable.
/// A failed check is not cached, so the call may be retried.
pub fn ready() -> Result<CryptoContext> {
    if READY.get().is_none() {
        let mut probe = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut probe)
            .map_err(|e| CryptoError::Initialization {
                reason: e.to_string(),
            })?;

        if READY.set(()).is_ok() {
            log::debug!("crypto backend ready");
        }
    }

    Ok(CryptoContext { _ready: () })
}

impl CryptoContext {
    /// Handle to the CSPRNG backing this context
    pub(crate) fn rng(&self) -> OsRng {
        OsRng
    }

    /// Fill a fixed-size buffer with random bytes
    pub(crate) fn random_bytes<const N: usize>(&self) -> [u8; N] {
        let mut bytes = [0u8; N];
        self.rng().fill_bytes(&mut bytes);
        bytes
    }
}
