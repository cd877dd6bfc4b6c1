//! Scoped engine session
//!
//! The original tool family kept its execution context as ambient
//! process-wide state with explicit init/stop calls. Here the context is a
//! value: [`Session::open`] acquires the process-wide slot, every engine
//! operation takes `&Session` explicitly, and dropping the handle releases
//! the slot on every exit path, error paths included. A second open while a
//! session is live fails instead of silently re-initializing.

use std::sync::atomic::{AtomicBool, Ordering};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{GvkitError, Result};

static SESSION_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Reference genome a session (and every dataset written under it) is
/// pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum ReferenceGenome {
    /// GRCh38 / hg38 (default).
    #[value(name = "GRCh38")]
    #[serde(rename = "GRCh38")]
    Grch38,
    /// GRCh37 / hg19.
    #[value(name = "GRCh37")]
    #[serde(rename = "GRCh37")]
    Grch37,
}

impl Default for ReferenceGenome {
    fn default() -> Self {
        ReferenceGenome::Grch38
    }
}

impl std::fmt::Display for ReferenceGenome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceGenome::Grch38 => write!(f, "GRCh38"),
            ReferenceGenome::Grch37 => write!(f, "GRCh37"),
        }
    }
}

/// Local execution configuration for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Core budget for local execution. Must be at least 1.
    pub cores: usize,
    /// Driver memory budget, e.g. `"8g"`.
    pub driver_memory: String,
    /// Reference genome recorded into every dataset written.
    pub reference_genome: ReferenceGenome,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cores: 4,
            driver_memory: String::from("4g"),
            reference_genome: ReferenceGenome::default(),
        }
    }
}

impl SessionConfig {
    fn validate(&self) -> Result<()> {
        if self.cores < 1 {
            return Err(GvkitError::InvalidCores(self.cores));
        }
        parse_memory_spec(&self.driver_memory)?;
        Ok(())
    }
}

/// Parse a memory spec like `"8g"` or `"512m"` into bytes.
fn parse_memory_spec(spec: &str) -> Result<u64> {
    let lower = spec.trim().to_ascii_lowercase();
    let (digits, multiplier) = if let Some(digits) = lower.strip_suffix('k') {
        (digits, 1u64 << 10)
    } else if let Some(digits) = lower.strip_suffix('m') {
        (digits, 1 << 20)
    } else if let Some(digits) = lower.strip_suffix('g') {
        (digits, 1 << 30)
    } else {
        return Err(GvkitError::InvalidMemory(spec.to_string()));
    };
    let value: u64 = digits
        .parse()
        .map_err(|_| GvkitError::InvalidMemory(spec.to_string()))?;
    if value == 0 {
        return Err(GvkitError::InvalidMemory(spec.to_string()));
    }
    Ok(value * multiplier)
}

/// Live engine session. At most one per process.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
}

impl Session {
    /// Validate `config` and acquire the process-wide session slot.
    pub fn open(config: SessionConfig) -> Result<Session> {
        config.validate()?;
        if SESSION_ACTIVE.swap(true, Ordering::SeqCst) {
            return Err(GvkitError::SessionActive);
        }
        info!(
            cores = config.cores,
            driver_memory = %config.driver_memory,
            reference_genome = %config.reference_genome,
            "engine session opened"
        );
        Ok(Session { config })
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Reference genome this session is pinned to.
    pub fn reference_genome(&self) -> ReferenceGenome {
        self.config.reference_genome
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        SESSION_ACTIVE.store(false, Ordering::SeqCst);
        info!("engine session closed");
    }
}

/// Serialize tests that need the process-wide session slot.
#[cfg(test)]
pub(crate) fn lock_for_tests() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
