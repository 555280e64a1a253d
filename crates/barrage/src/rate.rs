//! 🎚️ The rate knob: requests per second, shared between whoever reads it and whoever twists it.
//!
//! The downstream engine reads it on every dispatch. The operator writes it from
//! the prompt. The status loop reads it to print the prompt. Three parties, one
//! number, zero locks: the `f64` lives in an `AtomicU64` as raw bits.
//! Staleness of up to one status tick is fine. Nobody is flying a plane with this. 🦆

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// 🎚️ A cloneable, lock-free `f64` slot. Clones share the same value.
#[derive(Debug, Clone)]
pub struct RateCell {
    bits: Arc<AtomicU64>,
}

impl RateCell {
    pub fn new(rate: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(rate.to_bits())),
        }
    }

    /// 📖 Current target rate in requests / second.
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// ✏️ Replace the target rate. Every clone sees it on its next `get`.
    pub fn set(&self, rate: f64) {
        self.bits.store(rate.to_bits(), Ordering::Relaxed);
    }
}

impl Default for RateCell {
    fn default() -> Self {
        Self::new(0.0)
    }
}
