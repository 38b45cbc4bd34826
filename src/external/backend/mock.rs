use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::{DisplayBackend, DisplayDescriptor};

/// An in-memory [DisplayBackend], usable when testing or running without
/// DDC-capable hardware.
///
/// Clones share the same displays, so a test can keep one clone around to
/// inspect what the "hardware" ended up with.
#[derive(Debug, Clone)]
pub struct MockDisplayBackend {
    displays: Arc<Mutex<Vec<DisplayDescriptor>>>,
    should_fail: Arc<AtomicBool>,
}

impl MockDisplayBackend {
    /// Create a backend which reports the given displays
    pub fn new(displays: Vec<DisplayDescriptor>) -> MockDisplayBackend {
        MockDisplayBackend {
            displays: Arc::new(Mutex::new(displays)),
            should_fail: Arc::new(AtomicBool::new(false)),
        }
    }

    fn lock_displays(&self) -> std::sync::MutexGuard<'_, Vec<DisplayDescriptor>> {
        self.displays.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_failure(&self) -> Result<()> {
        if self.should_fail.load(Ordering::Acquire) {
            Err(anyhow!("Mock DisplayBackend is failing"))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
impl MockDisplayBackend {
    /// Set whether operations on this backend should return an error or not
    pub fn set_failure_mode(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::Release);
    }

    /// Replace the set of connected displays, as if monitors were plugged in
    /// or out.
    pub fn replace_displays(&self, displays: Vec<DisplayDescriptor>) {
        *self.lock_displays() = displays;
    }

    /// The brightness the "hardware" currently has
    pub fn get_brightness(&self, id: &str) -> Option<u16> {
        self.lock_displays()
            .iter()
            .find(|d| d.id == id)
            .map(|d| d.brightness)
    }
}

#[async_trait]
impl DisplayBackend for MockDisplayBackend {
    async fn list_displays(&self) -> Result<Vec<DisplayDescriptor>> {
        self.check_failure()?;
        Ok(self.lock_displays().clone())
    }

    async fn set_brightness(&self, id: &str, value: u16) -> Result<()> {
        if value > 100 {
            return Err(anyhow!("Cannot set brightness higher than 100%"));
        }
        self.check_failure()?;
        let mut displays = self.lock_displays();
        let display = displays
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| anyhow!("Display not found"))?;
        display.brightness = value;
        Ok(())
    }
}

#[cfg(test)]
pub use manual::*;
