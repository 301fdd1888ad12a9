use std::sync::Arc;

use parking_lot::RwLock;

use crate::models::config::CaptureConfig;

/// Supplies the capture configuration, read once at the start of every capture.
pub trait ConfigProvider: Send + Sync {
    fn capture_config(&self) -> CaptureConfig;
}

impl ConfigProvider for CaptureConfig {
    fn capture_config(&self) -> CaptureConfig {
        self.clone()
    }
}

/// Configuration the host can change at runtime (e.g. from a settings page).
///
/// Changes take effect on the next capture; a capture in flight keeps the
/// values it started with.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<CaptureConfig>>,
}

impl SharedConfig {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    pub fn update(&self, f: impl FnOnce(&mut CaptureConfig)) {
        let mut config = self.inner.write();
        f(&mut config);
    }

    pub fn set(&self, config: CaptureConfig) {
        *self.inner.write() = config;
    }
}

impl ConfigProvider for SharedConfig {
    fn capture_config(&self) -> CaptureConfig {
        self.inner.read().clone()
    }
}
