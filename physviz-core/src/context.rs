//! Capability provider context
//!
//! Holds exactly one `DeviceCapabilities` snapshot and republishes a fresh
//! one when the host reports a display scale change. Consumers read the
//! snapshot through `current()`; reading after `teardown()` is a contract
//! violation and panics rather than returning stale data.

use crate::capability::DeviceCapabilities;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Receives replacement snapshots when the pixel ratio changes.
pub trait CapabilitySubscriber: Send + Sync {
    fn on_capabilities_changed(&self, caps: &DeviceCapabilities);
}

/// Single-owner provider for the detected capability snapshot.
pub struct CapabilityContext {
    snapshot: RwLock<Arc<DeviceCapabilities>>,
    subscribers: RwLock<Vec<Weak<dyn CapabilitySubscriber>>>,
    active: AtomicBool,
}

impl CapabilityContext {
    pub fn new(caps: DeviceCapabilities) -> Self {
        debug_assert!(caps.invariants_hold(), "detector produced an inconsistent snapshot");
        Self {
            snapshot: RwLock::new(Arc::new(caps)),
            subscribers: RwLock::new(Vec::new()),
            active: AtomicBool::new(true),
        }
    }

    /// The current snapshot.
    ///
    /// # Panics
    ///
    /// Panics if the context has been torn down. That is a programming
    /// error in the host (a consumer outliving its provider), not a
    /// recoverable runtime fault.
    pub fn current(&self) -> Arc<DeviceCapabilities> {
        assert!(
            self.active.load(Ordering::Acquire),
            "CapabilityContext::current() called outside an active provider scope"
        );
        self.snapshot.read().clone()
    }

    /// Human-readable status line for the active render path.
    pub fn status_message(&self) -> &'static str {
        self.current().render_path.status_message()
    }

    /// Republish a new snapshot with only the pixel ratio overwritten.
    ///
    /// The adapter probe is intentionally not re-run: GPU capability does
    /// not change mid-session, only display scale does.
    pub fn set_pixel_ratio(&self, ratio: f64) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        let updated = {
            let mut guard = self.snapshot.write();
            let updated = Arc::new(guard.with_pixel_ratio(ratio));
            *guard = updated.clone();
            updated
        };
        log::debug!("capability snapshot republished at pixel ratio {}", updated.device_pixel_ratio);
        self.notify(&updated);
    }

    pub fn subscribe(&self, subscriber: &Arc<dyn CapabilitySubscriber>) {
        self.subscribers.write().push(Arc::downgrade(subscriber));
    }

    /// End of the provider's lifetime: drop subscribers and refuse further
    /// lookups. Idempotent.
    pub fn teardown(&self) {
        self.active.store(false, Ordering::Release);
        self.subscribers.write().clear();
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn notify(&self, caps: &DeviceCapabilities) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|weak| weak.strong_count() > 0);
        for weak in subscribers.iter() {
            if let Some(subscriber) = weak.upgrade() {
                subscriber.on_capabilities_changed(caps);
            }
        }
    }
}
