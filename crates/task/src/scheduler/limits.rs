//! Concurrency caps for provider calls
//!
//! A dispatch holds one global permit and one permit for its provider kind
//! for as long as the call is outstanding. The caps are shared by every job
//! that runs against the same context.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use taleweave_config::ConcurrencyConfig;
use taleweave_core::ProviderKind;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// In-flight counter with a high-water mark
#[derive(Debug, Default)]
pub struct Gauge {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
struct Lane {
    cap: usize,
    semaphore: Arc<Semaphore>,
    gauge: Arc<Gauge>,
}

impl Lane {
    fn new(cap: usize) -> Self {
        Self {
            cap,
            semaphore: Arc::new(Semaphore::new(cap)),
            gauge: Arc::new(Gauge::default()),
        }
    }
}

/// Global and per-kind concurrency limits
#[derive(Debug)]
pub struct ConcurrencyLimits {
    global: Lane,
    text: Lane,
    image: Lane,
}

impl ConcurrencyLimits {
    pub fn new(global: usize, text: usize, image: usize) -> Self {
        Self {
            global: Lane::new(global),
            text: Lane::new(text),
            image: Lane::new(image),
        }
    }

    pub fn from_config(config: &ConcurrencyConfig) -> Self {
        Self::new(config.global, config.text, config.image)
    }

    fn lane(&self, kind: ProviderKind) -> &Lane {
        match kind {
            ProviderKind::Text => &self.text,
            ProviderKind::Image => &self.image,
        }
    }

    /// Take a slot for `kind` if one is free right now
    pub fn try_acquire(&self, kind: ProviderKind) -> Option<DispatchPermit> {
        let lane = self.lane(kind);
        let kind_permit = Arc::clone(&lane.semaphore).try_acquire_owned().ok()?;
        let global_permit = Arc::clone(&self.global.semaphore).try_acquire_owned().ok()?;
        Some(self.permit(lane, kind_permit, global_permit))
    }

    /// Wait for a slot for `kind`
    ///
    /// The kind permit is taken first so a waiter never sits on a global
    /// slot that another kind could use. Returns `None` only if the
    /// semaphores were closed.
    pub async fn acquire(&self, kind: ProviderKind) -> Option<DispatchPermit> {
        let lane = self.lane(kind);
        let kind_permit = Arc::clone(&lane.semaphore).acquire_owned().await.ok()?;
        let global_permit = Arc::clone(&self.global.semaphore)
            .acquire_owned()
            .await
            .ok()?;
        Some(self.permit(lane, kind_permit, global_permit))
    }

    fn permit(
        &self,
        lane: &Lane,
        kind_permit: OwnedSemaphorePermit,
        global_permit: OwnedSemaphorePermit,
    ) -> DispatchPermit {
        lane.gauge.enter();
        self.global.gauge.enter();
        DispatchPermit {
            _kind: kind_permit,
            _global: global_permit,
            kind_gauge: Arc::clone(&lane.gauge),
            global_gauge: Arc::clone(&self.global.gauge),
        }
    }

    pub fn cap(&self, kind: ProviderKind) -> usize {
        self.lane(kind).cap
    }

    pub fn global_cap(&self) -> usize {
        self.global.cap
    }

    pub fn in_flight(&self, kind: ProviderKind) -> usize {
        self.lane(kind).gauge.in_flight()
    }

    /// Highest number of simultaneous calls of `kind` seen so far
    pub fn peak(&self, kind: ProviderKind) -> usize {
        self.lane(kind).gauge.peak()
    }

    pub fn global_peak(&self) -> usize {
        self.global.gauge.peak()
    }
}

/// Slot held for the duration of one provider call
#[derive(Debug)]
pub struct DispatchPermit {
    _kind: OwnedSemaphorePermit,
    _global: OwnedSemaphorePermit,
    kind_gauge: Arc<Gauge>,
    global_gauge: Arc<Gauge>,
}

impl Drop for DispatchPermit {
    fn drop(&mut self) {
        self.kind_gauge.exit();
        self.global_gauge.exit();
    }
}
