use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct TrackedLoad {
    name: String,
    loaded: u64,
    total: Option<u64>,
}

#[derive(Debug, Default)]
struct ProgressInner {
    next_id: u64,
    active: HashMap<u64, TrackedLoad>,
    visible: bool,
    times_shown: usize,
}

/// What the progress overlay should display this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub visible: bool,
    /// 0-100, accumulated over every load still in flight
    pub percent: f32,
    pub active: usize,
}

/// Passive observer of every tracked load.
///
/// Cloning shares the same state, so background decode tasks and the render
/// loop can both hold one.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    inner: Arc<Mutex<ProgressInner>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ProgressInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start tracking a load. The load settles when the ticket is dropped.
    pub fn begin(&self, name: &str) -> LoadTicket {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.active.insert(
            id,
            TrackedLoad {
                name: name.to_string(),
                ..Default::default()
            },
        );
        if !inner.visible {
            inner.visible = true;
            inner.times_shown += 1;
            log::debug!("Loading started: {}", name);
        }
        LoadTicket {
            id,
            tracker: self.clone(),
        }
    }

    fn advance(&self, id: u64, loaded: u64, total: Option<u64>) {
        let mut inner = self.lock();
        if let Some(load) = inner.active.get_mut(&id) {
            load.loaded = loaded;
            load.total = total;
            log::trace!("Progress {}: {} / {:?} bytes", load.name, loaded, total);
        }
    }

    fn settle(&self, id: u64) {
        let mut inner = self.lock();
        if let Some(load) = inner.active.remove(&id) {
            log::debug!("Loading settled: {}", load.name);
        }
        if inner.active.is_empty() && inner.visible {
            inner.visible = false;
            log::debug!("All tracked loads complete");
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let inner = self.lock();
        let (loaded, total) = inner
            .active
            .values()
            .filter_map(|load| load.total.map(|total| (load.loaded.min(total), total)))
            .fold((0u64, 0u64), |(l, t), (loaded, total)| (l + loaded, t + total));
        let percent = if total == 0 {
            0.0
        } else {
            (loaded as f64 / total as f64 * 100.0) as f32
        };
        ProgressSnapshot {
            visible: inner.visible,
            percent,
            active: inner.active.len(),
        }
    }

    /// How many times the indicator went from hidden to visible
    pub fn times_shown(&self) -> usize {
        self.lock().times_shown
    }
}

/// One tracked load. Dropping it marks the load settled, success or not.
#[derive(Debug)]
pub struct LoadTicket {
    id: u64,
    tracker: ProgressTracker,
}

impl LoadTicket {
    pub fn advance(&self, loaded: u64, total: Option<u64>) {
        self.tracker.advance(self.id, loaded, total);
    }
}

impl Drop for LoadTicket {
    fn drop(&mut self) {
        self.tracker.settle(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_until_a_load_starts() {
        let tracker = ProgressTracker::new();
        let snapshot = tracker.snapshot();
        assert!(!snapshot.visible);
        assert_eq!(snapshot.active, 0);
        assert_eq!(tracker.times_shown(), 0);
    }

    #[test]
    fn shows_then_hides() {
        let tracker = ProgressTracker::new();
        let ticket = tracker.begin("bunny.obj");
        assert!(tracker.snapshot().visible);
        ticket.advance(50, Some(100));
        assert_eq!(tracker.snapshot().percent, 50.0);
        drop(ticket);
        assert!(!tracker.snapshot().visible);
        assert_eq!(tracker.times_shown(), 1);
    }

    #[test]
    fn percentage_accumulates_across_concurrent_loads() {
        let tracker = ProgressTracker::new();
        let mesh = tracker.begin("mesh.obj");
        let hdri = tracker.begin("sky.hdr");
        mesh.advance(100, Some(100));
        hdri.advance(0, Some(300));
        assert_eq!(tracker.snapshot().percent, 25.0);

        // Still visible while the environment is in flight
        drop(mesh);
        let snapshot = tracker.snapshot();
        assert!(snapshot.visible);
        assert_eq!(snapshot.active, 1);
        assert_eq!(snapshot.percent, 0.0);

        drop(hdri);
        assert!(!tracker.snapshot().visible);
        assert_eq!(tracker.times_shown(), 1);
    }

    #[test]
    fn unknown_totals_do_not_count() {
        let tracker = ProgressTracker::new();
        let ticket = tracker.begin("stream");
        ticket.advance(512, None);
        assert_eq!(tracker.snapshot().percent, 0.0);
    }
}
