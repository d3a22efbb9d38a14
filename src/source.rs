use crate::error::LoadError;
use crate::progress::LoadTicket;
use crate::resources;
use std::fmt;

type ReleaseHook = Box<dyn FnOnce(&str) + Send>;

enum Origin {
    /// A resource shipped with the viewer, read on demand
    Bundled(String),
    /// Bytes the user picked; taken out on the first read
    Picked(Vec<u8>),
}

/// A readable source for exactly one load operation.
///
/// The handle is consumed by the decode step. Dropping it runs the release
/// hook, so the hook fires exactly once whether decoding succeeded or not.
pub struct SourceHandle {
    name: String,
    origin: Origin,
    on_release: Option<ReleaseHook>,
}

impl SourceHandle {
    pub fn bundled(path: &str) -> Self {
        Self {
            name: path.to_string(),
            origin: Origin::Bundled(path.to_string()),
            on_release: None,
        }
    }

    pub fn picked(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            origin: Origin::Picked(bytes),
            on_release: None,
        }
    }

    /// Run `hook` with the handle name when the handle is released.
    pub fn on_release(mut self, hook: impl FnOnce(&str) + Send + 'static) -> Self {
        self.on_release = Some(Box::new(hook));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_transient(&self) -> bool {
        matches!(self.origin, Origin::Picked(_))
    }

    pub async fn read(&mut self, ticket: &LoadTicket) -> Result<Vec<u8>, LoadError> {
        match &mut self.origin {
            Origin::Bundled(path) => resources::load_binary(path, ticket).await,
            Origin::Picked(bytes) => {
                let bytes = std::mem::take(bytes);
                let len = bytes.len() as u64;
                ticket.advance(len, Some(len));
                Ok(bytes)
            }
        }
    }
}

impl fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceHandle")
            .field("name", &self.name)
            .field("transient", &self.is_transient())
            .finish()
    }
}

impl Drop for SourceHandle {
    fn drop(&mut self) {
        if let Some(hook) = self.on_release.take() {
            log::debug!("Releasing source handle {}", self.name);
            hook(&self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressTracker;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn picked_bytes_are_read_once() {
        let tracker = ProgressTracker::new();
        let ticket = tracker.begin("mesh.obj");
        let mut handle = SourceHandle::picked("mesh.obj", b"v 0 0 0".to_vec());
        assert!(handle.is_transient());
        let first = pollster::block_on(handle.read(&ticket)).unwrap();
        assert_eq!(first, b"v 0 0 0");
        let second = pollster::block_on(handle.read(&ticket)).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn release_hook_runs_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let handle = SourceHandle::picked("sky.hdr", vec![1, 2, 3]).on_release(move |name| {
            assert_eq!(name, "sky.hdr");
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(released.load(Ordering::SeqCst), 0);
        drop(handle);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
