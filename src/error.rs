/// Everything that can go wrong while bringing an asset into the scene.
///
/// None of these are fatal: callers log them and keep the previous asset.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("resource not found: {path}")]
    NotFound { path: String },
    #[error("failed to read {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("file selection cancelled")]
    Cancelled,
    #[error("failed to decode mesh {name}: {source}")]
    DecodeMesh {
        name: String,
        #[source]
        source: tobj::LoadError,
    },
    #[error("mesh {name} contains no geometry")]
    EmptyMesh { name: String },
    #[error("failed to decode environment {name}: {source}")]
    DecodeEnvironment {
        name: String,
        #[source]
        source: image::ImageError,
    },
}

impl LoadError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoadError::Cancelled)
    }

    /// Log at the severity the failure deserves. A cancelled picker is not an error.
    pub fn report(&self, what: &str) {
        if self.is_cancelled() {
            log::info!("{} skipped: {}", what, self);
        } else {
            log::error!("{} failed: {}", what, self);
        }
    }
}
