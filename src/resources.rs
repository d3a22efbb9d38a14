use crate::error::LoadError;
use crate::progress::LoadTicket;

#[cfg(not(target_arch = "wasm32"))]
const READ_CHUNK: usize = 64 * 1024;

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> Result<reqwest::Url, LoadError> {
    let fetch_error = |reason: String| LoadError::Fetch {
        url: file_name.to_string(),
        reason,
    };
    let window = web_sys::window().ok_or_else(|| fetch_error("no window".into()))?;
    let location = window.location();
    let origin = location
        .origin()
        .map_err(|e| fetch_error(format!("{:?}", e)))?;
    let pathname = location
        .pathname()
        .map_err(|e| fetch_error(format!("{:?}", e)))?;
    let base = reqwest::Url::parse(&format!("{}{}/res/", origin, pathname.trim_end_matches('/')))
        .map_err(|e| fetch_error(e.to_string()))?;
    base.join(file_name).map_err(|e| fetch_error(e.to_string()))
}

/// Location of a bundled resource on disk. Absolute paths are used as given.
#[cfg(not(target_arch = "wasm32"))]
pub fn resource_path(file_name: &str) -> std::path::PathBuf {
    std::path::Path::new(env!("OUT_DIR"))
        .join("res")
        .join(file_name)
}

pub async fn load_string(file_name: &str) -> anyhow::Result<String> {
    #[cfg(target_arch = "wasm32")]
    let txt = {
        let url = format_url(file_name)?;
        let response = reqwest::get(url).await?.error_for_status()?;
        response.text().await?
    };
    #[cfg(not(target_arch = "wasm32"))]
    let txt = std::fs::read_to_string(resource_path(file_name))?;

    Ok(txt)
}

/// Read a bundled resource, reporting bytes as they arrive.
pub async fn load_binary(file_name: &str, ticket: &LoadTicket) -> Result<Vec<u8>, LoadError> {
    #[cfg(target_arch = "wasm32")]
    {
        let url = format_url(file_name)?;
        let fetch_error = |e: reqwest::Error| LoadError::Fetch {
            url: file_name.to_string(),
            reason: e.to_string(),
        };
        let response = reqwest::get(url).await.map_err(fetch_error)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(LoadError::NotFound {
                path: file_name.to_string(),
            });
        }
        let response = response.error_for_status().map_err(fetch_error)?;
        let total = response.content_length();
        ticket.advance(0, total);
        let data = response.bytes().await.map_err(fetch_error)?.to_vec();
        ticket.advance(data.len() as u64, Some(data.len() as u64));
        Ok(data)
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        use std::io::{ErrorKind, Read};

        let path = resource_path(file_name);
        let io_error = |source: std::io::Error| match source.kind() {
            ErrorKind::NotFound => LoadError::NotFound {
                path: path.display().to_string(),
            },
            _ => LoadError::Io {
                name: file_name.to_string(),
                source,
            },
        };

        let mut file = std::fs::File::open(&path).map_err(io_error)?;
        let total = file.metadata().map(|m| m.len()).ok();
        ticket.advance(0, total);

        let mut data = Vec::with_capacity(total.unwrap_or(0) as usize);
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            let n = file.read(&mut chunk).map_err(io_error)?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..n]);
            ticket.advance(data.len() as u64, total);
        }
        Ok(data)
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::progress::ProgressTracker;

    #[test]
    fn bundled_mesh_is_readable() {
        let tracker = ProgressTracker::new();
        let ticket = tracker.begin(crate::defaults::DEFAULT_OBJ_PATH);
        let data =
            pollster::block_on(load_binary(crate::defaults::DEFAULT_OBJ_PATH, &ticket)).unwrap();
        assert!(!data.is_empty());
        assert_eq!(tracker.snapshot().percent, 100.0);
    }

    #[test]
    fn missing_resource_is_not_found() {
        let tracker = ProgressTracker::new();
        let ticket = tracker.begin("missing.obj");
        let err = pollster::block_on(load_binary("assets/missing.obj", &ticket)).unwrap_err();
        assert!(matches!(err, LoadError::NotFound { .. }));
    }
}
