use crate::assets::AssetKind;
use crate::error::LoadError;
use crate::source::SourceHandle;

/// Ask the user for a file of the given kind and wrap its bytes in a
/// transient handle.
pub async fn pick_source(kind: AssetKind) -> Result<SourceHandle, LoadError> {
    let file = rfd::AsyncFileDialog::new()
        .set_title(format!("Load {}", kind.label()))
        .add_filter(kind.label(), kind.extensions())
        .pick_file()
        .await
        .ok_or(LoadError::Cancelled)?;

    let name = file.file_name();
    let bytes = read_file(&file).await?;
    log::info!("Picked {} ({} bytes)", name, bytes.len());

    Ok(SourceHandle::picked(name, bytes)
        .on_release(|name| log::debug!("Revoked transient source {}", name)))
}

#[cfg(not(target_arch = "wasm32"))]
async fn read_file(file: &rfd::FileHandle) -> Result<Vec<u8>, LoadError> {
    // Read through std::fs so I/O failures surface as errors
    std::fs::read(file.path()).map_err(|source| LoadError::Io {
        name: file.file_name(),
        source,
    })
}

#[cfg(target_arch = "wasm32")]
async fn read_file(file: &rfd::FileHandle) -> Result<Vec<u8>, LoadError> {
    Ok(file.read().await)
}
