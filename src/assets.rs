//! Asset hot-swap lifecycle.
//!
//! A swap happens in two halves. `decode_*` reads and decodes a source handle
//! without touching the scene graph and may suspend. `commit_*` then replaces
//! the displayed asset in one synchronous step, so a frame observes either the
//! old asset or the new one, never a mix of both.

use crate::context::ViewerContext;
use crate::environment::decode_hdr;
use crate::error::LoadError;
use crate::model::{DecodedMesh, parse_obj};
use crate::progress::ProgressTracker;
use crate::scene::{BoundsIndicator, EnvironmentMap, MeshObject, NodeId, SceneNode, Surface};
use crate::source::SourceHandle;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Mesh,
    Environment,
}

impl AssetKind {
    pub fn label(&self) -> &'static str {
        match self {
            AssetKind::Mesh => "mesh",
            AssetKind::Environment => "environment",
        }
    }

    /// File extensions the picker offers for this kind
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            AssetKind::Mesh => &["obj"],
            AssetKind::Environment => &["hdr"],
        }
    }
}

/// The asset currently attached to the scene, one per kind at most
#[derive(Debug, Clone)]
pub enum DisplayedAsset {
    Mesh {
        root: NodeId,
        bounds_indicator: NodeId,
    },
    Environment {
        map: Arc<EnvironmentMap>,
    },
}

/// A decoded asset that has not been attached yet
#[derive(Debug)]
pub enum DecodedAsset {
    Mesh(DecodedMesh),
    Environment(EnvironmentMap),
}

impl DecodedAsset {
    pub fn kind(&self) -> AssetKind {
        match self {
            DecodedAsset::Mesh(_) => AssetKind::Mesh,
            DecodedAsset::Environment(_) => AssetKind::Environment,
        }
    }
}

/// Read and decode a mesh. The handle is released when this returns.
pub async fn decode_mesh(
    mut handle: SourceHandle,
    progress: &ProgressTracker,
) -> Result<DecodedMesh, LoadError> {
    let ticket = progress.begin(handle.name());
    let bytes = handle.read(&ticket).await?;
    parse_obj(handle.name(), &bytes).await
}

/// Read and decode an environment map. The handle is released when this returns.
pub async fn decode_environment(
    mut handle: SourceHandle,
    progress: &ProgressTracker,
) -> Result<EnvironmentMap, LoadError> {
    let ticket = progress.begin(handle.name());
    let bytes = handle.read(&ticket).await?;
    decode_hdr(handle.name(), &bytes)
}

pub async fn decode(
    kind: AssetKind,
    handle: SourceHandle,
    progress: &ProgressTracker,
) -> Result<DecodedAsset, LoadError> {
    match kind {
        AssetKind::Mesh => decode_mesh(handle, progress).await.map(DecodedAsset::Mesh),
        AssetKind::Environment => decode_environment(handle, progress)
            .await
            .map(DecodedAsset::Environment),
    }
}

/// Owns the displayed mesh and environment and performs hot-swaps.
#[derive(Debug, Default)]
pub struct AssetSwapManager {
    mesh: Option<DisplayedAsset>,
    environment: Option<DisplayedAsset>,
    progress: ProgressTracker,
}

impl AssetSwapManager {
    pub fn new(progress: ProgressTracker) -> Self {
        Self {
            mesh: None,
            environment: None,
            progress,
        }
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    pub fn displayed(&self, kind: AssetKind) -> Option<&DisplayedAsset> {
        match kind {
            AssetKind::Mesh => self.mesh.as_ref(),
            AssetKind::Environment => self.environment.as_ref(),
        }
    }

    pub async fn load_default_mesh(
        &mut self,
        ctx: &mut ViewerContext,
        path: &str,
    ) -> Result<(), LoadError> {
        self.swap_mesh(ctx, SourceHandle::bundled(path)).await
    }

    pub async fn load_default_environment(
        &mut self,
        ctx: &mut ViewerContext,
        path: &str,
    ) -> Result<(), LoadError> {
        self.swap_environment(ctx, SourceHandle::bundled(path)).await
    }

    pub async fn swap_mesh(
        &mut self,
        ctx: &mut ViewerContext,
        handle: SourceHandle,
    ) -> Result<(), LoadError> {
        let outcome = decode_mesh(handle, &self.progress).await;
        self.commit(ctx, AssetKind::Mesh, outcome.map(DecodedAsset::Mesh))
    }

    pub async fn swap_environment(
        &mut self,
        ctx: &mut ViewerContext,
        handle: SourceHandle,
    ) -> Result<(), LoadError> {
        let outcome = decode_environment(handle, &self.progress).await;
        self.commit(
            ctx,
            AssetKind::Environment,
            outcome.map(DecodedAsset::Environment),
        )
    }

    /// Attach a decoded asset, or report why there is nothing to attach.
    ///
    /// On error the scene is left exactly as it was.
    pub fn commit(
        &mut self,
        ctx: &mut ViewerContext,
        kind: AssetKind,
        outcome: Result<DecodedAsset, LoadError>,
    ) -> Result<(), LoadError> {
        match outcome {
            Ok(DecodedAsset::Mesh(mesh)) => {
                self.commit_mesh(ctx, mesh);
                Ok(())
            }
            Ok(DecodedAsset::Environment(map)) => {
                self.commit_environment(ctx, map);
                Ok(())
            }
            Err(e) => {
                e.report(&format!("Loading {}", kind.label()));
                Err(e)
            }
        }
    }

    pub fn commit_mesh(&mut self, ctx: &mut ViewerContext, mesh: DecodedMesh) {
        let object = MeshObject {
            name: mesh.name.clone(),
            surfaces: mesh
                .parts
                .into_iter()
                .map(|part| Surface {
                    name: part.name,
                    geometry: part.geometry,
                    material: ctx.material.clone(),
                })
                .collect(),
        };
        let indicator = BoundsIndicator::new(mesh.bounds);

        self.detach_mesh(ctx);
        let root = ctx.scene.add(SceneNode::Mesh(object));
        let bounds_indicator = ctx.scene.add(SceneNode::BoundsIndicator(indicator));
        self.mesh = Some(DisplayedAsset::Mesh {
            root,
            bounds_indicator,
        });
        log::info!("Displaying mesh {}", mesh.name);
    }

    pub fn commit_environment(&mut self, ctx: &mut ViewerContext, map: EnvironmentMap) {
        let map = Arc::new(map);
        let name = map.name.clone();
        if let Some(previous) = ctx.scene.set_environment(Some(map.clone())) {
            log::debug!("Released environment {}", previous.name);
        }
        self.environment = Some(DisplayedAsset::Environment { map });
        log::info!("Displaying environment {}", name);
    }

    fn detach_mesh(&mut self, ctx: &mut ViewerContext) {
        if let Some(DisplayedAsset::Mesh {
            root,
            bounds_indicator,
        }) = self.mesh.take()
        {
            if let Some(old) = ctx.scene.remove(root) {
                log::debug!("Released mesh {}", old.name());
            }
            ctx.scene.remove(bounds_indicator);
        }
    }

    /// Detach and drop everything this manager displays.
    pub fn release_all(&mut self, ctx: &mut ViewerContext) {
        self.detach_mesh(ctx);
        if self.environment.take().is_some() {
            ctx.scene.set_environment(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::tests::tiny_hdr;

    const TRIANGLE: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

    fn mesh_root(manager: &AssetSwapManager) -> Option<NodeId> {
        match manager.displayed(AssetKind::Mesh) {
            Some(DisplayedAsset::Mesh { root, .. }) => Some(*root),
            _ => None,
        }
    }

    #[test]
    fn swap_attaches_mesh_with_shared_material() {
        let mut ctx = ViewerContext::default();
        let mut manager = AssetSwapManager::default();
        let handle = SourceHandle::picked("tri.obj", TRIANGLE.as_bytes().to_vec());
        pollster::block_on(manager.swap_mesh(&mut ctx, handle)).unwrap();

        let root = mesh_root(&manager).unwrap();
        match ctx.scene.get(root) {
            Some(SceneNode::Mesh(mesh)) => {
                assert_eq!(mesh.surfaces.len(), 1);
                assert!(mesh.surfaces[0].material.ptr_eq(&ctx.material));
            }
            other => panic!("expected a mesh node, got {:?}", other),
        }
    }

    #[test]
    fn failed_commit_changes_nothing() {
        let mut ctx = ViewerContext::default();
        let mut manager = AssetSwapManager::default();
        let before = ctx.scene.len();
        let result = manager.commit(&mut ctx, AssetKind::Environment, Err(LoadError::Cancelled));
        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(ctx.scene.len(), before);
        assert!(manager.displayed(AssetKind::Environment).is_none());
    }

    #[test]
    fn release_all_empties_the_slots() {
        let mut ctx = ViewerContext::default();
        let mut manager = AssetSwapManager::default();
        let helpers = ctx.scene.len();
        pollster::block_on(manager.swap_mesh(
            &mut ctx,
            SourceHandle::picked("tri.obj", TRIANGLE.as_bytes().to_vec()),
        ))
        .unwrap();
        pollster::block_on(
            manager.swap_environment(&mut ctx, SourceHandle::picked("sky.hdr", tiny_hdr())),
        )
        .unwrap();

        manager.release_all(&mut ctx);
        assert_eq!(ctx.scene.len(), helpers);
        assert!(ctx.scene.environment().is_none());
        assert!(manager.displayed(AssetKind::Mesh).is_none());
        assert!(manager.displayed(AssetKind::Environment).is_none());
    }

    #[test]
    fn decode_reports_its_kind() {
        let progress = ProgressTracker::new();
        let decoded = pollster::block_on(decode(
            AssetKind::Environment,
            SourceHandle::picked("sky.hdr", tiny_hdr()),
            &progress,
        ))
        .unwrap();
        assert_eq!(decoded.kind(), AssetKind::Environment);
        assert!(!progress.snapshot().visible);
    }
}
