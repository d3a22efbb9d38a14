use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use three_d_viewer::assets::{self, AssetKind, AssetSwapManager, DisplayedAsset};
use three_d_viewer::context::ViewerContext;
use three_d_viewer::defaults::{DEFAULT_HDRI_PATH, DEFAULT_OBJ_PATH};
use three_d_viewer::error::LoadError;
use three_d_viewer::material::srgb8_to_linear;
use three_d_viewer::panel::{PanelEdit, apply_edit};
use three_d_viewer::scene::{NodeId, SceneNode};
use three_d_viewer::source::SourceHandle;

const CUBE_A: &str = "o a\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
const CUBE_B: &str = "o b\nv 0 0 0\nv 2 0 0\nv 0 2 0\nv 2 2 0\nf 1 2 3\nf 2 4 3\n";

/// Two flat RGBE pixels
fn tiny_hdr() -> Vec<u8> {
    let mut bytes = b"#?RADIANCE\nFORMAT=32-bit_rle_rgbe\n\n-Y 1 +X 2\n".to_vec();
    bytes.extend_from_slice(&[128, 128, 128, 129, 255, 0, 0, 128]);
    bytes
}

fn obj(name: &str, text: &str) -> SourceHandle {
    SourceHandle::picked(name, text.as_bytes().to_vec())
}

fn mesh_ids(manager: &AssetSwapManager) -> Option<(NodeId, NodeId)> {
    match manager.displayed(AssetKind::Mesh) {
        Some(DisplayedAsset::Mesh {
            root,
            bounds_indicator,
        }) => Some((*root, *bounds_indicator)),
        _ => None,
    }
}

fn mesh_count(ctx: &ViewerContext) -> usize {
    ctx.scene.count(SceneNode::is_mesh)
}

fn indicator_count(ctx: &ViewerContext) -> usize {
    ctx.scene.count(SceneNode::is_bounds_indicator)
}

#[cfg(test)]
mod asset_swap_tests {
    use super::*;

    #[test]
    fn test_bundled_defaults_load_at_startup() {
        let mut ctx = ViewerContext::default();
        let mut manager = AssetSwapManager::default();

        pollster::block_on(manager.load_default_mesh(&mut ctx, DEFAULT_OBJ_PATH)).unwrap();
        pollster::block_on(manager.load_default_environment(&mut ctx, DEFAULT_HDRI_PATH)).unwrap();

        assert_eq!(mesh_count(&ctx), 1);
        assert_eq!(indicator_count(&ctx), 1);
        assert!(!manager.progress().snapshot().visible);

        let background = ctx.scene.background().unwrap();
        let environment = ctx.scene.environment().unwrap();
        assert!(Arc::ptr_eq(background, environment));
        match manager.displayed(AssetKind::Environment) {
            Some(DisplayedAsset::Environment { map }) => assert!(Arc::ptr_eq(map, environment)),
            other => panic!("expected an environment, got {:?}", other),
        }
    }

    #[test]
    fn test_second_swap_replaces_the_first() {
        let mut ctx = ViewerContext::default();
        let mut manager = AssetSwapManager::default();

        pollster::block_on(manager.swap_mesh(&mut ctx, obj("a.obj", CUBE_A))).unwrap();
        let (first_root, first_indicator) = mesh_ids(&manager).unwrap();
        pollster::block_on(manager.swap_mesh(&mut ctx, obj("b.obj", CUBE_B))).unwrap();
        let (root, indicator) = mesh_ids(&manager).unwrap();

        assert_eq!(mesh_count(&ctx), 1);
        assert_eq!(indicator_count(&ctx), 1);
        assert!(!ctx.scene.contains(first_root));
        assert!(!ctx.scene.contains(first_indicator));
        assert_eq!(ctx.scene.get(root).unwrap().name(), "b.obj");
        match ctx.scene.get(indicator) {
            Some(SceneNode::BoundsIndicator(bounds)) => {
                assert_eq!(bounds.bounds.max, [2.0, 2.0, 0.0]);
            }
            other => panic!("expected a bounds indicator, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_mesh_swap_keeps_displayed_mesh() {
        let mut ctx = ViewerContext::default();
        let mut manager = AssetSwapManager::default();
        pollster::block_on(manager.swap_mesh(&mut ctx, obj("a.obj", CUBE_A))).unwrap();
        let before = mesh_ids(&manager).unwrap();
        let nodes = ctx.scene.len();

        let broken = SourceHandle::picked("broken.obj", vec![0xff, 0xfe, 0x00, 0x9f]);
        let err = pollster::block_on(manager.swap_mesh(&mut ctx, broken)).unwrap_err();

        assert!(matches!(
            err,
            LoadError::DecodeMesh { .. } | LoadError::EmptyMesh { .. }
        ));
        assert_eq!(mesh_ids(&manager), Some(before));
        assert_eq!(ctx.scene.len(), nodes);
    }

    #[test]
    fn test_failed_environment_swap_keeps_displayed_environment() {
        let mut ctx = ViewerContext::default();
        let mut manager = AssetSwapManager::default();
        pollster::block_on(
            manager.swap_environment(&mut ctx, SourceHandle::picked("sky.hdr", tiny_hdr())),
        )
        .unwrap();
        let before = ctx.scene.environment().unwrap().clone();

        let broken = SourceHandle::picked("broken.hdr", b"not radiance".to_vec());
        let err = pollster::block_on(manager.swap_environment(&mut ctx, broken)).unwrap_err();

        assert!(matches!(err, LoadError::DecodeEnvironment { .. }));
        assert!(Arc::ptr_eq(ctx.scene.environment().unwrap(), &before));
        assert!(Arc::ptr_eq(ctx.scene.background().unwrap(), &before));
    }

    #[test]
    fn test_every_source_is_released_exactly_once() {
        let mut ctx = ViewerContext::default();
        let mut manager = AssetSwapManager::default();
        let released = Arc::new(AtomicUsize::new(0));
        let counted = |handle: SourceHandle| {
            let released = released.clone();
            handle.on_release(move |_| {
                released.fetch_add(1, Ordering::SeqCst);
            })
        };

        let _ = pollster::block_on(manager.swap_mesh(&mut ctx, counted(obj("a.obj", CUBE_A))));
        let _ = pollster::block_on(manager.swap_mesh(&mut ctx, counted(obj("junk.obj", "\u{0}"))));
        let _ = pollster::block_on(manager.swap_environment(
            &mut ctx,
            counted(SourceHandle::picked("sky.hdr", tiny_hdr())),
        ));
        let _ = pollster::block_on(manager.swap_environment(
            &mut ctx,
            counted(SourceHandle::picked("junk.hdr", b"junk".to_vec())),
        ));

        assert_eq!(released.load(Ordering::SeqCst), 4);
        manager.release_all(&mut ctx);
        assert_eq!(released.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_material_edit_reaches_every_surface() {
        let mut ctx = ViewerContext::default();
        let mut manager = AssetSwapManager::default();
        pollster::block_on(manager.load_default_mesh(&mut ctx, DEFAULT_OBJ_PATH)).unwrap();

        apply_edit(&mut ctx, PanelEdit::Color([255, 0, 0]));
        apply_edit(&mut ctx, PanelEdit::Wireframe(true));

        let (root, _) = mesh_ids(&manager).unwrap();
        let surfaces = match ctx.scene.get(root) {
            Some(SceneNode::Mesh(mesh)) => &mesh.surfaces,
            other => panic!("expected a mesh node, got {:?}", other),
        };
        assert!(surfaces.len() >= 2);
        for surface in surfaces {
            let material = surface.material.get();
            assert_eq!(material.color, srgb8_to_linear([255, 0, 0]));
            assert!(material.wireframe);
        }
    }

    #[test]
    fn test_material_survives_a_swap() {
        let mut ctx = ViewerContext::default();
        let mut manager = AssetSwapManager::default();
        apply_edit(&mut ctx, PanelEdit::Roughness(0.8));
        pollster::block_on(manager.swap_mesh(&mut ctx, obj("a.obj", CUBE_A))).unwrap();
        pollster::block_on(manager.swap_mesh(&mut ctx, obj("b.obj", CUBE_B))).unwrap();

        let (root, _) = mesh_ids(&manager).unwrap();
        match ctx.scene.get(root) {
            Some(SceneNode::Mesh(mesh)) => {
                assert!(mesh.surfaces[0].material.ptr_eq(&ctx.material));
                assert_eq!(mesh.surfaces[0].material.get().roughness, 0.8);
            }
            other => panic!("expected a mesh node, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_default_mesh_shows_progress_once_and_leaves_scene_empty() {
        let mut ctx = ViewerContext::default();
        let mut manager = AssetSwapManager::default();

        let err = pollster::block_on(manager.load_default_mesh(&mut ctx, "assets/missing.obj"))
            .unwrap_err();

        assert!(matches!(err, LoadError::NotFound { .. }));
        assert_eq!(manager.progress().times_shown(), 1);
        assert!(!manager.progress().snapshot().visible);
        assert_eq!(mesh_count(&ctx), 0);
        assert!(manager.displayed(AssetKind::Mesh).is_none());
    }

    #[test]
    fn test_exposure_edit_is_clamped() {
        let mut ctx = ViewerContext::default();
        apply_edit(&mut ctx, PanelEdit::Exposure(1000.0));
        assert_eq!(ctx.exposure, 30.0);
        apply_edit(&mut ctx, PanelEdit::Exposure(-5.0));
        assert_eq!(ctx.exposure, 0.0);
    }

    #[test]
    fn test_bundled_defaults_decode_in_background_then_commit() {
        let mut ctx = ViewerContext::default();
        let mut manager = AssetSwapManager::default();
        let progress = manager.progress().clone();

        // Another load still in flight keeps the overlay up across both decodes
        let pending = progress.begin("pending.obj");
        pending.advance(0, Some(100));

        let workers: Vec<_> = [
            (AssetKind::Mesh, DEFAULT_OBJ_PATH),
            (AssetKind::Environment, DEFAULT_HDRI_PATH),
        ]
        .into_iter()
        .map(|(kind, path)| {
            let progress = progress.clone();
            thread::spawn(move || {
                let handle = SourceHandle::bundled(path);
                (kind, pollster::block_on(assets::decode(kind, handle, &progress)))
            })
        })
        .collect();
        let outcomes: Vec<_> = workers
            .into_iter()
            .map(|worker| worker.join().unwrap())
            .collect();

        let snapshot = progress.snapshot();
        assert!(snapshot.visible);
        assert_eq!(snapshot.active, 1);
        assert_eq!(progress.times_shown(), 1);
        assert_eq!(mesh_count(&ctx), 0);

        for (kind, outcome) in outcomes {
            manager.commit(&mut ctx, kind, outcome).unwrap();
        }
        drop(pending);

        assert!(!progress.snapshot().visible);
        assert_eq!(progress.times_shown(), 1);
        assert_eq!(mesh_count(&ctx), 1);
        assert_eq!(indicator_count(&ctx), 1);
        assert!(Arc::ptr_eq(
            ctx.scene.background().unwrap(),
            ctx.scene.environment().unwrap()
        ));
    }
}
