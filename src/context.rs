use crate::config::ViewerConfig;
use crate::material::SharedMaterial;
use crate::panel::PanelOptions;
use crate::scene::SceneGraph;

/// Everything the swap manager and the property panel mutate.
///
/// Owned by the application and lent to each operation; the renderer reads
/// it once per frame.
#[derive(Debug)]
pub struct ViewerContext {
    pub scene: SceneGraph,
    pub material: SharedMaterial,
    /// Tone mapping exposure
    pub exposure: f32,
}

impl ViewerContext {
    pub fn new(panel: &PanelOptions) -> Self {
        Self {
            scene: SceneGraph::with_helpers(),
            material: SharedMaterial::new(panel.material_state()),
            exposure: panel.exposure(),
        }
    }

    pub fn from_config(config: &ViewerConfig) -> Self {
        Self::new(&config.panel)
    }
}

impl Default for ViewerContext {
    fn default() -> Self {
        Self::new(&PanelOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_exposure_is_clamped() {
        let high = ViewerContext::new(&PanelOptions {
            exposure: 45.0,
            ..Default::default()
        });
        assert_eq!(high.exposure, 30.0);

        let config = ViewerConfig::from_json(r#"{ "panel": { "exposure": -2.0 } }"#).unwrap();
        assert_eq!(ViewerContext::from_config(&config).exposure, 0.0);
    }
}
