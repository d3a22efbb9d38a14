use crate::defaults;
use crate::panel::PanelOptions;
use crate::resources::load_string;
use serde::{Deserialize, Serialize};

/// Serializable startup configuration for the viewer
///
/// Every field falls back to its default, so a partial `viewer.json` only
/// overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub mesh_path: String,
    pub hdri_path: String,
    pub clear_color: [f32; 3],
    pub camera: CameraData,
    pub panel: PanelOptions,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            mesh_path: defaults::DEFAULT_OBJ_PATH.to_string(),
            hdri_path: defaults::DEFAULT_HDRI_PATH.to_string(),
            clear_color: defaults::CLEAR_COLOR_SRGB,
            camera: CameraData::default(),
            panel: PanelOptions::default(),
        }
    }
}

/// Camera position and projection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraData {
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub fovy_deg: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Default for CameraData {
    fn default() -> Self {
        Self {
            position: defaults::CAMERA_POSITION,
            target: [0.0, 0.0, 0.0],
            fovy_deg: defaults::CAMERA_FOVY_DEG,
            znear: defaults::CAMERA_ZNEAR,
            zfar: defaults::CAMERA_ZFAR,
        }
    }
}

impl ViewerConfig {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Load `viewer.json` from the resource root, or use the defaults.
    pub async fn load() -> Self {
        match load_string(defaults::CONFIG_PATH).await {
            Ok(text) => match Self::from_json(&text) {
                Ok(config) => {
                    log::info!("Loaded viewer configuration from {}", defaults::CONFIG_PATH);
                    config
                }
                Err(e) => {
                    log::warn!(
                        "Ignoring malformed {} ({}), using defaults",
                        defaults::CONFIG_PATH,
                        e
                    );
                    Self::default()
                }
            },
            Err(e) => {
                log::info!("No viewer configuration ({}), using defaults", e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config = ViewerConfig::from_json(r#"{ "mesh_path": "assets/teapot.obj" }"#).unwrap();
        assert_eq!(config.mesh_path, "assets/teapot.obj");
        assert_eq!(config.hdri_path, defaults::DEFAULT_HDRI_PATH);
        assert_eq!(config.camera, CameraData::default());
        assert_eq!(config.panel, PanelOptions::default());
    }

    #[test]
    fn nested_panel_overrides() {
        let config =
            ViewerConfig::from_json(r#"{ "panel": { "exposure": 1.5, "wireframe": true } }"#)
                .unwrap();
        assert_eq!(config.panel.exposure, 1.5);
        assert!(config.panel.wireframe);
        assert_eq!(config.panel.color, defaults::MATERIAL_COLOR);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(ViewerConfig::from_json("{ mesh_path: ").is_err());
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        // res/ ships without a viewer.json
        let config = pollster::block_on(ViewerConfig::load());
        assert_eq!(config, ViewerConfig::default());
    }
}
