/// Centralized default values for bundled resources, the scene, and the panel
/// This prevents string duplication and ensures consistency across the codebase

/// Default mesh loaded at startup, relative to the resource root
pub const DEFAULT_OBJ_PATH: &str = "assets/default.obj";

/// Default equirectangular environment loaded at startup
pub const DEFAULT_HDRI_PATH: &str = "assets/hdri/default.hdr";

/// Optional viewer configuration, relative to the resource root
pub const CONFIG_PATH: &str = "viewer.json";

/// Clear color used while no environment map is installed (sRGB, `#C2C2BB`)
pub const CLEAR_COLOR_SRGB: [f32; 3] = [0.761, 0.761, 0.733];

/// Material color shown before the user edits it (`#1E18FF`)
pub const MATERIAL_COLOR: [u8; 3] = [0x1E, 0x18, 0xFF];

/// Material emissive color (`#000000`)
pub const MATERIAL_EMISSIVE: [u8; 3] = [0x00, 0x00, 0x00];

pub const MATERIAL_ROUGHNESS: f32 = 0.0;
pub const MATERIAL_METALNESS: f32 = 0.5;

/// Tone mapping exposure applied at startup
pub const EXPOSURE: f32 = 3.0;

/// Camera starts here and orbits the origin
pub const CAMERA_POSITION: [f32; 3] = [0.0, 1.5, 3.5];
pub const CAMERA_FOVY_DEG: f32 = 75.0;
pub const CAMERA_ZNEAR: f32 = 0.01;
pub const CAMERA_ZFAR: f32 = 1000.0;

/// Ground grid: total size and number of divisions
pub const GRID_SIZE: f32 = 20.0;
pub const GRID_DIVISIONS: u32 = 20;

/// Axes helper length and its lift above the grid to avoid z-fighting
pub const AXES_LENGTH: f32 = 4.0;
pub const AXES_LIFT: f32 = 0.003;

/// Bounding box indicator color (yellow)
pub const BOUNDS_COLOR: [f32; 3] = [1.0, 1.0, 0.0];
