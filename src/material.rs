use std::cell::{Ref, RefCell};
use std::rc::Rc;

/// Appearance parameters applied to every surface of the displayed mesh.
/// Colors are linear RGB.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialState {
    pub color: [f32; 3],
    pub emissive: [f32; 3],
    pub roughness: f32,
    pub metalness: f32,
    pub flat_shading: bool,
    pub wireframe: bool,
}

impl Default for MaterialState {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0],
            emissive: [0.0, 0.0, 0.0],
            roughness: 1.0,
            metalness: 0.0,
            flat_shading: false,
            wireframe: false,
        }
    }
}

/// The single MaterialState instance, shared by reference.
///
/// Every surface of the current mesh holds a clone of this handle, so one
/// write is seen by all of them.
#[derive(Debug, Clone, Default)]
pub struct SharedMaterial(Rc<RefCell<MaterialState>>);

impl SharedMaterial {
    pub fn new(state: MaterialState) -> Self {
        Self(Rc::new(RefCell::new(state)))
    }

    pub fn get(&self) -> MaterialState {
        *self.0.borrow()
    }

    pub fn borrow(&self) -> Ref<'_, MaterialState> {
        self.0.borrow()
    }

    pub fn update(&self, edit: impl FnOnce(&mut MaterialState)) {
        edit(&mut self.0.borrow_mut());
    }

    pub fn ptr_eq(&self, other: &SharedMaterial) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// GPU layout of the material uniform
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    pub color: [f32; 4],
    pub emissive: [f32; 4],
    /// roughness, metalness, flat shading, unused
    pub params: [f32; 4],
}

impl From<&MaterialState> for MaterialUniform {
    fn from(state: &MaterialState) -> Self {
        let [r, g, b] = state.color;
        let [er, eg, eb] = state.emissive;
        Self {
            color: [r, g, b, 1.0],
            emissive: [er, eg, eb, 1.0],
            params: [
                state.roughness,
                state.metalness,
                if state.flat_shading { 1.0 } else { 0.0 },
                0.0,
            ],
        }
    }
}

pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// `#RRGGBB` bytes to linear RGB
pub fn srgb8_to_linear(rgb: [u8; 3]) -> [f32; 3] {
    rgb.map(|c| srgb_to_linear(c as f32 / 255.0))
}
