use crate::assets::AssetKind;
use crate::context::ViewerContext;
use crate::defaults;
use crate::material::{MaterialState, srgb8_to_linear};
use crate::progress::ProgressSnapshot;
use egui::{Align2, Context};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

pub const ROUGHNESS_RANGE: RangeInclusive<f32> = 0.0..=1.0;
pub const METALNESS_RANGE: RangeInclusive<f32> = 0.0..=1.0;
pub const EXPOSURE_RANGE: RangeInclusive<f32> = 0.0..=30.0;

fn clamp_to(value: f32, range: &RangeInclusive<f32>) -> f32 {
    if value.is_nan() {
        *range.start()
    } else {
        value.clamp(*range.start(), *range.end())
    }
}

/// Values shown in the property panel. Colors are sRGB bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelOptions {
    pub color: [u8; 3],
    pub emissive: [u8; 3],
    pub roughness: f32,
    pub metalness: f32,
    pub flat: bool,
    pub wireframe: bool,
    pub exposure: f32,
}

impl Default for PanelOptions {
    fn default() -> Self {
        Self {
            color: defaults::MATERIAL_COLOR,
            emissive: defaults::MATERIAL_EMISSIVE,
            roughness: defaults::MATERIAL_ROUGHNESS,
            metalness: defaults::MATERIAL_METALNESS,
            flat: false,
            wireframe: false,
            exposure: defaults::EXPOSURE,
        }
    }
}

impl PanelOptions {
    /// The material these options describe
    pub fn material_state(&self) -> MaterialState {
        MaterialState {
            color: srgb8_to_linear(self.color),
            emissive: srgb8_to_linear(self.emissive),
            roughness: clamp_to(self.roughness, &ROUGHNESS_RANGE),
            metalness: clamp_to(self.metalness, &METALNESS_RANGE),
            flat_shading: self.flat,
            wireframe: self.wireframe,
        }
    }

    /// Exposure clamped to [`EXPOSURE_RANGE`]
    pub fn exposure(&self) -> f32 {
        clamp_to(self.exposure, &EXPOSURE_RANGE)
    }
}

/// One user edit of an exposed parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PanelEdit {
    Color([u8; 3]),
    Emissive([u8; 3]),
    Roughness(f32),
    Metalness(f32),
    Flat(bool),
    Wireframe(bool),
    Exposure(f32),
}

/// Something the panel asks the application to do
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PanelAction {
    Edit(PanelEdit),
    Load(AssetKind),
}

/// Write an edit straight into the live material or renderer settings.
pub fn apply_edit(ctx: &mut ViewerContext, edit: PanelEdit) {
    match edit {
        PanelEdit::Color(rgb) => ctx.material.update(|m| m.color = srgb8_to_linear(rgb)),
        PanelEdit::Emissive(rgb) => ctx.material.update(|m| m.emissive = srgb8_to_linear(rgb)),
        PanelEdit::Roughness(v) => ctx
            .material
            .update(|m| m.roughness = clamp_to(v, &ROUGHNESS_RANGE)),
        PanelEdit::Metalness(v) => ctx
            .material
            .update(|m| m.metalness = clamp_to(v, &METALNESS_RANGE)),
        PanelEdit::Flat(on) => ctx.material.update(|m| m.flat_shading = on),
        PanelEdit::Wireframe(on) => ctx.material.update(|m| m.wireframe = on),
        PanelEdit::Exposure(v) => ctx.exposure = clamp_to(v, &EXPOSURE_RANGE),
    }
}

pub fn panel_ui(
    ctx: &Context,
    options: &mut PanelOptions,
    progress: ProgressSnapshot,
) -> Vec<PanelAction> {
    let mut actions = Vec::new();

    egui::Window::new("Viewer")
        .default_open(true)
        .default_width(240.0)
        .resizable(false)
        .anchor(Align2::RIGHT_TOP, [-10.0, 10.0])
        .show(ctx, |ui| {
            if ui.button("Load .obj File").clicked() {
                actions.push(PanelAction::Load(AssetKind::Mesh));
            }
            if ui.button("Load .hdr File").clicked() {
                actions.push(PanelAction::Load(AssetKind::Environment));
            }

            ui.separator();

            let mut edit = |edit: Option<PanelEdit>| {
                if let Some(edit) = edit {
                    actions.push(PanelAction::Edit(edit));
                }
            };

            ui.horizontal(|ui| {
                ui.label("Color");
                edit(
                    ui.color_edit_button_srgb(&mut options.color)
                        .changed()
                        .then_some(PanelEdit::Color(options.color)),
                );
            });
            ui.horizontal(|ui| {
                ui.label("Emissive");
                edit(
                    ui.color_edit_button_srgb(&mut options.emissive)
                        .changed()
                        .then_some(PanelEdit::Emissive(options.emissive)),
                );
            });
            edit(
                ui.add(egui::Slider::new(&mut options.roughness, ROUGHNESS_RANGE).text("Roughness"))
                    .changed()
                    .then_some(PanelEdit::Roughness(options.roughness)),
            );
            edit(
                ui.add(egui::Slider::new(&mut options.metalness, METALNESS_RANGE).text("Metalness"))
                    .changed()
                    .then_some(PanelEdit::Metalness(options.metalness)),
            );
            edit(
                ui.checkbox(&mut options.flat, "Flat")
                    .changed()
                    .then_some(PanelEdit::Flat(options.flat)),
            );
            edit(
                ui.checkbox(&mut options.wireframe, "Wireframe")
                    .changed()
                    .then_some(PanelEdit::Wireframe(options.wireframe)),
            );
            edit(
                ui.add(egui::Slider::new(&mut options.exposure, EXPOSURE_RANGE).text("Exposure"))
                    .changed()
                    .then_some(PanelEdit::Exposure(options.exposure)),
            );
        });

    if progress.visible {
        egui::Area::new(egui::Id::new("loading"))
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.set_width(300.0);
                ui.label(format!("Loading ({} in flight)", progress.active));
                ui.add(egui::ProgressBar::new(progress.percent / 100.0).show_percentage());
            });
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_shipped_material() {
        let options = PanelOptions::default();
        assert_eq!(options.color, [0x1E, 0x18, 0xFF]);
        assert_eq!(options.roughness, 0.0);
        assert_eq!(options.metalness, 0.5);
        assert_eq!(options.exposure, 3.0);
        let state = options.material_state();
        assert!(!state.wireframe);
        assert_eq!(state.color, srgb8_to_linear([0x1E, 0x18, 0xFF]));
    }

    #[test]
    fn edits_are_clamped_to_their_ranges() {
        let mut ctx = ViewerContext::default();
        apply_edit(&mut ctx, PanelEdit::Roughness(1.5));
        apply_edit(&mut ctx, PanelEdit::Metalness(-0.2));
        apply_edit(&mut ctx, PanelEdit::Exposure(45.0));
        assert_eq!(ctx.material.get().roughness, 1.0);
        assert_eq!(ctx.material.get().metalness, 0.0);
        assert_eq!(ctx.exposure, 30.0);

        apply_edit(&mut ctx, PanelEdit::Exposure(f32::NAN));
        assert_eq!(ctx.exposure, 0.0);
    }

    #[test]
    fn last_value_wins() {
        let mut ctx = ViewerContext::default();
        apply_edit(&mut ctx, PanelEdit::Wireframe(true));
        apply_edit(&mut ctx, PanelEdit::Flat(true));
        apply_edit(&mut ctx, PanelEdit::Wireframe(false));
        let state = ctx.material.get();
        assert!(!state.wireframe);
        assert!(state.flat_shading);

        apply_edit(&mut ctx, PanelEdit::Emissive([255, 0, 0]));
        assert_eq!(ctx.material.get().emissive, [1.0, 0.0, 0.0]);
    }
}
