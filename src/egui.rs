use egui::Context;
use egui_wgpu::wgpu::{
    CommandEncoder, Device, LoadOp, Operations, Queue, RenderPassColorAttachment,
    RenderPassDescriptor, StoreOp, TextureFormat, TextureView,
};
use egui_wgpu::{Renderer, ScreenDescriptor};
use egui_winit::State;
use winit::event::WindowEvent;
use winit::window::Window;

/// egui on top of the 3D scene: feeds it window input and paints its output
/// into the surface after the scene pass.
pub struct EguiRenderer {
    context: Context,
    state: State,
    renderer: Renderer,
}

impl EguiRenderer {
    pub fn new(
        device: &Device,
        output_color_format: TextureFormat,
        output_depth_format: Option<TextureFormat>,
        msaa_samples: u32,
        window: &Window,
    ) -> EguiRenderer {
        let context = Context::default();
        let viewport_id = context.viewport_id();
        let state = State::new(context.clone(), viewport_id, window, None, None, None);
        let renderer = Renderer::new(
            device,
            output_color_format,
            output_depth_format,
            msaa_samples,
            false,
        );

        EguiRenderer {
            context,
            state,
            renderer,
        }
    }

    /// True when egui wants the event for itself (e.g. a drag on a slider)
    pub fn handle_input(&mut self, window: &Window, event: &WindowEvent) -> bool {
        self.state.on_window_event(window, event).consumed
    }

    pub fn draw<T: Default>(
        &mut self,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
        window: &Window,
        window_surface_view: &TextureView,
        screen_descriptor: ScreenDescriptor,
        mut run_ui: impl FnMut(&Context) -> T,
    ) -> T {
        let mut ui_output = T::default();
        let raw_input = self.state.take_egui_input(window);
        let full_output = self.context.run(raw_input, |ctx| {
            ui_output = run_ui(ctx);
        });

        self.state
            .handle_platform_output(window, full_output.platform_output);

        let paint_jobs = self
            .context
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.renderer
                .update_texture(device, queue, *id, image_delta);
        }

        let user_commands =
            self.renderer
                .update_buffers(device, queue, encoder, &paint_jobs, &screen_descriptor);
        if !user_commands.is_empty() {
            queue.submit(user_commands);
        }

        {
            let mut render_pass = encoder
                .begin_render_pass(&RenderPassDescriptor {
                    label: Some("egui Render Pass"),
                    color_attachments: &[Some(RenderPassColorAttachment {
                        view: window_surface_view,
                        resolve_target: None,
                        ops: Operations {
                            load: LoadOp::Load,
                            store: StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                })
                .forget_lifetime();
            self.renderer
                .render(&mut render_pass, &paint_jobs, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.renderer.free_texture(id);
        }

        ui_output
    }
}
