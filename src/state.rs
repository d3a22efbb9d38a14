use crate::camera::{self, OrbitCamera, OrbitController, Projection};
use crate::config::ViewerConfig;
use crate::context::ViewerContext;
use crate::egui::EguiRenderer;
use crate::material::{MaterialUniform, srgb_to_linear};
use crate::model::{DrawModel, GpuSurface, ModelVertex, Vertex};
use crate::panel::{PanelAction, PanelOptions};
use crate::progress::ProgressSnapshot;
use crate::resources;
use crate::scene::{LineVertex, NodeId, SceneGraph, SceneNode};
use crate::texture::GpuTexture;
use cgmath::{Matrix4, SquareMatrix};
use egui_wgpu::ScreenDescriptor;
use std::collections::HashMap;
use std::{iter, sync::Arc};
use wgpu::util::DeviceExt;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::window::Window;

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct FrameUniform {
    view_proj: [[f32; 4]; 4],
    inv_view_proj: [[f32; 4]; 4],
    camera_position: [f32; 4],
    /// exposure, environment present, unused, unused
    params: [f32; 4],
}

impl FrameUniform {
    fn new(camera: &OrbitCamera, projection: &Projection, exposure: f32, has_env: bool) -> Self {
        let view_proj = projection.calc_matrix() * camera.calc_matrix();
        let inv_view_proj = view_proj.invert().unwrap_or(Matrix4::identity());
        Self {
            view_proj: view_proj.into(),
            inv_view_proj: inv_view_proj.into(),
            camera_position: camera.position().to_homogeneous().into(),
            params: [exposure, if has_env { 1.0 } else { 0.0 }, 0.0, 0.0],
        }
    }
}

struct PipelineDesc<'a> {
    label: &'a str,
    layout: &'a wgpu::PipelineLayout,
    color_format: wgpu::TextureFormat,
    vertex_layouts: &'a [wgpu::VertexBufferLayout<'a>],
    shader: &'a wgpu::ShaderModule,
    topology: wgpu::PrimitiveTopology,
    depth_compare: wgpu::CompareFunction,
    depth_write: bool,
}

fn create_render_pipeline(device: &wgpu::Device, desc: PipelineDesc) -> wgpu::RenderPipeline {
    let culled = desc.topology == wgpu::PrimitiveTopology::TriangleList;

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(desc.label),
        layout: Some(desc.layout),
        vertex: wgpu::VertexState {
            module: desc.shader,
            entry_point: Some("vs_main"),
            buffers: desc.vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: desc.shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: desc.color_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: desc.topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: if culled { Some(wgpu::Face::Back) } else { None },
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: GpuTexture::DEPTH_FORMAT,
            depth_write_enabled: desc.depth_write,
            depth_compare: desc.depth_compare,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
        cache: None,
    })
}

/// GPU mirror of one scene node
enum GpuNode {
    Mesh(Vec<GpuSurface>),
    Lines {
        vertex_buffer: wgpu::Buffer,
        num_vertices: u32,
    },
}

impl GpuNode {
    fn upload(device: &wgpu::Device, node: &SceneNode) -> Self {
        let lines = |name: &str, vertices: &[LineVertex]| GpuNode::Lines {
            vertex_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} Line Buffer", name)),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            }),
            num_vertices: vertices.len() as u32,
        };

        match node {
            SceneNode::Mesh(mesh) => GpuNode::Mesh(
                mesh.surfaces
                    .iter()
                    .map(|surface| GpuSurface::new(device, &surface.name, &surface.geometry))
                    .collect(),
            ),
            SceneNode::BoundsIndicator(indicator) => lines("bounds", &indicator.lines.vertices),
            SceneNode::Lines { name, lines: set } => lines(name, &set.vertices),
        }
    }

    fn destroy(&self) {
        match self {
            GpuNode::Mesh(surfaces) => surfaces.iter().for_each(GpuSurface::destroy),
            GpuNode::Lines { vertex_buffer, .. } => vertex_buffer.destroy(),
        }
    }
}

struct GpuEnvironment {
    id: u64,
    texture: GpuTexture,
    bind_group: wgpu::BindGroup,
}

pub struct State {
    // Put egui_renderer first so it gets dropped before GPU resources
    egui_renderer: EguiRenderer,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    is_surface_configured: bool,
    mesh_pipeline: wgpu::RenderPipeline,
    wireframe_pipeline: wgpu::RenderPipeline,
    line_pipeline: wgpu::RenderPipeline,
    background_pipeline: wgpu::RenderPipeline,
    camera: OrbitCamera,
    projection: Projection,
    camera_controller: OrbitController,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    material_buffer: wgpu::Buffer,
    material_bind_group: wgpu::BindGroup,
    environment_layout: wgpu::BindGroupLayout,
    placeholder_environment: GpuEnvironment,
    environment: Option<GpuEnvironment>,
    nodes: HashMap<NodeId, GpuNode>,
    depth_texture: GpuTexture,
    window: Arc<Window>,
    clear_color: wgpu::Color,
}

impl State {
    pub async fn new(window: Arc<Window>, viewer_config: &ViewerConfig) -> anyhow::Result<State> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;

        let backend = adapter.get_info().backend;
        log::info!("Render backend: {}", backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);

        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let depth_texture = GpuTexture::create_depth_texture(&device, &config, "Depth Texture");

        let (camera, projection) =
            camera::from_config(&viewer_config.camera, config.width, config.height);
        let camera_controller = OrbitController::new(0.005, 0.1);

        let frame_uniform =
            FrameUniform::new(&camera, &projection, viewer_config.panel.exposure(), false);
        let frame_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Frame Buffer"),
            contents: bytemuck::cast_slice(&[frame_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_layout = |label: &str| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            })
        };

        let frame_bind_group_layout = uniform_layout("frame_bind_group_layout");
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &frame_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
            label: Some("frame_bind_group"),
        });

        let material_uniform = MaterialUniform::from(&viewer_config.panel.material_state());
        let material_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Material Buffer"),
            contents: bytemuck::cast_slice(&[material_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let material_bind_group_layout = uniform_layout("material_bind_group_layout");
        let material_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &material_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: material_buffer.as_entire_binding(),
            }],
            label: Some("material_bind_group"),
        });

        let environment_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                    count: None,
                },
            ],
            label: Some("environment_bind_group_layout"),
        });

        let placeholder_environment = GpuEnvironment::new(
            &device,
            &environment_layout,
            0,
            GpuTexture::placeholder_environment(&device, &queue),
        );

        let load_shader = |label: &'static str, source: String| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        };
        let mesh_shader = load_shader("Mesh Shader", resources::load_string("shader.wgsl").await?);
        let line_shader = load_shader("Line Shader", resources::load_string("line.wgsl").await?);
        let background_shader = load_shader(
            "Background Shader",
            resources::load_string("background.wgsl").await?,
        );

        let mesh_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[
                &frame_bind_group_layout,
                &environment_layout,
                &material_bind_group_layout,
            ],
            push_constant_ranges: &[],
        });
        let line_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Line Pipeline Layout"),
            bind_group_layouts: &[&frame_bind_group_layout],
            push_constant_ranges: &[],
        });
        let background_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Background Pipeline Layout"),
            bind_group_layouts: &[&frame_bind_group_layout, &environment_layout],
            push_constant_ranges: &[],
        });

        let mesh_pipeline = create_render_pipeline(
            &device,
            PipelineDesc {
                label: "Mesh Pipeline",
                layout: &mesh_layout,
                color_format: config.format,
                vertex_layouts: &[ModelVertex::desc()],
                shader: &mesh_shader,
                topology: wgpu::PrimitiveTopology::TriangleList,
                depth_compare: wgpu::CompareFunction::Less,
                depth_write: true,
            },
        );
        let wireframe_pipeline = create_render_pipeline(
            &device,
            PipelineDesc {
                label: "Wireframe Pipeline",
                layout: &mesh_layout,
                color_format: config.format,
                vertex_layouts: &[ModelVertex::desc()],
                shader: &mesh_shader,
                topology: wgpu::PrimitiveTopology::LineList,
                depth_compare: wgpu::CompareFunction::Less,
                depth_write: true,
            },
        );
        let line_pipeline = create_render_pipeline(
            &device,
            PipelineDesc {
                label: "Line Pipeline",
                layout: &line_layout,
                color_format: config.format,
                vertex_layouts: &[LineVertex::desc()],
                shader: &line_shader,
                topology: wgpu::PrimitiveTopology::LineList,
                depth_compare: wgpu::CompareFunction::Less,
                depth_write: true,
            },
        );
        let background_pipeline = create_render_pipeline(
            &device,
            PipelineDesc {
                label: "Background Pipeline",
                layout: &background_layout,
                color_format: config.format,
                vertex_layouts: &[],
                shader: &background_shader,
                topology: wgpu::PrimitiveTopology::TriangleList,
                depth_compare: wgpu::CompareFunction::Always,
                depth_write: false,
            },
        );

        let egui_renderer = EguiRenderer::new(
            &device,
            config.format,
            None, // egui doesn't need depth testing - it renders on top
            1,
            &window,
        );

        let [r, g, b] = viewer_config.clear_color.map(srgb_to_linear);

        Ok(Self {
            egui_renderer,
            surface,
            device,
            queue,
            config,
            is_surface_configured: false,
            mesh_pipeline,
            wireframe_pipeline,
            line_pipeline,
            background_pipeline,
            camera,
            projection,
            camera_controller,
            frame_buffer,
            frame_bind_group,
            material_buffer,
            material_bind_group,
            environment_layout,
            placeholder_environment,
            environment: None,
            nodes: HashMap::new(),
            depth_texture,
            window,
            clear_color: wgpu::Color {
                r: r as f64,
                g: g as f64,
                b: b as f64,
                a: 1.0,
            },
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.is_surface_configured = true;
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
            self.depth_texture =
                GpuTexture::create_depth_texture(&self.device, &self.config, "Depth Texture");
            self.projection.resize(width, height);
        }
    }

    /// Feed a window event to the panel first, then to the camera.
    /// Returns true when the event was consumed.
    pub fn input(&mut self, event: &WindowEvent) -> bool {
        if self.egui_renderer.handle_input(&self.window, event) {
            // Let go of a drag that ends over the panel
            if let WindowEvent::MouseInput {
                state: ElementState::Released,
                ..
            } = event
            {
                self.camera_controller.set_dragging(false);
            }
            return true;
        }

        match event {
            WindowEvent::CursorMoved { position, .. } => {
                self.camera_controller.handle_cursor(position.x, position.y);
                true
            }
            WindowEvent::MouseWheel { delta, .. } => {
                self.camera_controller.handle_scroll(delta);
                true
            }
            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state,
                ..
            } => {
                self.camera_controller
                    .set_dragging(*state == ElementState::Pressed);
                true
            }
            _ => false,
        }
    }

    pub fn update(&mut self, ctx: &ViewerContext) {
        self.camera_controller.update_camera(&mut self.camera);

        self.sync_scene(&ctx.scene);

        let frame = FrameUniform::new(
            &self.camera,
            &self.projection,
            ctx.exposure,
            self.environment.is_some(),
        );
        self.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::cast_slice(&[frame]));

        let material = MaterialUniform::from(&*ctx.material.borrow());
        self.queue
            .write_buffer(&self.material_buffer, 0, bytemuck::cast_slice(&[material]));
    }

    /// Mirror the scene graph on the GPU: upload new nodes, release buffers
    /// of nodes that left the graph.
    fn sync_scene(&mut self, scene: &SceneGraph) {
        self.nodes.retain(|id, node| {
            let keep = scene.contains(*id);
            if !keep {
                node.destroy();
            }
            keep
        });
        for (id, node) in scene.iter() {
            if !self.nodes.contains_key(&id) {
                log::debug!("Uploading scene node {}", node.name());
                self.nodes.insert(id, GpuNode::upload(&self.device, node));
            }
        }

        let wanted = scene.environment().map(|map| map.id());
        if self.environment.as_ref().map(|env| env.id) != wanted {
            if let Some(old) = self.environment.take() {
                old.texture.destroy();
            }
            self.environment = scene.environment().map(|map| {
                GpuEnvironment::new(
                    &self.device,
                    &self.environment_layout,
                    map.id(),
                    GpuTexture::from_environment(&self.device, &self.queue, map),
                )
            });
        }
    }

    pub fn render(
        &mut self,
        ctx: &ViewerContext,
        panel: &mut PanelOptions,
        progress: ProgressSnapshot,
    ) -> Result<Vec<PanelAction>, wgpu::SurfaceError> {
        self.window.request_redraw();

        if !self.is_surface_configured {
            return Ok(Vec::new());
        }

        let output = self.surface.get_current_texture()?;
        if output.suboptimal {
            return Err(wgpu::SurfaceError::Outdated);
        }

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            let environment = self
                .environment
                .as_ref()
                .unwrap_or(&self.placeholder_environment);

            render_pass.set_bind_group(0, &self.frame_bind_group, &[]);
            render_pass.set_bind_group(1, &environment.bind_group, &[]);
            render_pass.set_bind_group(2, &self.material_bind_group, &[]);

            if self.environment.is_some() {
                render_pass.set_pipeline(&self.background_pipeline);
                render_pass.draw(0..3, 0..1);
            }

            let wireframe = ctx.material.borrow().wireframe;
            render_pass.set_pipeline(if wireframe {
                &self.wireframe_pipeline
            } else {
                &self.mesh_pipeline
            });
            for node in self.nodes.values() {
                if let GpuNode::Mesh(surfaces) = node {
                    for surface in surfaces {
                        render_pass.draw_surface(surface, wireframe, 0..1);
                    }
                }
            }

            render_pass.set_pipeline(&self.line_pipeline);
            for node in self.nodes.values() {
                if let GpuNode::Lines {
                    vertex_buffer,
                    num_vertices,
                } = node
                {
                    render_pass.set_vertex_buffer(0, vertex_buffer.slice(..));
                    render_pass.draw(0..*num_vertices, 0..1);
                }
            }
        }

        let screen_descriptor = ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: self.window().scale_factor() as f32,
        };

        let actions = self.egui_renderer.draw(
            &self.device,
            &self.queue,
            &mut encoder,
            &self.window,
            &view,
            screen_descriptor,
            |egui_ctx| crate::panel::panel_ui(egui_ctx, panel, progress),
        );

        self.queue.submit(iter::once(encoder.finish()));
        output.present();

        Ok(actions)
    }
}

impl GpuEnvironment {
    fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        id: u64,
        texture: GpuTexture,
    ) -> Self {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&texture.sampler),
                },
            ],
            label: Some("environment_bind_group"),
        });
        Self {
            id,
            texture,
            bind_group,
        }
    }
}
