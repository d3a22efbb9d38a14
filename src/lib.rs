pub mod assets;
pub mod camera;
pub mod config;
pub mod context;
pub mod defaults;
mod egui;
pub mod environment;
pub mod error;
pub mod material;
pub mod model;
pub mod panel;
pub mod picker;
pub mod progress;
pub mod resources;
pub mod scene;
pub mod source;
mod state;
pub mod texture;

use crate::{
    assets::{AssetKind, AssetSwapManager, DecodedAsset},
    config::ViewerConfig,
    context::ViewerContext,
    error::LoadError,
    panel::{PanelAction, PanelOptions},
    progress::ProgressTracker,
    state::State,
};
use std::{future::Future, sync::Arc};
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

/// Messages delivered to the event loop from background tasks
pub enum UserEvent {
    /// Render state finished initializing in the browser
    #[cfg(target_arch = "wasm32")]
    Ready {
        state: Box<State>,
        config: ViewerConfig,
    },
    /// A decode finished and is waiting to be committed
    Loaded {
        kind: AssetKind,
        outcome: Result<DecodedAsset, LoadError>,
    },
}

pub struct App {
    proxy: EventLoopProxy<UserEvent>,
    config: ViewerConfig,
    ctx: ViewerContext,
    assets: AssetSwapManager,
    panel: PanelOptions,
    state: Option<State>,
}

impl App {
    pub fn new(event_loop: &EventLoop<UserEvent>) -> Self {
        // The browser cannot block on the fetch; it reads the configuration
        // once the render state is being created instead.
        #[cfg(not(target_arch = "wasm32"))]
        let config = pollster::block_on(ViewerConfig::load());
        #[cfg(target_arch = "wasm32")]
        let config = ViewerConfig::default();

        Self {
            proxy: event_loop.create_proxy(),
            ctx: ViewerContext::from_config(&config),
            panel: config.panel.clone(),
            config,
            assets: AssetSwapManager::new(ProgressTracker::new()),
            state: None,
        }
    }

    /// Decode the bundled mesh and environment concurrently. Failures are
    /// reported at commit and leave the scene without that asset.
    #[cfg(not(target_arch = "wasm32"))]
    fn spawn_default_loads(&self) {
        let defaults = [
            (AssetKind::Mesh, &self.config.mesh_path),
            (AssetKind::Environment, &self.config.hdri_path),
        ];
        for (kind, path) in defaults {
            let handle = source::SourceHandle::bundled(path);
            let progress = self.assets.progress().clone();
            spawn_load(self.proxy.clone(), kind, move || async move {
                assets::decode(kind, handle, &progress).await
            });
        }
    }

    fn handle_actions(&mut self, actions: Vec<PanelAction>) {
        for action in actions {
            match action {
                PanelAction::Edit(edit) => panel::apply_edit(&mut self.ctx, edit),
                PanelAction::Load(kind) => {
                    let progress = self.assets.progress().clone();
                    spawn_load(self.proxy.clone(), kind, move || async move {
                        let handle = picker::pick_source(kind).await?;
                        assets::decode(kind, handle, &progress).await
                    });
                }
            }
        }
    }
}

/// Await a decode and post its outcome back as [`UserEvent::Loaded`].
async fn deliver_load<Fut>(proxy: EventLoopProxy<UserEvent>, kind: AssetKind, task: Fut)
where
    Fut: Future<Output = Result<DecodedAsset, LoadError>>,
{
    let started = web_time::Instant::now();
    let outcome = task.await;
    if outcome.is_ok() {
        log::info!(
            "Decoded {} in {} ms",
            kind.label(),
            started.elapsed().as_millis()
        );
    }
    if proxy
        .send_event(UserEvent::Loaded { kind, outcome })
        .is_err()
    {
        log::warn!("Event loop closed before the {} was committed", kind.label());
    }
}

/// Run a load on a worker thread. The future is built on that thread, so
/// only the closure has to be `Send`.
#[cfg(not(target_arch = "wasm32"))]
fn spawn_load<F, Fut>(proxy: EventLoopProxy<UserEvent>, kind: AssetKind, task: F)
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<DecodedAsset, LoadError>> + 'static,
{
    std::thread::spawn(move || pollster::block_on(deliver_load(proxy, kind, task())));
}

#[cfg(target_arch = "wasm32")]
fn spawn_load<F, Fut>(proxy: EventLoopProxy<UserEvent>, kind: AssetKind, task: F)
where
    F: FnOnce() -> Fut + 'static,
    Fut: Future<Output = Result<DecodedAsset, LoadError>> + 'static,
{
    wasm_bindgen_futures::spawn_local(deliver_load(proxy, kind, task()));
}

impl ApplicationHandler<UserEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title("3D Viewer");

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let window = wgpu::web_sys::window().unwrap_throw();
            let document = window.document().unwrap_throw();
            let canvas = document.get_element_by_id(CANVAS_ID).unwrap_throw();
            let html_canvas_element = canvas.unchecked_into();
            window_attributes = window_attributes.with_canvas(Some(html_canvas_element));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Unable to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        // [Desktop]
        // Block on the render state only. The bundled assets decode in the
        // background so the first frames can draw the progress overlay.
        #[cfg(not(target_arch = "wasm32"))]
        {
            match pollster::block_on(State::new(window, &self.config)) {
                Ok(state) => self.state = Some(state),
                Err(e) => {
                    log::error!("Unable to create render state: {:#}", e);
                    event_loop.exit();
                    return;
                }
            }
            self.spawn_default_loads();
        }

        // [Browser]
        // Nothing can be awaited here. A background task reads the
        // configuration, then creates the render state while both bundled
        // assets decode, and posts everything back to the event loop.
        #[cfg(target_arch = "wasm32")]
        {
            use futures::future::join3;

            let proxy = self.proxy.clone();
            let progress = self.assets.progress().clone();
            wasm_bindgen_futures::spawn_local(async move {
                let config = ViewerConfig::load().await;
                let mesh = source::SourceHandle::bundled(&config.mesh_path);
                let hdri = source::SourceHandle::bundled(&config.hdri_path);
                let (state, mesh, environment) = join3(
                    State::new(window, &config),
                    assets::decode(AssetKind::Mesh, mesh, &progress),
                    assets::decode(AssetKind::Environment, hdri, &progress),
                )
                .await;

                let state = match state {
                    Ok(state) => state,
                    Err(e) => {
                        log::error!("Unable to create canvas: {:#}", e);
                        return;
                    }
                };
                let events = [
                    UserEvent::Ready {
                        state: Box::new(state),
                        config,
                    },
                    UserEvent::Loaded {
                        kind: AssetKind::Mesh,
                        outcome: mesh,
                    },
                    UserEvent::Loaded {
                        kind: AssetKind::Environment,
                        outcome: environment,
                    },
                ];
                for event in events {
                    if proxy.send_event(event).is_err() {
                        log::warn!("Event loop closed during startup");
                        return;
                    }
                }
            });
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: UserEvent) {
        match event {
            #[cfg(target_arch = "wasm32")]
            UserEvent::Ready { mut state, config } => {
                let size = state.window().inner_size();
                state.resize(size.width, size.height);
                state.window().request_redraw();
                self.ctx = ViewerContext::from_config(&config);
                self.panel = config.panel.clone();
                self.config = config;
                self.state = Some(*state);
            }
            UserEvent::Loaded { kind, outcome } => {
                // Errors are already reported; the scene keeps its current asset
                let _ = self.assets.commit(&mut self.ctx, kind, outcome);
                if let Some(state) = &self.state {
                    state.window().request_redraw();
                }
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let state = match &mut self.state {
            Some(canvas) => canvas,
            None => return,
        };

        match event {
            WindowEvent::CloseRequested => {
                self.assets.release_all(&mut self.ctx);
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                state.input(&event);
                state.resize(size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                state.update(&self.ctx);
                let snapshot = self.assets.progress().snapshot();
                match state.render(&self.ctx, &mut self.panel, snapshot) {
                    Ok(actions) => self.handle_actions(actions),
                    // Reconfigure the surface if it's lost, outdated, or suboptimal
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.window().inner_size();
                        state.resize(size.width, size.height);
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e);
                    }
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } if !state.input(&event) => {
                self.assets.release_all(&mut self.ctx);
                event_loop.exit();
            }
            other => {
                state.input(&other);
            }
        }
    }
}

pub fn run() -> anyhow::Result<()> {
    // Set up logging
    #[cfg(not(target_arch = "wasm32"))]
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    #[cfg(target_arch = "wasm32")]
    console_log::init_with_level(log::Level::Info).unwrap_throw();

    let event_loop = EventLoop::<UserEvent>::with_user_event().build()?;
    let mut app = App::new(&event_loop);
    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn run_web() -> Result<(), wasm_bindgen::JsValue> {
    console_error_panic_hook::set_once();
    run().unwrap_throw();

    Ok(())
}
