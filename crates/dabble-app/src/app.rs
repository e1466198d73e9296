//! Core application state and lifecycle.

use crate::config::AppConfig;
use crate::error::AppError;
use crate::export;
use crate::ui::{render_ui, UiAction, UiState};
use dabble_core::collaboration::CollaborationManager;
use dabble_core::input::{PointerEvent, PointerSource};
use dabble_core::pad::DrawingPad;
use dabble_core::sync::{ConnectionState, NativeWebSocket, SocketEvent, SyncEvent};
use dabble_render::{
    BrushCursor, RenderContext, RenderResult, Renderer, RendererError, VelloRenderer,
};
use kurbo::{Point, Size};
use std::sync::Arc;
use std::time::{Duration, Instant};
use vello::util::RenderSurface;
use vello::wgpu::PresentMode;
use vello::{AaConfig, RenderParams, RendererOptions, Scene};
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, MouseButton, Touch, TouchPhase, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

/// How often the socket is polled while connected.
const SOCKET_POLL_INTERVAL: Duration = Duration::from_millis(16);

/// Runtime state for the application.
struct AppState {
    // Windowing
    window: Arc<Window>,
    surface: RenderSurface<'static>,

    // Rendering
    vello_renderer: vello::Renderer,
    pad_renderer: VelloRenderer,
    /// Texture blitter for RGBA->surface format conversion
    texture_blitter: vello::wgpu::util::TextureBlitter,

    // egui
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
    ui_state: UiState,

    // State
    pad: DrawingPad,
    /// Mouse position in canvas coordinates while it is over the window.
    hover: Option<Point>,
    config: AppConfig,

    // Collaboration
    collab: CollaborationManager,
    websocket: Option<NativeWebSocket>,
}

/// Main application struct.
pub struct App {
    config: AppConfig,
    state: Option<AppState>,
    render_cx: Option<vello::util::RenderContext>,
    /// Initialization failure, reported once the event loop returns.
    init_error: Option<AppError>,
}

impl App {
    /// Create a new application with default configuration.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// Create a new application with custom configuration.
    pub fn with_config(config: AppConfig) -> Self {
        Self {
            config,
            state: None,
            render_cx: None,
            init_error: None,
        }
    }

    /// Run the application until the window is closed.
    pub fn run(mut self) -> Result<(), AppError> {
        let event_loop = EventLoop::new()?;
        event_loop.run_app(&mut self)?;
        match self.init_error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Create the window, surface, renderers and the drawing pad.
    fn init_state(&mut self, event_loop: &ActiveEventLoop) -> Result<AppState, AppError> {
        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height));

        let window = Arc::new(event_loop.create_window(window_attrs)?);

        let size = window.inner_size();
        let (width, height) = if size.width == 0 || size.height == 0 {
            (self.config.width, self.config.height)
        } else {
            (size.width, size.height)
        };
        log::info!("Surface size: {}x{}", width, height);

        let render_cx = self
            .render_cx
            .get_or_insert_with(vello::util::RenderContext::new);

        let surface: RenderSurface<'static> = pollster::block_on(render_cx.create_surface(
            window.clone(),
            width,
            height,
            PresentMode::AutoVsync,
        ))
        .map_err(|e| RendererError::Surface(format!("{:?}", e)))?;

        let device = &render_cx.devices[surface.dev_id].device;

        let vello_renderer = vello::Renderer::new(device, RendererOptions::default())
            .map_err(|e| RendererError::InitFailed(format!("{:?}", e)))?;

        // Vello renders to Rgba8Unorm; the surface may want another format.
        let texture_blitter = vello::wgpu::util::TextureBlitter::new(device, surface.config.format);

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(
            device,
            surface.config.format,
            egui_wgpu::RendererOptions::default(),
        );

        let logical = PhysicalSize::new(width, height).to_logical::<f64>(window.scale_factor());
        let pad = DrawingPad::new(logical.width.round() as u32, logical.height.round() as u32);

        log::info!(
            "Dabble initialized - canvas {}x{}",
            pad.canvas().width(),
            pad.canvas().height()
        );

        Ok(AppState {
            window,
            surface,
            vello_renderer,
            pad_renderer: VelloRenderer::new(),
            texture_blitter,
            egui_ctx,
            egui_state,
            egui_renderer,
            ui_state: UiState::default(),
            pad,
            hover: None,
            config: self.config.clone(),
            collab: CollaborationManager::new(),
            websocket: None,
        })
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    /// Convert a window position to canvas (logical) coordinates.
    fn to_canvas(&self, position: PhysicalPosition<f64>) -> Point {
        let logical = position.to_logical::<f64>(self.window.scale_factor());
        Point::new(logical.x, logical.y)
    }

    fn handle_pointer(&mut self, event: PointerEvent) {
        if let Some(draw) = self.pad.handle_pointer(event) {
            self.collab.broadcast_draw(&draw);
            self.flush_outgoing();
        }
        self.ui_state.drawing = self.pad.is_drawing();
        self.window.request_redraw();
    }

    fn handle_touch(&mut self, touch: Touch, egui_wants_pointer: bool) {
        let position = self.to_canvas(touch.location);
        let source = PointerSource::Touch(touch.id);
        let event = match touch.phase {
            TouchPhase::Started if egui_wants_pointer => return,
            TouchPhase::Started => PointerEvent::Down { position, source },
            TouchPhase::Moved => PointerEvent::Move { position, source },
            TouchPhase::Ended | TouchPhase::Cancelled => PointerEvent::Up { position, source },
        };
        self.handle_pointer(event);
    }

    fn handle_action(&mut self, action: UiAction) {
        match action {
            UiAction::SetBrushSize(size) => {
                self.pad.set_brush_size(size);
                self.ui_state.brush_size = self.pad.brush().size();
            }
            UiAction::SetColor(color) => {
                self.pad.change_color(color);
                self.ui_state.color = color;
            }
            UiAction::Share => self.share(),
            UiAction::ExportPng => {
                let name = self.ui_state.session.as_deref().unwrap_or("dabble").to_string();
                if let Err(e) = export::export_png(self.pad.canvas(), &name) {
                    log::error!("PNG export failed: {}", e);
                    self.ui_state.last_error = Some(e.to_string());
                }
            }
        }
        self.window.request_redraw();
    }

    /// Open the relay connection if there is none yet.
    fn connect(&mut self) -> bool {
        if self.websocket.is_some() {
            return true;
        }
        let mut ws = NativeWebSocket::new();
        match ws.connect(&self.config.server_url) {
            Ok(()) => {
                log::info!("WebSocket connecting to {}", self.config.server_url);
                self.websocket = Some(ws);
                self.ui_state.connection_state = ConnectionState::Connecting;
                self.ui_state.last_error = None;
                true
            }
            Err(e) => {
                log::error!("WebSocket connect failed: {}", e);
                self.ui_state.connection_state = ConnectionState::Error;
                self.ui_state.last_error = Some(e.to_string());
                false
            }
        }
    }

    fn share(&mut self) {
        if self.collab.is_in_session() || self.collab.is_pending() {
            log::debug!("Drawing is already shared");
            return;
        }
        if self.connect() && self.collab.share() {
            self.flush_outgoing();
        }
    }

    fn join(&mut self, session: dabble_core::session::SessionId) {
        if self.connect() {
            log::info!("Joining session {}", session);
            self.collab.join_session(session);
            self.flush_outgoing();
        }
    }

    /// Send queued protocol messages.
    fn flush_outgoing(&mut self) {
        let Some(ws) = &self.websocket else {
            return;
        };
        for msg in self.collab.take_outgoing() {
            if let Err(e) = ws.send(&msg) {
                log::warn!("Dropping outgoing message: {}", e);
                break;
            }
        }
    }

    /// Drain socket events, painting remote strokes onto the pad.
    fn poll_socket(&mut self) {
        let Some(ws) = self.websocket.as_mut() else {
            return;
        };
        let events = ws.poll_events();
        self.ui_state.connection_state = ws.state();
        if events.is_empty() {
            return;
        }

        for event in events {
            let sync_event = match event {
                SocketEvent::Opened => Some(SyncEvent::Connected),
                SocketEvent::Closed => Some(SyncEvent::Disconnected),
                SocketEvent::Failed(message) => {
                    self.ui_state.last_error = Some(message);
                    Some(SyncEvent::Disconnected)
                }
                SocketEvent::Text(text) => self.collab.handle_message(&text, &mut self.pad),
            };
            if let Some(sync_event) = sync_event {
                self.handle_sync_event(sync_event);
            }
        }

        self.flush_outgoing();
        self.window.request_redraw();
    }

    fn handle_sync_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Connected => {
                log::info!("WebSocket connected");
            }
            SyncEvent::Disconnected => {
                log::info!("WebSocket disconnected");
                self.websocket = None;
                self.collab.reset();
                self.ui_state.session = None;
                self.ui_state.peer_count = 0;
                if self.ui_state.connection_state != ConnectionState::Error {
                    self.ui_state.connection_state = ConnectionState::Disconnected;
                }
                self.window.set_title(&self.config.title);
            }
            SyncEvent::JoinedSession { session, peer_count } => {
                log::info!("Joined session {} ({} other viewers)", session, peer_count);
                self.ui_state.session = Some(session.to_string());
                self.ui_state.peer_count = peer_count;
                self.ui_state.last_error = None;
                self.window
                    .set_title(&format!("{} - {}", self.config.title, session.share_path()));
            }
            SyncEvent::PeerJoined { peer_id } => {
                log::info!("Peer joined: {}", peer_id);
                self.ui_state.peer_count += 1;
            }
            SyncEvent::PeerLeft { peer_id } => {
                log::info!("Peer left: {}", peer_id);
                self.ui_state.peer_count = self.ui_state.peer_count.saturating_sub(1);
            }
            SyncEvent::DrawReceived { from, event } => {
                log::trace!("{} from {}", event.name(), from);
            }
            SyncEvent::SnapshotRequested => {
                log::debug!("Relay requested a snapshot");
            }
            SyncEvent::Error { message } => {
                log::warn!("Relay error: {}", message);
                self.ui_state.last_error = Some(message);
            }
        }
    }

    /// Follow a window resize.
    fn resize(&mut self, size: PhysicalSize<u32>) {
        let logical = size.to_logical::<f64>(self.window.scale_factor());
        self.pad
            .resize(logical.width.round() as u32, logical.height.round() as u32);
    }

    /// Run the UI, build the scene and present a frame.
    fn redraw(&mut self, render_cx: &vello::util::RenderContext) {
        let egui_input = self.egui_state.take_egui_input(&self.window);
        let mut action = None;
        let egui_output = self.egui_ctx.run(egui_input, |ctx| {
            action = render_ui(ctx, &mut self.ui_state);
        });
        self.egui_state
            .handle_platform_output(&self.window, egui_output.platform_output);
        let egui_primitives = self
            .egui_ctx
            .tessellate(egui_output.shapes, egui_output.pixels_per_point);

        if let Some(action) = action {
            self.handle_action(action);
        }

        let width = self.surface.config.width;
        let height = self.surface.config.height;

        let cursor = self
            .hover
            .filter(|_| !self.egui_ctx.is_pointer_over_area())
            .map(|position| BrushCursor::new(position, self.pad.brush()));
        let ctx = RenderContext::new(&self.pad, Size::new(width as f64, height as f64))
            .with_scale_factor(self.window.scale_factor())
            .with_background(self.config.background_color)
            .with_brush_cursor(cursor);
        self.pad_renderer.build_scene(&ctx);
        let scene = self.pad_renderer.take_scene();

        let device_handle = &render_cx.devices[self.surface.dev_id];
        let device = &device_handle.device;
        let queue = &device_handle.queue;

        let surface_texture = match self.surface.surface.get_current_texture() {
            Ok(t) => t,
            Err(e) => {
                log::warn!("Failed to get surface texture: {:?}", e);
                return;
            }
        };
        let surface_view = surface_texture
            .texture
            .create_view(&vello::wgpu::TextureViewDescriptor::default());

        if let Err(e) = self.render_scene(device, queue, &scene, &surface_view, width, height) {
            log::error!("Failed to render: {}", e);
            return;
        }

        for (id, image_delta) in &egui_output.textures_delta.set {
            self.egui_renderer
                .update_texture(device, queue, *id, image_delta);
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [width, height],
            pixels_per_point: egui_output.pixels_per_point,
        };

        {
            let mut egui_encoder =
                device.create_command_encoder(&vello::wgpu::CommandEncoderDescriptor {
                    label: Some("egui encoder"),
                });

            self.egui_renderer.update_buffers(
                device,
                queue,
                &mut egui_encoder,
                &egui_primitives,
                &screen_descriptor,
            );

            let render_pass = egui_encoder.begin_render_pass(&vello::wgpu::RenderPassDescriptor {
                label: Some("egui render pass"),
                color_attachments: &[Some(vello::wgpu::RenderPassColorAttachment {
                    view: &surface_view,
                    resolve_target: None,
                    ops: vello::wgpu::Operations {
                        load: vello::wgpu::LoadOp::Load,
                        store: vello::wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            // egui-wgpu wants a 'static pass
            let mut render_pass = render_pass.forget_lifetime();
            self.egui_renderer
                .render(&mut render_pass, &egui_primitives, &screen_descriptor);
            drop(render_pass);

            queue.submit(std::iter::once(egui_encoder.finish()));
        }

        for id in &egui_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
        surface_texture.present();

        // Keep the fade animation running.
        if self.egui_ctx.has_requested_repaint() {
            self.window.request_redraw();
        }
    }

    /// Render the Vello scene into an intermediate RGBA texture and blit it
    /// onto the surface.
    fn render_scene(
        &mut self,
        device: &vello::wgpu::Device,
        queue: &vello::wgpu::Queue,
        scene: &Scene,
        surface_view: &vello::wgpu::TextureView,
        width: u32,
        height: u32,
    ) -> RenderResult<()> {
        let params = RenderParams {
            base_color: self.config.background_color,
            width,
            height,
            antialiasing_method: AaConfig::Area,
        };

        // Vello's compute shaders need a storage-bindable Rgba8Unorm target.
        let render_texture = device.create_texture(&vello::wgpu::TextureDescriptor {
            label: Some("vello render texture"),
            size: vello::wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: vello::wgpu::TextureDimension::D2,
            format: vello::wgpu::TextureFormat::Rgba8Unorm,
            usage: vello::wgpu::TextureUsages::STORAGE_BINDING
                | vello::wgpu::TextureUsages::COPY_SRC
                | vello::wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let render_view =
            render_texture.create_view(&vello::wgpu::TextureViewDescriptor::default());

        self.vello_renderer
            .render_to_texture(device, queue, scene, &render_view, &params)
            .map_err(|e| RendererError::RenderFailed(format!("{:?}", e)))?;

        let mut blit_encoder =
            device.create_command_encoder(&vello::wgpu::CommandEncoderDescriptor {
                label: Some("blit encoder"),
            });
        self.texture_blitter
            .copy(device, &mut blit_encoder, &render_view, surface_view);
        queue.submit(std::iter::once(blit_encoder.finish()));

        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        log::info!("Creating window...");
        match self.init_state(event_loop) {
            Ok(mut state) => {
                if let Some(session) = self.config.session.clone() {
                    state.join(session);
                }
                state.window.request_redraw();
                self.state = Some(state);
            }
            Err(e) => {
                log::error!("Initialization failed: {}", e);
                self.init_error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };

        // Let egui process the event first
        let egui_response = state.egui_state.on_window_event(&state.window, &event);
        if egui_response.repaint {
            state.window.request_redraw();
        }
        let egui_wants_pointer = egui_response.consumed
            || state.egui_ctx.is_pointer_over_area()
            || state.egui_ctx.wants_pointer_input();

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                if size.width == 0 || size.height == 0 {
                    return;
                }
                if let Some(render_cx) = self.render_cx.as_mut() {
                    render_cx.resize_surface(&mut state.surface, size.width, size.height);
                }
                state.resize(size);
                state.window.request_redraw();
            }

            WindowEvent::RedrawRequested => {
                if let Some(render_cx) = self.render_cx.as_ref() {
                    state.redraw(render_cx);
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                let position = state.to_canvas(position);
                state.hover = Some(position);
                // A stroke keeps going even when it passes over the panels.
                if state.pad.is_drawing() || !egui_wants_pointer {
                    state.handle_pointer(PointerEvent::Move {
                        position,
                        source: PointerSource::Mouse,
                    });
                } else {
                    state.window.request_redraw();
                }
            }

            WindowEvent::CursorLeft { .. } => {
                state.hover = None;
                state.window.request_redraw();
            }

            WindowEvent::MouseInput {
                state: button_state,
                button: MouseButton::Left,
                ..
            } => {
                let position = state.hover.unwrap_or_else(|| state.pad.pointer_position());
                let source = PointerSource::Mouse;
                match button_state {
                    ElementState::Pressed if !egui_wants_pointer => {
                        state.handle_pointer(PointerEvent::Down { position, source });
                    }
                    ElementState::Pressed => {}
                    ElementState::Released => {
                        state.handle_pointer(PointerEvent::Up { position, source });
                    }
                }
            }

            WindowEvent::Touch(touch) => {
                state.handle_touch(touch, egui_wants_pointer);
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(state) = &mut self.state else {
            return;
        };
        if state.websocket.is_some() {
            state.poll_socket();
            event_loop.set_control_flow(ControlFlow::WaitUntil(
                Instant::now() + SOCKET_POLL_INTERVAL,
            ));
        } else {
            event_loop.set_control_flow(ControlFlow::Wait);
        }
    }
}
