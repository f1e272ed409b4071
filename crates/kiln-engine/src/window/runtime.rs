use anyhow::{Context, Result};
use ouroboros::self_referencing;
use std::collections::HashMap;

use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{DeviceEvent, DeviceId, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{CursorGrabMode, Window, WindowId};

use crate::core::{App as CoreApp, AppControl, FrameCtx, WindowCtx};
use crate::device::{Gpu, GpuInit};
use crate::input::platform::{translate_device_event, translate_window_event};
use crate::input::InputState;
use crate::time::FrameClock;

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    pub resizable: bool,
    pub vsync: bool,
}

impl RuntimeConfig {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.initial_size = LogicalSize::new(width, height);
        self
    }

    pub fn with_resizable(mut self, resizable: bool) -> Self {
        self.resizable = resizable;
        self
    }

    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "Sample title".to_string(),
            initial_size: LogicalSize::new(960.0, 540.0),
            resizable: true,
            vsync: true,
        }
    }
}

/// Width-to-height ratio a window is held to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AspectRatio {
    pub numer: u32,
    pub denom: u32,
}

impl AspectRatio {
    /// `None` for a zero term.
    pub fn new(numer: u32, denom: u32) -> Option<Self> {
        (numer > 0 && denom > 0).then_some(Self { numer, denom })
    }

    /// Size to request so that `size` matches the ratio, keeping its width.
    /// `None` when `size` already matches (within a pixel of rounding).
    pub fn fit(self, size: PhysicalSize<u32>) -> Option<PhysicalSize<u32>> {
        if size.width == 0 {
            return None;
        }
        let height = (size.width as u64 * self.denom as u64 + self.numer as u64 / 2)
            / self.numer as u64;
        let height = u32::try_from(height).unwrap_or(u32::MAX).max(1);
        (height.abs_diff(size.height) > 1).then_some(PhysicalSize::new(size.width, height))
    }
}

/// Runtime context passed to the application.
///
/// Commands are buffered and applied after the current callback returns.
#[derive(Default)]
pub struct RuntimeCtx {
    commands: Vec<Command>,
}

impl RuntimeCtx {
    pub fn create_window(&mut self, config: RuntimeConfig) {
        self.commands.push(Command::CreateWindow(config));
    }

    pub fn close_window(&mut self, id: WindowId) {
        self.commands.push(Command::CloseWindow(id));
    }

    pub fn exit(&mut self) {
        self.commands.push(Command::Exit);
    }

    /// Holds the window's inner size to `numer:denom` from now on.
    pub fn lock_aspect(&mut self, id: WindowId, numer: u32, denom: u32) {
        self.commands.push(Command::LockAspect { id, numer, denom });
    }

    pub fn unlock_aspect(&mut self, id: WindowId) {
        self.commands.push(Command::UnlockAspect(id));
    }

    /// Grabs (locks, else confines) and hides the cursor, or releases it.
    pub fn set_cursor_grab(&mut self, id: WindowId, grab: bool) {
        self.commands.push(Command::SetCursorGrab { id, grab });
    }
}

enum Command {
    CreateWindow(RuntimeConfig),
    CloseWindow(WindowId),
    Exit,
    LockAspect { id: WindowId, numer: u32, denom: u32 },
    UnlockAspect(WindowId),
    SetCursorGrab { id: WindowId, grab: bool },
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Runs the event loop until every window is closed or exit is requested.
    ///
    /// Returns the error that stopped the loop when a window or its GPU
    /// context could not be created.
    pub fn run<A>(initial: RuntimeConfig, gpu_init: GpuInit, app: A) -> Result<()>
    where
        A: 'static + CoreApp,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(initial, gpu_init, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.fatal.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[self_referencing]
struct WindowEntry {
    input: InputState,
    clock: FrameClock,
    aspect: Option<AspectRatio>,

    window: Window,

    #[borrows(window)]
    #[covariant]
    gpu: Gpu<'this>,
}

struct AppState<A>
where
    A: CoreApp + 'static,
{
    initial: RuntimeConfig,
    gpu_init: GpuInit,
    app: A,

    windows: HashMap<WindowId, WindowEntry>,
    exit_requested: bool,
    fatal: Option<anyhow::Error>,
}

impl<A> AppState<A>
where
    A: CoreApp + 'static,
{
    fn new(initial: RuntimeConfig, gpu_init: GpuInit, app: A) -> Self {
        Self {
            initial,
            gpu_init,
            app,
            windows: HashMap::new(),
            exit_requested: false,
            fatal: None,
        }
    }

    fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.fatal.get_or_insert(err);
        self.request_exit();
        event_loop.exit();
    }

    fn create_window_entry(
        &mut self,
        event_loop: &ActiveEventLoop,
        config: RuntimeConfig,
    ) -> Result<WindowId> {
        let attrs = Window::default_attributes()
            .with_title(config.title.clone())
            .with_inner_size(config.initial_size)
            .with_resizable(config.resizable);

        let window = event_loop
            .create_window(attrs)
            .with_context(|| format!("failed to create window {:?}", config.title))?;

        let id = window.id();
        let gpu_init = self.gpu_init.clone().with_vsync(config.vsync);

        let entry = WindowEntryTryBuilder {
            input: InputState::new(),
            clock: FrameClock::new(),
            aspect: None,
            window,
            gpu_builder: |w| {
                pollster::block_on(Gpu::new(w, gpu_init))
                    .context("GPU initialization failed for window")
            },
        }
        .try_build()?;

        log::info!(
            "window created: {:?} ({}x{}, resizable: {})",
            config.title,
            config.initial_size.width,
            config.initial_size.height,
            config.resizable
        );

        self.windows.insert(id, entry);
        Ok(id)
    }

    fn destroy_window_entry(&mut self, id: WindowId) {
        if self.windows.remove(&id).is_some() {
            log::info!("window closed: {id:?}");
        }
    }

    fn apply_commands(&mut self, event_loop: &ActiveEventLoop, mut ctx: RuntimeCtx) {
        for cmd in ctx.commands.drain(..) {
            match cmd {
                Command::CreateWindow(cfg) => {
                    if let Err(e) = self.create_window_entry(event_loop, cfg) {
                        self.fail(event_loop, e);
                    }
                }
                Command::CloseWindow(id) => self.destroy_window_entry(id),
                Command::Exit => self.request_exit(),
                Command::LockAspect { id, numer, denom } => {
                    let Some(ratio) = AspectRatio::new(numer, denom) else {
                        log::warn!("window {id:?}: ignoring aspect lock {numer}:{denom}");
                        continue;
                    };
                    if let Some(entry) = self.windows.get_mut(&id) {
                        entry.with_aspect_mut(|a| *a = Some(ratio));
                        entry.with_window(|w| enforce_aspect(w, ratio, w.inner_size()));
                        log::info!("window {id:?}: aspect locked to {numer}:{denom}");
                    }
                }
                Command::UnlockAspect(id) => {
                    if let Some(entry) = self.windows.get_mut(&id) {
                        entry.with_aspect_mut(|a| *a = None);
                        log::info!("window {id:?}: aspect unlocked");
                    }
                }
                Command::SetCursorGrab { id, grab } => {
                    if let Some(entry) = self.windows.get_mut(&id) {
                        entry.with_mut(|fields| {
                            if apply_cursor_grab(fields.window, grab) {
                                fields.input.mouse.set_grabbed(grab);
                            }
                        });
                    }
                }
            }
        }

        if self.windows.is_empty() {
            self.request_exit();
        }

        if self.exit_requested {
            event_loop.exit();
        }
    }
}

impl<A> ApplicationHandler for AppState<A>
where
    A: CoreApp + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if !self.windows.is_empty() || self.exit_requested {
            return;
        }

        if let Err(e) = self.create_window_entry(event_loop, self.initial.clone()) {
            self.fail(event_loop, e.context("failed to create initial window"));
            return;
        }

        for entry in self.windows.values() {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        event_loop.set_control_flow(ControlFlow::Wait);

        // Continuous redraw: one poll cycle per presented frame.
        for entry in self.windows.values() {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        let Some(ev) = translate_device_event(&event) else {
            return;
        };
        // Raw motion has no window; each mouse keeps it only while grabbed.
        for entry in self.windows.values_mut() {
            entry.with_input_mut(|input| input.apply_event(ev.clone()));
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        let (app, windows) = (&mut self.app, &mut self.windows);

        let Some(entry) = windows.get_mut(&window_id) else {
            return;
        };

        let mut exit_from_app_event = false;

        entry.with_mut(|fields| {
            if let Some(ev) = translate_window_event(fields.window, fields.input.modifiers, &event) {
                fields.input.apply_event(ev);
            }

            if app.on_window_event(window_id, &event) == AppControl::Exit {
                exit_from_app_event = true;
            }
        });

        if exit_from_app_event {
            self.request_exit();
            event_loop.exit();
            return;
        }

        match &event {
            WindowEvent::CloseRequested => {
                self.destroy_window_entry(window_id);
                if self.windows.is_empty() {
                    self.request_exit();
                    event_loop.exit();
                }
            }

            WindowEvent::Resized(new_size) => {
                if let Some(entry) = self.windows.get_mut(&window_id) {
                    if let Some(ratio) = *entry.borrow_aspect() {
                        entry.with_window(|w| enforce_aspect(w, ratio, *new_size));
                    }
                    entry.with_gpu_mut(|gpu| gpu.resize(*new_size));
                    entry.with_window(|w| w.request_redraw());
                }
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(entry) = self.windows.get_mut(&window_id) {
                    let new_size = entry.with_window(|w| w.inner_size());
                    entry.with_gpu_mut(|gpu| gpu.resize(new_size));
                    entry.with_window(|w| w.request_redraw());
                }
            }

            WindowEvent::RedrawRequested => {
                let mut runtime_ctx = RuntimeCtx::default();
                let mut app_control = AppControl::Continue;

                let (app, windows) = (&mut self.app, &mut self.windows);
                if let Some(entry) = windows.get_mut(&window_id) {
                    entry.with_mut(|fields| {
                        {
                            let input = fields.input.update();
                            let time = fields.clock.tick();

                            let mut ctx = FrameCtx {
                                window: WindowCtx {
                                    id: window_id,
                                    window: fields.window,
                                },
                                gpu: fields.gpu,
                                input,
                                time,
                                clock: fields.clock,
                                runtime: &mut runtime_ctx,
                            };

                            app_control = app.on_frame(&mut ctx);
                        }

                        fields.input.end_frame();
                    });
                }

                if app_control == AppControl::Exit {
                    runtime_ctx.exit();
                }

                self.apply_commands(event_loop, runtime_ctx);
            }

            _ => {}
        }

        if self.exit_requested {
            event_loop.exit();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.app.on_exit();
        // Dropping an entry releases its GPU context before the window.
        self.windows.clear();
        log::info!("runtime stopped");
    }
}

fn enforce_aspect(window: &Window, ratio: AspectRatio, size: PhysicalSize<u32>) {
    if let Some(fitted) = ratio.fit(size) {
        let _ = window.request_inner_size(fitted);
    }
}

/// Returns whether the requested grab state took effect.
fn apply_cursor_grab(window: &Window, grab: bool) -> bool {
    if grab {
        let res = window
            .set_cursor_grab(CursorGrabMode::Locked)
            .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined));
        match res {
            Ok(()) => {
                window.set_cursor_visible(false);
                log::info!("window {:?}: cursor grabbed", window.id());
                true
            }
            Err(e) => {
                log::warn!("window {:?}: cursor grab unavailable: {e}", window.id());
                false
            }
        }
    } else {
        if let Err(e) = window.set_cursor_grab(CursorGrabMode::None) {
            log::warn!("window {:?}: cursor release failed: {e}", window.id());
        }
        window.set_cursor_visible(true);
        log::info!("window {:?}: cursor released", window.id());
        true
    }
}
