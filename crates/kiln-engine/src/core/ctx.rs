use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::window::{CursorIcon, Window, WindowId};

use crate::coords::Viewport;
use crate::device::{Gpu, SurfaceErrorAction};
use crate::input::InputFrame;
use crate::paint::Color;
use crate::render::{RenderCtx, RenderTarget};
use crate::time::{FrameClock, FrameTime};
use crate::window::RuntimeCtx;

use super::app::AppControl;

/// Per-window handle: geometry queries and immediate window mutations.
///
/// Sizes and positions are in physical pixels unless named otherwise.
pub struct WindowCtx<'a> {
    pub id: WindowId,
    pub window: &'a Window,
}

impl<'a> WindowCtx<'a> {
    /// Inner (drawable) size.
    pub fn size(&self) -> PhysicalSize<u32> {
        self.window.inner_size()
    }

    pub fn width(&self) -> u32 {
        self.size().width
    }

    pub fn height(&self) -> u32 {
        self.size().height
    }

    /// Outer position of the window on the desktop, if the platform exposes it.
    pub fn position(&self) -> Option<PhysicalPosition<i32>> {
        self.window.outer_position().ok()
    }

    pub fn x(&self) -> Option<i32> {
        self.position().map(|p| p.x)
    }

    pub fn y(&self) -> Option<i32> {
        self.position().map(|p| p.y)
    }

    /// Returns the logical window size as `(width, height)` in logical pixels.
    pub fn logical_size(&self) -> (f32, f32) {
        let logi: winit::dpi::LogicalSize<f64> =
            self.size().to_logical(self.window.scale_factor());
        (logi.width as f32, logi.height as f32)
    }

    pub fn scale_factor(&self) -> f64 {
        self.window.scale_factor()
    }

    /// Requests a new inner size. The platform may adjust or ignore it; the
    /// surface follows on the resulting `Resized` event.
    pub fn set_size(&self, width: u32, height: u32) {
        let _ = self.window.request_inner_size(PhysicalSize::new(width, height));
        log::info!("window {:?}: size set to {width}x{height}", self.id);
    }

    pub fn set_width(&self, width: u32) {
        self.set_size(width, self.height());
    }

    pub fn set_height(&self, height: u32) {
        self.set_size(self.width(), height);
    }

    pub fn set_position(&self, x: i32, y: i32) {
        self.window.set_outer_position(PhysicalPosition::new(x, y));
        log::info!("window {:?}: position set to ({x}, {y})", self.id);
    }

    pub fn set_x(&self, x: i32) {
        self.set_position(x, self.y().unwrap_or(0));
    }

    pub fn set_y(&self, y: i32) {
        self.set_position(self.x().unwrap_or(0), y);
    }

    pub fn set_title(&self, title: &str) {
        self.window.set_title(title);
        log::info!("window {:?}: title set to {title:?}", self.id);
    }

    /// Sets the mouse cursor shape for this window.
    pub fn set_cursor(&self, cursor: CursorIcon) {
        self.window.set_cursor(cursor);
    }
}

/// Per-frame context passed to `core::App::on_frame`.
///
/// Lifetimes:
/// - `'a` is the duration of the callback invocation
/// - `'w` is the window-borrow lifetime carried by `Gpu<'w>`
pub struct FrameCtx<'a, 'w> {
    pub window: WindowCtx<'a>,
    pub gpu: &'a mut Gpu<'w>,
    /// Input snapshot for this frame; edge queries live here.
    pub input: InputFrame<'a>,
    pub time: FrameTime,
    /// The window's clock, for changing the time scale.
    pub clock: &'a mut FrameClock,
    pub runtime: &'a mut RuntimeCtx,
}

impl<'a, 'w> FrameCtx<'a, 'w> {
    /// Clears the surface with `clear`, calls `draw` with a ready [`RenderCtx`] and
    /// [`RenderTarget`], then presents the frame.
    ///
    /// Returns `Exit` only when the surface is lost for good.
    pub fn render<F>(&mut self, clear: Color, draw: F) -> AppControl
    where
        F: FnOnce(&RenderCtx<'_>, &mut RenderTarget<'_>),
    {
        let (w, h) = self.window.logical_size();
        let scale_factor = self.window.scale_factor() as f32;

        let mut frame = match self.gpu.begin_frame() {
            Ok(f) => f,
            Err(err) => {
                return match self.gpu.handle_surface_error(err) {
                    SurfaceErrorAction::Fatal => AppControl::Exit,
                    _ => AppControl::Continue,
                };
            }
        };

        // Clear pass, dropped before the encoder is handed to the draw callback.
        {
            let _rpass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("kiln clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear.to_wgpu()),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }

        let rctx = RenderCtx::new(
            self.gpu.device(),
            self.gpu.queue(),
            self.gpu.surface_format(),
            Viewport::new(w, h),
            scale_factor,
        );

        {
            let mut target = RenderTarget::new(&mut frame.encoder, &frame.view);
            draw(&rctx, &mut target);
        }

        self.window.window.pre_present_notify();
        self.gpu.submit(frame);

        AppControl::Continue
    }
}
