mod scene;

use std::path::PathBuf;

use kiln_engine::core::{App, AppControl, FrameCtx};
use kiln_engine::device::GpuInit;
use kiln_engine::input::{Key, MouseButton};
use kiln_engine::logging::{init_logging, LoggingConfig};
use kiln_engine::paint::Color;
use kiln_engine::window::{Runtime, RuntimeConfig};

use scene::Scene;

const MIN_TIME_SCALE: f32 = 0.125;
const MAX_TIME_SCALE: f32 = 8.0;

/// Usage: `kiln-sandbox [image]`
///
/// Escape quits, Space logs, G toggles cursor grab, arrow keys change the
/// time scale, L/U lock and unlock a 16:9 aspect. Drag with the left button
/// (or move while grabbed) to shift the triangle.
fn main() {
    init_logging(LoggingConfig {
        log_file: Some(PathBuf::from("logs.log")),
        ..Default::default()
    });

    let config = RuntimeConfig::default()
        .with_title("valve")
        .with_resizable(false);

    let sandbox = Sandbox {
        image: std::env::args_os().nth(1).map(PathBuf::from),
        scene: None,
        elapsed: 0.0,
        offset: [0.0, 0.0],
    };

    if let Err(e) = Runtime::run(config, GpuInit::default(), sandbox) {
        log::error!("kiln sandbox: {e:#}");
        std::process::exit(1);
    }
}

struct Sandbox {
    image: Option<PathBuf>,
    scene: Option<Scene>,
    /// Scaled seconds since start; drives the rotation.
    elapsed: f32,
    /// Triangle offset in NDC.
    offset: [f32; 2],
}

impl Sandbox {
    fn handle_input(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        let keys = ctx.input.keyboard;
        let mouse = ctx.input.mouse;

        if keys.is_key_just_pressed(Key::Escape) {
            return AppControl::Exit;
        }
        if keys.is_key_just_pressed(Key::Space) {
            log::info!("space at frame {}", keys.frame());
        }
        if keys.is_key_just_pressed(Key::G) {
            ctx.runtime.set_cursor_grab(ctx.window.id, !mouse.is_grabbed());
        }
        if keys.is_key_just_pressed(Key::L) {
            ctx.runtime.lock_aspect(ctx.window.id, 16, 9);
        }
        if keys.is_key_just_pressed(Key::U) {
            ctx.runtime.unlock_aspect(ctx.window.id);
        }

        let scale = ctx.clock.scale();
        if keys.is_key_just_pressed(Key::ArrowUp) {
            ctx.clock.set_scale((scale * 2.0).min(MAX_TIME_SCALE));
        }
        if keys.is_key_just_pressed(Key::ArrowDown) {
            ctx.clock.set_scale((scale * 0.5).max(MIN_TIME_SCALE));
        }
        if ctx.clock.scale() != scale {
            log::info!("time scale {}", ctx.clock.scale());
        }

        let velocity = mouse.velocity();
        if (mouse.is_grabbed() || mouse.is_button_held(MouseButton::Left)) && velocity.length() > 0.0 {
            let (w, h) = ctx.window.logical_size();
            if w > 0.0 && h > 0.0 {
                self.offset[0] += 2.0 * velocity.x / w;
                self.offset[1] -= 2.0 * velocity.y / h;
            }
            log::debug!("mouse velocity ({}, {})", velocity.x, velocity.y);
        }

        AppControl::Continue
    }
}

impl App for Sandbox {
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if self.scene.is_none() {
            let gpu = &ctx.gpu;
            match Scene::new(gpu.device(), gpu.queue(), gpu.surface_format(), self.image.as_deref()) {
                Ok(scene) => self.scene = Some(scene),
                Err(e) => {
                    log::error!("failed to build scene: {e:#}");
                    return AppControl::Exit;
                }
            }
        }

        if self.handle_input(ctx) == AppControl::Exit {
            return AppControl::Exit;
        }

        self.elapsed += ctx.time.dt;

        let Some(scene) = self.scene.as_mut() else {
            return AppControl::Continue;
        };
        scene.set_time(self.elapsed);
        scene.set_offset(self.offset);
        scene.set_tint(if ctx.input.mouse.is_grabbed() {
            Color::from_straight(1.0, 0.85, 0.6, 1.0)
        } else {
            Color::WHITE
        });

        ctx.render(Color::from_straight(0.07, 0.07, 0.09, 1.0), |rctx, target| {
            scene.draw(rctx, target);
        })
    }

    fn on_exit(&mut self) {
        if let Some(mut scene) = self.scene.take() {
            scene.clear();
        }
    }
}
