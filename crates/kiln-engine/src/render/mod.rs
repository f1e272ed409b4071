//! GPU resource wrappers.
//!
//! Meshes, shaders, linked programs with named uniforms, and textures. Each
//! owns its wgpu objects and releases them on `clear()` or drop. Drawing
//! happens inside a pass opened from the per-frame `RenderTarget`:
//!
//! ```ignore
//! program.prepare(rctx.device, rctx.queue);
//! let mut pass = target.begin_pass("scene");
//! program.bind(&mut pass);
//! mesh.draw(&mut pass);
//! ```

mod ctx;
mod mesh;
mod program;
mod shader;
mod texture;
mod uniform;

pub use ctx::{RenderCtx, RenderTarget};
pub use mesh::{Mesh, MeshBuffer};
pub use program::{bank_bindings, ProgramBuilder, ShaderProgram, MAX_TEXTURE_BANKS};
pub use shader::{Shader, ShaderStage};
pub use texture::{decode_rgba8, Texture, TextureFilter, TextureOptions};
pub use uniform::{UniformBlock, UniformField, UniformKind, UniformLayout, UniformMismatch, UniformValue};
