use std::path::Path;

use anyhow::Result;
use kiln_engine::paint::Color;
use kiln_engine::render::{
    Mesh, MeshBuffer, RenderCtx, RenderTarget, Shader, ShaderProgram, ShaderStage, Texture,
    TextureFilter, TextureOptions, UniformKind, UniformLayout,
};

const UNIFORMS: [(&str, UniformKind); 3] = [
    ("time", UniformKind::Float),
    ("offset", UniformKind::Vec2),
    ("tint", UniformKind::Vec4),
];

const CHECKER_SIZE: u32 = 8;

/// GPU resources for the demo triangle.
pub struct Scene {
    mesh: Mesh,
    program: ShaderProgram,
    texture: Texture,
}

impl Scene {
    /// Builds the mesh, program and texture. `image` replaces the generated
    /// checkerboard when it loads.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        image: Option<&Path>,
    ) -> Result<Self> {
        let positions = MeshBuffer::new(vec![0.0, 0.6, -0.6, -0.45, 0.6, -0.45], 2);
        let colors = MeshBuffer::new(vec![1.0, 0.3, 0.3, 0.3, 1.0, 0.3, 0.3, 0.3, 1.0], 3);
        let uvs = MeshBuffer::new(vec![0.5, 0.0, 0.0, 1.0, 1.0, 1.0], 2);
        let mesh = Mesh::new(
            device,
            &positions,
            &[colors, uvs],
            wgpu::PrimitiveTopology::TriangleList,
        )?;

        let layout = UniformLayout::new(UNIFORMS)?;
        let source = format!(
            "{}\n{}",
            layout.wgsl_struct("Uniforms"),
            include_str!("../shaders/sandbox.wgsl")
        );
        let shader = Shader::from_wgsl(device, "sandbox.wgsl", &source)?;

        let layouts = mesh.vertex_layouts();
        let mut builder = ShaderProgram::builder("sandbox")
            .attach(ShaderStage::Vertex, &shader)
            .attach(ShaderStage::Fragment, &shader)
            .texture_slots(1)
            .vertex_layouts(&layouts);
        for (name, kind) in UNIFORMS {
            builder = builder.uniform(name, kind);
        }
        let mut program = builder.link(device, queue, surface_format)?;

        let texture = match image {
            Some(path) => Texture::load_from_file(
                device,
                queue,
                path,
                TextureOptions {
                    filter: TextureFilter::Linear,
                    flip_vertically: false,
                },
            )
            .or_else(|e| {
                log::warn!("{e:#}; using checkerboard");
                checkerboard(device, queue)
            })?,
            None => checkerboard(device, queue)?,
        };

        program.set_texture(0, &texture);
        program.set_vec4("tint", Color::WHITE.to_array());

        Ok(Self {
            mesh,
            program,
            texture,
        })
    }

    pub fn set_time(&mut self, seconds: f32) {
        self.program.set_float("time", seconds);
    }

    pub fn set_offset(&mut self, offset: [f32; 2]) {
        self.program.set_vec2("offset", offset);
    }

    pub fn set_tint(&mut self, tint: Color) {
        self.program.set_vec4("tint", tint.to_array());
    }

    pub fn draw(&mut self, rctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>) {
        self.program.prepare(rctx.device, rctx.queue);

        let mut pass = target.begin_pass("sandbox");
        self.program.bind(&mut pass);
        self.mesh.draw(&mut pass);
    }

    /// Releases GPU resources ahead of the device going away.
    pub fn clear(&mut self) {
        self.mesh.clear();
        self.program.clear_texture(0);
        self.program.clear();
        self.texture.clear();
    }
}

fn checkerboard(device: &wgpu::Device, queue: &wgpu::Queue) -> Result<Texture> {
    let mut pixels = Vec::with_capacity((CHECKER_SIZE * CHECKER_SIZE * 4) as usize);
    for y in 0..CHECKER_SIZE {
        for x in 0..CHECKER_SIZE {
            let v = if (x + y) % 2 == 0 { 255 } else { 96 };
            pixels.extend_from_slice(&[v, v, v, 255]);
        }
    }
    Texture::from_rgba8(
        device,
        queue,
        "checkerboard",
        CHECKER_SIZE,
        CHECKER_SIZE,
        &pixels,
        TextureFilter::Nearest,
    )
}
