//! Linked render pipeline with named uniforms and texture banks.
//!
//! Binding convention seen by the WGSL side:
//!
//! ```wgsl
//! @group(0) @binding(0) var<uniform> u: Uniforms;   // only when uniforms are declared
//! @group(1) @binding(0) var tex0: texture_2d<f32>;  // bank 0
//! @group(1) @binding(1) var samp0: sampler;
//! @group(1) @binding(2) var tex1: texture_2d<f32>;  // bank 1, and so on
//! ```
//!
//! `UniformLayout::wgsl_struct` renders the matching `Uniforms` struct.

use std::collections::HashSet;

use anyhow::{Context, Result};

use super::shader::{Shader, ShaderStage};
use super::texture::{Texture, TextureFilter};
use super::uniform::{UniformBlock, UniformKind, UniformLayout, UniformValue};

/// Texture banks a single program may expose.
pub const MAX_TEXTURE_BANKS: u32 = 8;

const UNIFORM_GROUP: u32 = 0;
const TEXTURE_GROUP: u32 = 1;

/// `(texture, sampler)` binding indices of a bank inside the texture group.
#[inline]
pub fn bank_bindings(bank: u32) -> (u32, u32) {
    (bank * 2, bank * 2 + 1)
}

struct StageEntry<'s> {
    shader: &'s Shader,
    entry_point: String,
}

/// Collects stages and interface declarations, then links a [`ShaderProgram`].
pub struct ProgramBuilder<'s> {
    label: String,
    vertex: Option<StageEntry<'s>>,
    fragment: Option<StageEntry<'s>>,
    uniforms: Vec<(String, UniformKind)>,
    texture_slots: u32,
    vertex_layouts: &'s [wgpu::VertexBufferLayout<'s>],
    topology: wgpu::PrimitiveTopology,
    blend: Option<wgpu::BlendState>,
}

impl<'s> ProgramBuilder<'s> {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            vertex: None,
            fragment: None,
            uniforms: Vec::new(),
            texture_slots: 0,
            vertex_layouts: &[],
            topology: wgpu::PrimitiveTopology::TriangleList,
            blend: Some(wgpu::BlendState::ALPHA_BLENDING),
        }
    }

    /// Attaches `shader` for `stage` using the stage's default entry point.
    /// Attaching a stage twice replaces the earlier shader.
    pub fn attach(self, stage: ShaderStage, shader: &'s Shader) -> Self {
        self.attach_entry(stage, shader, stage.default_entry_point())
    }

    pub fn attach_entry(mut self, stage: ShaderStage, shader: &'s Shader, entry_point: &str) -> Self {
        let entry = Some(StageEntry {
            shader,
            entry_point: entry_point.to_string(),
        });
        match stage {
            ShaderStage::Vertex => self.vertex = entry,
            ShaderStage::Fragment => self.fragment = entry,
        }
        self
    }

    /// Declares a uniform. Declaration order fixes the block layout.
    pub fn uniform(mut self, name: impl Into<String>, kind: UniformKind) -> Self {
        self.uniforms.push((name.into(), kind));
        self
    }

    pub fn texture_slots(mut self, count: u32) -> Self {
        self.texture_slots = count;
        self
    }

    pub fn vertex_layouts(mut self, layouts: &'s [wgpu::VertexBufferLayout<'s>]) -> Self {
        self.vertex_layouts = layouts;
        self
    }

    pub fn topology(mut self, topology: wgpu::PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    /// Color blending; `None` writes fragments unblended.
    pub fn blend(mut self, blend: Option<wgpu::BlendState>) -> Self {
        self.blend = blend;
        self
    }

    fn validate(&self) -> Result<UniformLayout> {
        for (stage, entry) in [
            (ShaderStage::Vertex, &self.vertex),
            (ShaderStage::Fragment, &self.fragment),
        ] {
            anyhow::ensure!(
                entry.is_some(),
                "program {}: no {stage:?} shader attached",
                self.label
            );
        }
        anyhow::ensure!(
            self.texture_slots <= MAX_TEXTURE_BANKS,
            "program {}: {} texture slots requested, at most {MAX_TEXTURE_BANKS} supported",
            self.label,
            self.texture_slots
        );
        UniformLayout::new(self.uniforms.iter().cloned())
            .with_context(|| format!("program {}: bad uniform block", self.label))
    }

    /// Builds the pipeline for `surface_format`.
    pub fn link(
        self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
    ) -> Result<ShaderProgram> {
        let layout = self.validate()?;
        let (Some(vertex), Some(fragment)) = (&self.vertex, &self.fragment) else {
            anyhow::bail!("program {}: missing stage", self.label);
        };

        // Validation errors (bad entry point, layout mismatch) surface here
        // instead of through the device's uncaptured-error handler.
        let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);

        let uniform_entries: Vec<wgpu::BindGroupLayoutEntry> =
            match std::num::NonZeroU64::new(layout.size() as u64) {
                Some(size) => vec![wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: Some(size),
                    },
                    count: None,
                }],
                None => Vec::new(),
            };
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{} uniforms", self.label)),
            entries: &uniform_entries,
        });

        let texture_layout = (self.texture_slots > 0).then(|| {
            let entries: Vec<wgpu::BindGroupLayoutEntry> = (0..self.texture_slots)
                .flat_map(|bank| {
                    let (tex, samp) = bank_bindings(bank);
                    [
                        wgpu::BindGroupLayoutEntry {
                            binding: tex,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Texture {
                                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                                view_dimension: wgpu::TextureViewDimension::D2,
                                multisampled: false,
                            },
                            count: None,
                        },
                        wgpu::BindGroupLayoutEntry {
                            binding: samp,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                            count: None,
                        },
                    ]
                })
                .collect();
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&format!("{} textures", self.label)),
                entries: &entries,
            })
        });

        let mut group_layouts = vec![&uniform_layout];
        if let Some(tl) = texture_layout.as_ref() {
            group_layouts.push(tl);
        }
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&self.label),
            bind_group_layouts: &group_layouts,
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&self.label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: vertex.shader.module(),
                entry_point: Some(&vertex.entry_point),
                compilation_options: Default::default(),
                buffers: self.vertex_layouts,
            },
            fragment: Some(wgpu::FragmentState {
                module: fragment.shader.module(),
                entry_point: Some(&fragment.entry_point),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: self.blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: self.topology,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let uniform_buffer = (!layout.is_empty()).then(|| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("{} uniform buffer", self.label)),
                size: layout.size() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });
        let uniform_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} uniforms", self.label)),
            layout: &uniform_layout,
            entries: &uniform_buffer
                .iter()
                .map(|b| wgpu::BindGroupEntry {
                    binding: 0,
                    resource: b.as_entire_binding(),
                })
                .collect::<Vec<_>>(),
        });

        let fallback = if texture_layout.is_some() {
            Some(Texture::from_rgba8(
                device,
                queue,
                &format!("{} fallback texture", self.label),
                1,
                1,
                &[255, 255, 255, 255],
                TextureFilter::Nearest,
            )?)
        } else {
            None
        };

        if let Some(err) = pollster::block_on(scope.pop()) {
            log::error!("program {}: link failed: {err}", self.label);
            anyhow::bail!("program {}: link failed: {err}", self.label);
        }

        log::info!(
            "program linked: {} ({} + {}, {} uniforms, {} texture banks)",
            self.label,
            vertex.shader.describe(ShaderStage::Vertex),
            fragment.shader.describe(ShaderStage::Fragment),
            layout.fields().len(),
            self.texture_slots
        );

        Ok(ShaderProgram {
            label: self.label,
            pipeline: Some(pipeline),
            uniforms: UniformBlock::new(layout),
            uniform_buffer,
            uniform_group: Some(uniform_group),
            textures: texture_layout.map(|layout| TextureBanks {
                layout,
                group: None,
                banks: vec![None; self.texture_slots as usize],
                fallback,
            }),
            warned: HashSet::new(),
        })
    }
}

#[derive(Debug, Clone)]
struct BoundTexture {
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

struct TextureBanks {
    layout: wgpu::BindGroupLayout,
    /// Rebuilt on `prepare` after any bank changes.
    group: Option<wgpu::BindGroup>,
    banks: Vec<Option<BoundTexture>>,
    fallback: Option<Texture>,
}

/// Linked program: pipeline, uniform block and texture banks.
///
/// Setters only touch CPU state. Call [`ShaderProgram::prepare`] before the
/// render pass that uses the program, then [`ShaderProgram::bind`] inside it.
pub struct ShaderProgram {
    label: String,
    pipeline: Option<wgpu::RenderPipeline>,
    uniforms: UniformBlock,
    uniform_buffer: Option<wgpu::Buffer>,
    uniform_group: Option<wgpu::BindGroup>,
    textures: Option<TextureBanks>,
    /// Names already reported as unknown or mistyped.
    warned: HashSet<String>,
}

impl ShaderProgram {
    pub fn builder<'s>(label: impl Into<String>) -> ProgramBuilder<'s> {
        ProgramBuilder::new(label)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn uniform_layout(&self) -> &UniformLayout {
        self.uniforms.layout()
    }

    pub fn texture_slots(&self) -> u32 {
        self.textures.as_ref().map_or(0, |t| t.banks.len() as u32)
    }

    pub fn is_cleared(&self) -> bool {
        self.pipeline.is_none()
    }

    /// Writes a uniform. Unknown names and mismatched kinds are logged once
    /// per name and otherwise ignored.
    pub fn set_uniform(&mut self, name: &str, value: UniformValue) {
        if let Err(err) = self.uniforms.set(name, value) {
            if self.warned.insert(name.to_string()) {
                log::warn!("program {}: uniform `{name}` ignored: {err}", self.label);
            }
        }
    }

    pub fn set_bool(&mut self, name: &str, value: bool) {
        self.set_uniform(name, UniformValue::Bool(value));
    }

    pub fn set_int(&mut self, name: &str, value: i32) {
        self.set_uniform(name, UniformValue::Int(value));
    }

    pub fn set_float(&mut self, name: &str, value: f32) {
        self.set_uniform(name, UniformValue::Float(value));
    }

    pub fn set_vec2(&mut self, name: &str, value: [f32; 2]) {
        self.set_uniform(name, UniformValue::Vec2(value));
    }

    pub fn set_vec3(&mut self, name: &str, value: [f32; 3]) {
        self.set_uniform(name, UniformValue::Vec3(value));
    }

    pub fn set_vec4(&mut self, name: &str, value: [f32; 4]) {
        self.set_uniform(name, UniformValue::Vec4(value));
    }

    /// Column-major.
    pub fn set_mat2(&mut self, name: &str, value: [[f32; 2]; 2]) {
        self.set_uniform(name, UniformValue::Mat2(value));
    }

    pub fn set_mat3(&mut self, name: &str, value: [[f32; 3]; 3]) {
        self.set_uniform(name, UniformValue::Mat3(value));
    }

    pub fn set_mat4(&mut self, name: &str, value: [[f32; 4]; 4]) {
        self.set_uniform(name, UniformValue::Mat4(value));
    }

    /// Binds `texture` to `bank`. Out-of-range banks and cleared textures are
    /// logged and ignored.
    pub fn set_texture(&mut self, bank: u32, texture: &Texture) {
        let (Some(view), Some(sampler)) = (texture.view(), texture.sampler()) else {
            log::warn!(
                "program {}: texture {} is cleared; bank {bank} unchanged",
                self.label,
                texture.label()
            );
            return;
        };
        let bound = BoundTexture {
            view: view.clone(),
            sampler: sampler.clone(),
        };
        let Some(slot) = self.bank_mut(bank) else { return };
        *slot = Some(bound);
        self.invalidate_textures();
    }

    /// Unbinds `bank`; the shader then samples opaque white.
    pub fn clear_texture(&mut self, bank: u32) {
        let Some(slot) = self.bank_mut(bank) else { return };
        *slot = None;
        self.invalidate_textures();
    }

    fn bank_mut(&mut self, bank: u32) -> Option<&mut Option<BoundTexture>> {
        let banks = self.texture_slots();
        let slot = self
            .textures
            .as_mut()
            .and_then(|t| t.banks.get_mut(bank as usize));
        if slot.is_none() {
            log::warn!(
                "program {}: texture bank {bank} out of range ({banks} banks)",
                self.label
            );
        }
        slot
    }

    fn invalidate_textures(&mut self) {
        if let Some(t) = self.textures.as_mut() {
            t.group = None;
        }
    }

    /// Uploads dirty uniforms and rebuilds the texture bind group if needed.
    pub fn prepare(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        if self.is_cleared() {
            return;
        }

        if let (Some(buffer), Some(bytes)) = (&self.uniform_buffer, self.uniforms.take_dirty()) {
            queue.write_buffer(buffer, 0, bytes);
        }

        let Some(textures) = self.textures.as_mut() else { return };
        if textures.group.is_some() {
            return;
        }
        let Some((fallback_view, fallback_sampler)) = textures
            .fallback
            .as_ref()
            .and_then(|f| f.view().zip(f.sampler()))
        else {
            return;
        };

        let mut entries = Vec::with_capacity(textures.banks.len() * 2);
        for (bank, bound) in textures.banks.iter().enumerate() {
            let (view, sampler) = match bound {
                Some(b) => (&b.view, &b.sampler),
                None => (fallback_view, fallback_sampler),
            };
            let (tex, samp) = bank_bindings(bank as u32);
            entries.push(wgpu::BindGroupEntry {
                binding: tex,
                resource: wgpu::BindingResource::TextureView(view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: samp,
                resource: wgpu::BindingResource::Sampler(sampler),
            });
        }

        let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} textures", self.label)),
            layout: &textures.layout,
            entries: &entries,
        });
        match pollster::block_on(scope.pop()) {
            None => textures.group = Some(group),
            Some(err) => log::error!("program {}: texture bind group rejected: {err}", self.label),
        }
    }

    /// Sets the pipeline and bind groups on `pass`. Does nothing once cleared.
    ///
    /// A program with texture banks must be prepared first.
    pub fn bind(&self, pass: &mut wgpu::RenderPass<'_>) {
        let (Some(pipeline), Some(uniforms)) = (&self.pipeline, &self.uniform_group) else {
            return;
        };
        pass.set_pipeline(pipeline);
        pass.set_bind_group(UNIFORM_GROUP, uniforms, &[]);

        if let Some(textures) = self.textures.as_ref() {
            match textures.group.as_ref() {
                Some(group) => pass.set_bind_group(TEXTURE_GROUP, group, &[]),
                None => log::warn!(
                    "program {}: textures changed without prepare; draw may fail",
                    self.label
                ),
            }
        }
    }

    /// Releases GPU objects. Later binds, prepares and draws are no-ops.
    pub fn clear(&mut self) {
        if let Some(buffer) = self.uniform_buffer.take() {
            buffer.destroy();
        }
        if let Some(mut textures) = self.textures.take() {
            if let Some(fallback) = textures.fallback.as_mut() {
                fallback.clear();
            }
        }
        if self.pipeline.take().is_some() {
            log::debug!("program cleared: {}", self.label);
        }
        self.uniform_group = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXTURED: &str = r#"
struct Uniforms {
    tint: vec4<f32>,
};
@group(0) @binding(0) var<uniform> u: Uniforms;
@group(1) @binding(0) var tex0: texture_2d<f32>;
@group(1) @binding(1) var samp0: sampler;

@vertex
fn vs_main(@builtin(vertex_index) i: u32) -> @builtin(position) vec4<f32> {
    return vec4<f32>(f32(i), 0.0, 0.0, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return textureSample(tex0, samp0, vec2<f32>(0.5, 0.5)) * u.tint;
}
"#;

    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

    fn test_device() -> (wgpu::Device, wgpu::Queue) {
        wgpu::Device::noop(&wgpu::DeviceDescriptor::default())
    }

    fn textured_program(device: &wgpu::Device, queue: &wgpu::Queue) -> ShaderProgram {
        let shader = Shader::from_wgsl(device, "textured", TEXTURED).unwrap();
        ShaderProgram::builder("p")
            .attach(ShaderStage::Vertex, &shader)
            .attach(ShaderStage::Fragment, &shader)
            .uniform("tint", UniformKind::Vec4)
            .texture_slots(1)
            .link(device, queue, FORMAT)
            .unwrap()
    }

    fn white(device: &wgpu::Device, queue: &wgpu::Queue, label: &str) -> Texture {
        Texture::from_rgba8(device, queue, label, 1, 1, &[255; 4], TextureFilter::Linear)
            .unwrap()
    }

    #[test]
    fn links_and_prepares() {
        let (device, queue) = test_device();
        let mut program = textured_program(&device, &queue);
        assert_eq!(program.texture_slots(), 1);

        program.set_vec4("tint", [1.0, 0.5, 0.5, 1.0]);
        program.prepare(&device, &queue);
        assert!(!program.uniforms.is_dirty());
        assert!(program.textures.as_ref().unwrap().group.is_some());
    }

    #[test]
    fn missing_entry_point_fails_to_link() {
        let (device, queue) = test_device();
        let vertex_only = Shader::from_wgsl(
            &device,
            "vertex only",
            "@vertex fn vs_main() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0); }",
        )
        .unwrap();

        let err = ShaderProgram::builder("no fragment")
            .attach(ShaderStage::Vertex, &vertex_only)
            .attach(ShaderStage::Fragment, &vertex_only)
            .link(&device, &queue, FORMAT)
            .err()
            .unwrap();
        assert!(err.to_string().contains("no fragment"));
    }

    #[test]
    fn cleared_texture_stays_bound_until_replaced() {
        let (device, queue) = test_device();
        let mut program = textured_program(&device, &queue);
        let mut tex = white(&device, &queue, "t");

        program.set_texture(0, &tex);
        tex.clear();
        assert!(tex.is_cleared());
        program.prepare(&device, &queue);
        assert!(program.textures.as_ref().unwrap().group.is_some());

        // A cleared texture cannot be bound again.
        program.clear_texture(0);
        program.set_texture(0, &tex);
        assert!(program.textures.as_ref().unwrap().banks[0].is_none());
        program.prepare(&device, &queue);
        assert!(program.textures.as_ref().unwrap().group.is_some());
    }

    #[test]
    fn out_of_range_banks_are_ignored() {
        let (device, queue) = test_device();
        let mut program = textured_program(&device, &queue);
        let tex = white(&device, &queue, "t");

        program.set_texture(0, &tex);
        program.prepare(&device, &queue);
        program.set_texture(4, &tex);
        program.clear_texture(4);
        // Nothing changed, so the bind group was not invalidated.
        assert!(program.textures.as_ref().unwrap().group.is_some());
        assert!(program.textures.as_ref().unwrap().banks[0].is_some());
    }

    #[test]
    fn cleared_program_ignores_everything() {
        let (device, queue) = test_device();
        let mut program = textured_program(&device, &queue);
        program.clear();
        assert!(program.is_cleared());
        assert_eq!(program.texture_slots(), 0);
        program.set_float("tint", 1.0);
        program.prepare(&device, &queue);
        program.clear();
    }

    #[test]
    fn banks_use_interleaved_bindings() {
        assert_eq!(bank_bindings(0), (0, 1));
        assert_eq!(bank_bindings(3), (6, 7));
    }

    #[test]
    fn missing_stages_fail_validation() {
        let err = ProgramBuilder::new("p")
            .uniform("t", UniformKind::Float)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("Vertex"));
    }

    #[test]
    fn builder_defaults() {
        let b = ProgramBuilder::new("p");
        assert_eq!(b.topology, wgpu::PrimitiveTopology::TriangleList);
        assert_eq!(b.texture_slots, 0);
        assert!(b.vertex_layouts.is_empty());
        assert_eq!(b.blend, Some(wgpu::BlendState::ALPHA_BLENDING));
    }

    #[test]
    fn builder_records_uniforms_in_order() {
        let b = ProgramBuilder::new("p")
            .uniform("time", UniformKind::Float)
            .uniform("offset", UniformKind::Vec2)
            .texture_slots(2)
            .topology(wgpu::PrimitiveTopology::LineList);
        let names: Vec<_> = b.uniforms.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["time", "offset"]);
        assert_eq!(b.texture_slots, 2);
        assert_eq!(b.topology, wgpu::PrimitiveTopology::LineList);
    }
}
