use anyhow::Result;
use wgpu::util::DeviceExt;

/// One vertex attribute stream: tightly packed `f32` components.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshBuffer {
    pub data: Vec<f32>,
    /// Components per vertex (1..=4).
    pub dimensions: u32,
}

impl MeshBuffer {
    pub fn new(data: Vec<f32>, dimensions: u32) -> Self {
        Self { data, dimensions }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of whole vertices in the stream.
    pub fn vertex_count(&self) -> u32 {
        if self.dimensions == 0 {
            0
        } else {
            (self.data.len() / self.dimensions as usize) as u32
        }
    }

    fn format(&self) -> Result<wgpu::VertexFormat> {
        Ok(match self.dimensions {
            1 => wgpu::VertexFormat::Float32,
            2 => wgpu::VertexFormat::Float32x2,
            3 => wgpu::VertexFormat::Float32x3,
            4 => wgpu::VertexFormat::Float32x4,
            n => anyhow::bail!("mesh buffer dimensions must be 1..=4, got {n}"),
        })
    }
}

/// Vertex stream uploaded to the GPU, fed to one shader location.
#[derive(Debug)]
struct VertexStream {
    buffer: wgpu::Buffer,
    location: u32,
    attributes: [wgpu::VertexAttribute; 1],
    stride: u64,
}

/// Vertex-only mesh made of separate attribute streams.
///
/// Stream `i` feeds `@location(i)`: positions at 0, then each additional
/// buffer in order. Empty additional buffers get no stream, so the shader must
/// not read their location.
#[derive(Debug)]
pub struct Mesh {
    streams: Vec<VertexStream>,
    vertex_count: u32,
    topology: wgpu::PrimitiveTopology,
}

impl Mesh {
    /// Uploads `vertices` and `additional` streams.
    ///
    /// Every non-empty stream must hold whole vertices. Additional streams
    /// shorter than the position stream would read out of bounds, so they are
    /// rejected too.
    pub fn new(
        device: &wgpu::Device,
        vertices: &MeshBuffer,
        additional: &[MeshBuffer],
        topology: wgpu::PrimitiveTopology,
    ) -> Result<Self> {
        let vertex_count = validate_streams(vertices, additional)?;

        let mut streams = Vec::with_capacity(additional.len() + 1);
        for (location, buf) in std::iter::once(vertices).chain(additional).enumerate() {
            if buf.is_empty() {
                continue;
            }
            let location = location as u32;
            streams.push(VertexStream {
                buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("kiln mesh stream"),
                    contents: bytemuck::cast_slice(&buf.data),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
                location,
                attributes: [wgpu::VertexAttribute {
                    format: buf.format()?,
                    offset: 0,
                    shader_location: location,
                }],
                stride: buf.dimensions as u64 * std::mem::size_of::<f32>() as u64,
            });
        }

        log::debug!("mesh created: {vertex_count} vertices, {} streams", streams.len());

        Ok(Self {
            streams,
            vertex_count,
            topology,
        })
    }

    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    #[inline]
    pub fn topology(&self) -> wgpu::PrimitiveTopology {
        self.topology
    }

    /// Vertex buffer layouts matching this mesh, in stream order.
    ///
    /// Pass these to `ProgramBuilder::vertex_layouts` when linking a program
    /// that draws this mesh.
    pub fn vertex_layouts(&self) -> Vec<wgpu::VertexBufferLayout<'_>> {
        self.streams
            .iter()
            .map(|s| wgpu::VertexBufferLayout {
                array_stride: s.stride,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &s.attributes,
            })
            .collect()
    }

    /// Binds the streams and draws every vertex. A cleared mesh draws nothing.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        if self.streams.is_empty() || self.vertex_count == 0 {
            return;
        }
        for (slot, s) in self.streams.iter().enumerate() {
            pass.set_vertex_buffer(slot as u32, s.buffer.slice(..));
        }
        pass.draw(0..self.vertex_count, 0..1);
    }

    /// Releases the GPU buffers. Safe to call more than once.
    pub fn clear(&mut self) {
        for s in self.streams.drain(..) {
            log::trace!("mesh stream {} destroyed", s.location);
            s.buffer.destroy();
        }
        self.vertex_count = 0;
    }
}

/// Returns the vertex count shared by all non-empty streams.
fn validate_streams(vertices: &MeshBuffer, additional: &[MeshBuffer]) -> Result<u32> {
    let mut vertex_count = None;

    for (location, buf) in std::iter::once(vertices).chain(additional).enumerate() {
        if buf.is_empty() {
            continue;
        }
        buf.format()?;
        anyhow::ensure!(
            buf.data.len() % buf.dimensions as usize == 0,
            "mesh stream {location}: {} floats is not a multiple of {} dimensions",
            buf.data.len(),
            buf.dimensions
        );

        let count = buf.vertex_count();
        match vertex_count {
            None => vertex_count = Some(count),
            Some(expected) => anyhow::ensure!(
                count >= expected,
                "mesh stream {location}: {count} vertices, positions have {expected}"
            ),
        }
    }

    Ok(if vertices.is_empty() { 0 } else { vertex_count.unwrap_or(0) })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(len: usize, dims: u32) -> MeshBuffer {
        MeshBuffer::new(vec![0.0; len], dims)
    }

    #[test]
    fn vertex_count_from_positions() {
        assert_eq!(validate_streams(&buf(9, 3), &[buf(6, 2)]).unwrap(), 3);
    }

    #[test]
    fn empty_additional_streams_are_skipped() {
        assert_eq!(validate_streams(&buf(8, 2), &[buf(0, 0), buf(16, 4)]).unwrap(), 4);
    }

    #[test]
    fn empty_positions_draw_nothing() {
        assert_eq!(validate_streams(&buf(0, 3), &[]).unwrap(), 0);
    }

    #[test]
    fn bad_dimensions_are_rejected() {
        assert!(validate_streams(&buf(10, 5), &[]).is_err());
        assert!(validate_streams(&buf(3, 0), &[]).is_err());
    }

    #[test]
    fn partial_vertices_are_rejected() {
        assert!(validate_streams(&buf(7, 3), &[]).is_err());
    }

    #[test]
    fn short_attribute_stream_is_rejected() {
        // 3 positions but only 2 colors.
        assert!(validate_streams(&buf(9, 3), &[buf(8, 4)]).is_err());
    }
}
