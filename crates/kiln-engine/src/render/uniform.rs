//! CPU-side uniform block laid out for the WGSL uniform address space.

use std::fmt;

use anyhow::Result;

use crate::coords::Vec2;

/// Type of a uniform block member.
///
/// `Bool` is stored as a `u32` (WGSL `bool` is not host-shareable).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UniformKind {
    Bool,
    Int,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl UniformKind {
    /// Byte size in the uniform address space.
    pub fn size(self) -> u32 {
        match self {
            UniformKind::Bool | UniformKind::Int | UniformKind::Float => 4,
            UniformKind::Vec2 => 8,
            UniformKind::Vec3 => 12,
            UniformKind::Vec4 => 16,
            UniformKind::Mat2 => 16,
            // Three vec3 columns, each padded to 16 bytes.
            UniformKind::Mat3 => 48,
            UniformKind::Mat4 => 64,
        }
    }

    pub fn align(self) -> u32 {
        match self {
            UniformKind::Bool | UniformKind::Int | UniformKind::Float => 4,
            UniformKind::Vec2 | UniformKind::Mat2 => 8,
            UniformKind::Vec3 | UniformKind::Vec4 | UniformKind::Mat3 | UniformKind::Mat4 => 16,
        }
    }

    /// WGSL spelling of the member type.
    pub fn wgsl(self) -> &'static str {
        match self {
            UniformKind::Bool => "u32",
            UniformKind::Int => "i32",
            UniformKind::Float => "f32",
            UniformKind::Vec2 => "vec2<f32>",
            UniformKind::Vec3 => "vec3<f32>",
            UniformKind::Vec4 => "vec4<f32>",
            UniformKind::Mat2 => "mat2x2<f32>",
            UniformKind::Mat3 => "mat3x3<f32>",
            UniformKind::Mat4 => "mat4x4<f32>",
        }
    }
}

/// Value written into a uniform block. Matrices are column-major.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat2([[f32; 2]; 2]),
    Mat3([[f32; 3]; 3]),
    Mat4([[f32; 4]; 4]),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Bool(_) => UniformKind::Bool,
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Mat2(_) => UniformKind::Mat2,
            UniformValue::Mat3(_) => UniformKind::Mat3,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }

    /// Writes the value at the start of `dst`, which must hold `kind().size()` bytes.
    fn write_to(&self, dst: &mut [u8]) {
        match self {
            UniformValue::Bool(v) => dst[..4].copy_from_slice(&(*v as u32).to_ne_bytes()),
            UniformValue::Int(v) => dst[..4].copy_from_slice(&v.to_ne_bytes()),
            UniformValue::Float(v) => dst[..4].copy_from_slice(&v.to_ne_bytes()),
            UniformValue::Vec2(v) => dst[..8].copy_from_slice(bytemuck::cast_slice(v)),
            UniformValue::Vec3(v) => dst[..12].copy_from_slice(bytemuck::cast_slice(v)),
            UniformValue::Vec4(v) => dst[..16].copy_from_slice(bytemuck::cast_slice(v)),
            UniformValue::Mat2(m) => dst[..16].copy_from_slice(bytemuck::cast_slice(m)),
            UniformValue::Mat3(m) => {
                for (i, col) in m.iter().enumerate() {
                    let at = i * 16;
                    dst[at..at + 12].copy_from_slice(bytemuck::cast_slice(col));
                    dst[at + 12..at + 16].fill(0);
                }
            }
            UniformValue::Mat4(m) => dst[..64].copy_from_slice(bytemuck::cast_slice(m)),
        }
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        UniformValue::Vec2([v.x, v.y])
    }
}

/// Named member of a uniform block.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformField {
    pub name: String,
    pub kind: UniformKind,
    pub offset: u32,
}

/// Member offsets and total size of a uniform block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformLayout {
    fields: Vec<UniformField>,
    size: u32,
}

impl UniformLayout {
    /// Lays out members in declaration order. Names must be unique.
    pub fn new<I, S>(members: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, UniformKind)>,
        S: Into<String>,
    {
        let mut fields: Vec<UniformField> = Vec::new();
        let mut end = 0u32;

        for (name, kind) in members {
            let name = name.into();
            anyhow::ensure!(
                !fields.iter().any(|f| f.name == name),
                "duplicate uniform `{name}`"
            );
            let offset = round_up(end, kind.align());
            end = offset + kind.size();
            fields.push(UniformField { name, kind, offset });
        }

        // Uniform buffer bindings are sized in 16-byte units.
        Ok(Self {
            fields,
            size: round_up(end, 16),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Total block size in bytes (multiple of 16, 0 when empty).
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn fields(&self) -> &[UniformField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&UniformField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// WGSL struct declaration matching this layout.
    pub fn wgsl_struct(&self, struct_name: &str) -> String {
        let mut out = format!("struct {struct_name} {{\n");
        for f in &self.fields {
            out.push_str(&format!("    {}: {},\n", f.name, f.kind.wgsl()));
        }
        out.push_str("}\n");
        out
    }
}

/// Why a uniform write was dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformMismatch {
    Unknown,
    Kind { expected: UniformKind, got: UniformKind },
}

impl fmt::Display for UniformMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniformMismatch::Unknown => write!(f, "no such uniform"),
            UniformMismatch::Kind { expected, got } => {
                write!(f, "uniform is {expected:?}, value is {got:?}")
            }
        }
    }
}

impl std::error::Error for UniformMismatch {}

/// Uniform bytes plus a dirty flag for lazy upload.
#[derive(Debug, Clone, Default)]
pub struct UniformBlock {
    layout: UniformLayout,
    bytes: Vec<u8>,
    dirty: bool,
}

impl UniformBlock {
    pub fn new(layout: UniformLayout) -> Self {
        let bytes = vec![0; layout.size() as usize];
        Self {
            layout,
            bytes,
            dirty: true,
        }
    }

    pub fn layout(&self) -> &UniformLayout {
        &self.layout
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns the bytes to upload if anything changed since the last call.
    pub fn take_dirty(&mut self) -> Option<&[u8]> {
        if !self.dirty || self.bytes.is_empty() {
            return None;
        }
        self.dirty = false;
        Some(&self.bytes)
    }

    pub fn set(&mut self, name: &str, value: UniformValue) -> std::result::Result<(), UniformMismatch> {
        let field = self.layout.field(name).ok_or(UniformMismatch::Unknown)?;
        if field.kind != value.kind() {
            return Err(UniformMismatch::Kind {
                expected: field.kind,
                got: value.kind(),
            });
        }

        let at = field.offset as usize;
        let end = at + field.kind.size() as usize;
        value.write_to(&mut self.bytes[at..end]);
        self.dirty = true;
        Ok(())
    }
}

#[inline]
fn round_up(n: u32, align: u32) -> u32 {
    n.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offsets(layout: &UniformLayout) -> Vec<u32> {
        layout.fields().iter().map(|f| f.offset).collect()
    }

    #[test]
    fn scalars_pack_tightly() {
        let l = UniformLayout::new([
            ("a", UniformKind::Float),
            ("b", UniformKind::Int),
            ("c", UniformKind::Bool),
        ])
        .unwrap();
        assert_eq!(offsets(&l), [0, 4, 8]);
        assert_eq!(l.size(), 16);
    }

    #[test]
    fn vec3_aligns_to_16_and_leaves_room_for_a_scalar() {
        let l = UniformLayout::new([
            ("t", UniformKind::Float),
            ("color", UniformKind::Vec3),
            ("alpha", UniformKind::Float),
        ])
        .unwrap();
        assert_eq!(offsets(&l), [0, 16, 28]);
        assert_eq!(l.size(), 32);
    }

    #[test]
    fn matrices_follow_column_alignment() {
        let l = UniformLayout::new([
            ("s", UniformKind::Float),
            ("m2", UniformKind::Mat2),
            ("m3", UniformKind::Mat3),
            ("m4", UniformKind::Mat4),
            ("v2", UniformKind::Vec2),
        ])
        .unwrap();
        assert_eq!(offsets(&l), [0, 8, 32, 80, 144]);
        assert_eq!(l.size(), 160);
    }

    #[test]
    fn empty_layout_has_no_size() {
        let l = UniformLayout::new(Vec::<(String, UniformKind)>::new()).unwrap();
        assert!(l.is_empty());
        assert_eq!(l.size(), 0);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        assert!(UniformLayout::new([("x", UniformKind::Float), ("x", UniformKind::Int)]).is_err());
    }

    #[test]
    fn wgsl_struct_lists_members() {
        let l = UniformLayout::new([("time", UniformKind::Float), ("tint", UniformKind::Vec4)])
            .unwrap();
        assert_eq!(
            l.wgsl_struct("Globals"),
            "struct Globals {\n    time: f32,\n    tint: vec4<f32>,\n}\n"
        );
    }

    #[test]
    fn set_writes_at_field_offset() {
        let l = UniformLayout::new([("t", UniformKind::Float), ("c", UniformKind::Vec3)]).unwrap();
        let mut block = UniformBlock::new(l);
        block.take_dirty();

        block.set("c", UniformValue::Vec3([1.0, 2.0, 3.0])).unwrap();
        let floats: &[f32] = bytemuck::cast_slice(block.bytes());
        assert_eq!(&floats[4..7], &[1.0, 2.0, 3.0]);
        assert!(block.is_dirty());
    }

    #[test]
    fn mat3_columns_are_padded() {
        let l = UniformLayout::new([("m", UniformKind::Mat3)]).unwrap();
        let mut block = UniformBlock::new(l);
        block
            .set("m", UniformValue::Mat3([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]))
            .unwrap();

        let floats: &[f32] = bytemuck::cast_slice(block.bytes());
        assert_eq!(floats, &[1.0, 2.0, 3.0, 0.0, 4.0, 5.0, 6.0, 0.0, 7.0, 8.0, 9.0, 0.0]);
    }

    #[test]
    fn bool_is_stored_as_u32() {
        let l = UniformLayout::new([("on", UniformKind::Bool)]).unwrap();
        let mut block = UniformBlock::new(l);
        block.set("on", UniformValue::Bool(true)).unwrap();
        let words: &[u32] = bytemuck::cast_slice(block.bytes());
        assert_eq!(words[0], 1);
    }

    #[test]
    fn mismatches_leave_bytes_untouched() {
        let l = UniformLayout::new([("t", UniformKind::Float)]).unwrap();
        let mut block = UniformBlock::new(l);
        block.take_dirty();

        assert_eq!(block.set("missing", UniformValue::Float(1.0)), Err(UniformMismatch::Unknown));
        assert_eq!(
            block.set("t", UniformValue::Int(1)),
            Err(UniformMismatch::Kind {
                expected: UniformKind::Float,
                got: UniformKind::Int
            })
        );
        assert!(!block.is_dirty());
        assert!(block.bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn take_dirty_reports_once() {
        let l = UniformLayout::new([("t", UniformKind::Float)]).unwrap();
        let mut block = UniformBlock::new(l);
        assert!(block.take_dirty().is_some());
        assert!(block.take_dirty().is_none());
        block.set("t", UniformValue::Float(0.5)).unwrap();
        assert_eq!(block.take_dirty().map(<[u8]>::len), Some(16));
    }
}
