//! Strided views over interleaved `f32` vertex data.
//!
//! Skinning, morph and pose blending all read and write positions (and
//! optionally normals) in caller-owned buffers. A [`VertexLayout`] describes
//! where those attributes live inside one vertex, measured in floats.

use glam::Vec3;

use crate::errors::{ArmatureError, Result};

/// Attribute placement inside an interleaved vertex, in `f32` units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexLayout {
    /// Distance between the starts of two consecutive vertices.
    pub stride: usize,
    /// Offset of the position triple inside a vertex.
    pub position_offset: usize,
    /// Offset of the normal triple, if the buffer carries normals.
    pub normal_offset: Option<usize>,
}

impl VertexLayout {
    /// Tightly packed positions.
    pub const POSITION: Self = Self {
        stride: 3,
        position_offset: 0,
        normal_offset: None,
    };

    /// Tightly packed position + normal pairs.
    pub const POSITION_NORMAL: Self = Self {
        stride: 6,
        position_offset: 0,
        normal_offset: Some(3),
    };

    #[inline]
    #[must_use]
    pub fn has_normals(&self) -> bool {
        self.normal_offset.is_some()
    }

    fn validate(&self) -> Result<()> {
        let fits = |offset: usize| offset + 3 <= self.stride;
        if self.stride == 0 || !fits(self.position_offset) {
            return Err(ArmatureError::invalid_parameter(format!(
                "position at offset {} does not fit a vertex stride of {}",
                self.position_offset, self.stride
            )));
        }
        if let Some(normal) = self.normal_offset
            && !fits(normal)
        {
            return Err(ArmatureError::invalid_parameter(format!(
                "normal at offset {normal} does not fit a vertex stride of {}",
                self.stride
            )));
        }
        Ok(())
    }
}

#[inline]
fn read3(data: &[f32], at: usize) -> Vec3 {
    Vec3::new(data[at], data[at + 1], data[at + 2])
}

#[inline]
fn write3(data: &mut [f32], at: usize, v: Vec3) {
    data[at] = v.x;
    data[at + 1] = v.y;
    data[at + 2] = v.z;
}

/// Read-only vertex view.
#[derive(Debug, Clone, Copy)]
pub struct VertexBuffer<'a> {
    data: &'a [f32],
    layout: VertexLayout,
    vertex_count: usize,
}

impl<'a> VertexBuffer<'a> {
    pub fn new(data: &'a [f32], layout: VertexLayout) -> Result<Self> {
        layout.validate()?;
        Ok(Self {
            data,
            layout,
            vertex_count: data.len() / layout.stride,
        })
    }

    #[inline]
    #[must_use]
    pub fn layout(&self) -> VertexLayout {
        self.layout
    }

    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    #[inline]
    #[must_use]
    pub fn position(&self, index: usize) -> Vec3 {
        read3(self.data, index * self.layout.stride + self.layout.position_offset)
    }

    #[inline]
    #[must_use]
    pub fn normal(&self, index: usize) -> Option<Vec3> {
        self.layout
            .normal_offset
            .map(|offset| read3(self.data, index * self.layout.stride + offset))
    }
}

/// Mutable vertex view. Only the position and normal attributes are touched;
/// any other interleaved data is left as is.
#[derive(Debug)]
pub struct VertexBufferMut<'a> {
    data: &'a mut [f32],
    layout: VertexLayout,
    vertex_count: usize,
}

impl<'a> VertexBufferMut<'a> {
    pub fn new(data: &'a mut [f32], layout: VertexLayout) -> Result<Self> {
        layout.validate()?;
        let vertex_count = data.len() / layout.stride;
        Ok(Self {
            data,
            layout,
            vertex_count,
        })
    }

    #[inline]
    #[must_use]
    pub fn layout(&self) -> VertexLayout {
        self.layout
    }

    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    #[inline]
    #[must_use]
    pub fn position(&self, index: usize) -> Vec3 {
        read3(self.data, index * self.layout.stride + self.layout.position_offset)
    }

    #[inline]
    #[must_use]
    pub fn normal(&self, index: usize) -> Option<Vec3> {
        self.layout
            .normal_offset
            .map(|offset| read3(self.data, index * self.layout.stride + offset))
    }

    #[inline]
    pub fn set_position(&mut self, index: usize, position: Vec3) {
        let at = index * self.layout.stride + self.layout.position_offset;
        write3(self.data, at, position);
    }

    /// Writes a normal; a no-op when the layout carries none.
    #[inline]
    pub fn set_normal(&mut self, index: usize, normal: Vec3) {
        if let Some(offset) = self.layout.normal_offset {
            write3(self.data, index * self.layout.stride + offset, normal);
        }
    }

    #[must_use]
    pub fn as_buffer(&self) -> VertexBuffer<'_> {
        VertexBuffer {
            data: self.data,
            layout: self.layout,
            vertex_count: self.vertex_count,
        }
    }
}
