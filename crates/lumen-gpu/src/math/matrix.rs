use bytemuck::{Pod, Zeroable};

/// 4x4 matrix of `f32`, column-major (`data[col * 4 + row]`).
///
/// This is the layout uploaded to vertex shaders, so it is kept as a flat array
/// rather than a math-library type. Conversions to `glam::Mat4` are free.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Matrix4x4 {
    pub data: [f32; 16],
}

impl Matrix4x4 {
    pub const IDENTITY: Matrix4x4 = Matrix4x4 {
        data: [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
    };

    #[inline]
    pub const fn from_cols_array(data: [f32; 16]) -> Self {
        Self { data }
    }

    /// Pure 2D translation.
    #[inline]
    pub fn translation(x: f32, y: f32) -> Self {
        Self::from_glam(glam::Mat4::from_translation(glam::Vec3::new(x, y, 0.0)))
    }

    /// Pure 2D scale.
    #[inline]
    pub fn scale(x: f32, y: f32) -> Self {
        Self::from_glam(glam::Mat4::from_scale(glam::Vec3::new(x, y, 1.0)))
    }

    #[inline]
    pub fn from_glam(m: glam::Mat4) -> Self {
        Self { data: m.to_cols_array() }
    }

    #[inline]
    pub fn to_glam(self) -> glam::Mat4 {
        glam::Mat4::from_cols_array(&self.data)
    }

    /// Transforms `(x, y, 0, 1)` and returns the homogeneous result.
    #[inline]
    pub fn transform_point(self, x: f32, y: f32) -> [f32; 4] {
        self.to_glam().mul_vec4(glam::Vec4::new(x, y, 0.0, 1.0)).to_array()
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }
}

/// `self * rhs`: `rhs` is applied first.
impl std::ops::Mul for Matrix4x4 {
    type Output = Matrix4x4;

    #[inline]
    fn mul(self, rhs: Matrix4x4) -> Matrix4x4 {
        Self::from_glam(self.to_glam() * rhs.to_glam())
    }
}

impl Default for Matrix4x4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Four-component `f32` vector (shader uniform slot).
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct Vec4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Vec4 {
    pub const ZERO: Vec4 = Vec4::new(0.0, 0.0, 0.0, 0.0);

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    #[inline]
    pub const fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }
}

impl From<[f32; 4]> for Vec4 {
    fn from(v: [f32; 4]) -> Self {
        Vec4::new(v[0], v[1], v[2], v[3])
    }
}
