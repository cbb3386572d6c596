//! Row-major 4x4 matrix algebra
//!
//! `Matrix4f` is the only matrix type that crosses the GPU boundary. Its
//! [`Matrix4f::linearize`] order (row 0 columns 0..3, then row 1, ...) is the
//! serialization contract shared with the skinning shader, which rebuilds
//! each matrix from 16 consecutive floats.

use std::ops::Mul;

/// 4x4 single-precision matrix stored in row-major order
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(from = "[f32; 16]", into = "[f32; 16]")
)]
pub struct Matrix4f {
    /// Matrix data in row-major order
    data: [f32; 16],
}

impl Matrix4f {
    /// Identity matrix
    pub const IDENTITY: Self = Self {
        data: [
            1.0, 0.0, 0.0, 0.0, // Row 0
            0.0, 1.0, 0.0, 0.0, // Row 1
            0.0, 0.0, 1.0, 0.0, // Row 2
            0.0, 0.0, 0.0, 1.0, // Row 3
        ],
    };

    /// Create identity matrix
    pub fn identity() -> Self {
        Self::IDENTITY
    }

    /// Build a matrix from 16 floats in row-major order
    ///
    /// This is the inverse of [`Matrix4f::linearize`].
    pub const fn from_row_major(data: [f32; 16]) -> Self {
        Self { data }
    }

    /// Build a matrix from four rows
    pub fn from_rows(rows: [[f32; 4]; 4]) -> Self {
        let mut data = [0.0; 16];
        for (row, values) in rows.iter().enumerate() {
            data[row * 4..row * 4 + 4].copy_from_slice(values);
        }
        Self { data }
    }

    /// Create translation matrix
    pub fn from_translation(x: f32, y: f32, z: f32) -> Self {
        Self {
            data: [
                1.0, 0.0, 0.0, x, // Row 0
                0.0, 1.0, 0.0, y, // Row 1
                0.0, 0.0, 1.0, z, // Row 2
                0.0, 0.0, 0.0, 1.0, // Row 3
            ],
        }
    }

    /// Entry at `row`, `col` (both 0..4)
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * 4 + col]
    }

    /// Multiply two matrices (`self * other`)
    ///
    /// `result[row][col] = sum over k of self[row][k] * other[k][col]`,
    /// accumulated left to right.
    pub fn multiply(&self, other: &Self) -> Self {
        let a = &self.data;
        let b = &other.data;

        let a00 = a[0];
        let a01 = a[1];
        let a02 = a[2];
        let a03 = a[3];
        let a10 = a[4];
        let a11 = a[5];
        let a12 = a[6];
        let a13 = a[7];
        let a20 = a[8];
        let a21 = a[9];
        let a22 = a[10];
        let a23 = a[11];
        let a30 = a[12];
        let a31 = a[13];
        let a32 = a[14];
        let a33 = a[15];

        let b00 = b[0];
        let b01 = b[1];
        let b02 = b[2];
        let b03 = b[3];
        let b10 = b[4];
        let b11 = b[5];
        let b12 = b[6];
        let b13 = b[7];
        let b20 = b[8];
        let b21 = b[9];
        let b22 = b[10];
        let b23 = b[11];
        let b30 = b[12];
        let b31 = b[13];
        let b32 = b[14];
        let b33 = b[15];

        Self {
            data: [
                a00 * b00 + a01 * b10 + a02 * b20 + a03 * b30,
                a00 * b01 + a01 * b11 + a02 * b21 + a03 * b31,
                a00 * b02 + a01 * b12 + a02 * b22 + a03 * b32,
                a00 * b03 + a01 * b13 + a02 * b23 + a03 * b33,
                a10 * b00 + a11 * b10 + a12 * b20 + a13 * b30,
                a10 * b01 + a11 * b11 + a12 * b21 + a13 * b31,
                a10 * b02 + a11 * b12 + a12 * b22 + a13 * b32,
                a10 * b03 + a11 * b13 + a12 * b23 + a13 * b33,
                a20 * b00 + a21 * b10 + a22 * b20 + a23 * b30,
                a20 * b01 + a21 * b11 + a22 * b21 + a23 * b31,
                a20 * b02 + a21 * b12 + a22 * b22 + a23 * b32,
                a20 * b03 + a21 * b13 + a22 * b23 + a23 * b33,
                a30 * b00 + a31 * b10 + a32 * b20 + a33 * b30,
                a30 * b01 + a31 * b11 + a32 * b21 + a33 * b31,
                a30 * b02 + a31 * b12 + a32 * b22 + a33 * b32,
                a30 * b03 + a31 * b13 + a32 * b23 + a33 * b33,
            ],
        }
    }

    /// The 16 entries in row-major order, ready for GPU upload
    pub fn linearize(&self) -> [f32; 16] {
        self.data
    }

    /// Borrow the row-major entries
    pub fn as_array(&self) -> &[f32; 16] {
        &self.data
    }

    /// Transposed copy
    pub fn transpose(&self) -> Self {
        let m = &self.data;
        Self {
            data: [
                m[0], m[4], m[8], m[12], // Row 0
                m[1], m[5], m[9], m[13], // Row 1
                m[2], m[6], m[10], m[14], // Row 2
                m[3], m[7], m[11], m[15], // Row 3
            ],
        }
    }

    /// Transform a point (column vector, implicit w = 1)
    pub fn transform_point(&self, p: [f32; 3]) -> [f32; 3] {
        let m = &self.data;
        [
            m[0] * p[0] + m[1] * p[1] + m[2] * p[2] + m[3],
            m[4] * p[0] + m[5] * p[1] + m[6] * p[2] + m[7],
            m[8] * p[0] + m[9] * p[1] + m[10] * p[2] + m[11],
        ]
    }

    /// Component-wise comparison within `epsilon`
    pub fn approx_eq(&self, other: &Self, epsilon: f32) -> bool {
        self.data
            .iter()
            .zip(other.data.iter())
            .all(|(a, b)| (a - b).abs() <= epsilon)
    }

    /// Convert to a column-major `glam::Mat4`
    pub fn to_glam(&self) -> glam::Mat4 {
        glam::Mat4::from_cols_array(&self.data).transpose()
    }

    /// Convert from a column-major `glam::Mat4`
    pub fn from_glam(m: glam::Mat4) -> Self {
        Self {
            data: m.transpose().to_cols_array(),
        }
    }
}

impl Default for Matrix4f {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<[f32; 16]> for Matrix4f {
    fn from(data: [f32; 16]) -> Self {
        Self::from_row_major(data)
    }
}

impl From<Matrix4f> for [f32; 16] {
    fn from(m: Matrix4f) -> Self {
        m.linearize()
    }
}

impl From<glam::Mat4> for Matrix4f {
    fn from(m: glam::Mat4) -> Self {
        Self::from_glam(m)
    }
}

impl Mul for Matrix4f {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        self.multiply(&rhs)
    }
}

impl Mul<&Matrix4f> for &Matrix4f {
    type Output = Matrix4f;

    fn mul(self, rhs: &Matrix4f) -> Self::Output {
        self.multiply(rhs)
    }
}
