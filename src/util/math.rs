use std::ops::{Add, Mul, Sub};

/// 3 element vector
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3(pub f64, pub f64, pub f64);

impl Vec3 {
    /// Create from constant values
    pub const fn of(x: f64, y: f64, z: f64) -> Self {
        Self(x, y, z)
    }

    /// Vector of all zeroes
    pub const fn zero() -> Self {
        Self(0., 0., 0.)
    }

    /// Cross product
    pub fn cross(&self, rhs: &Vec3) -> Self {
        Self(
            self.1 * rhs.2 - self.2 * rhs.1,
            self.2 * rhs.0 - self.0 * rhs.2,
            self.0 * rhs.1 - self.1 * rhs.0,
        )
    }

    /// Dot product
    pub fn dot(&self, rhs: &Vec3) -> f64 {
        (self.0 * rhs.0) + (self.1 * rhs.1) + (self.2 * rhs.2)
    }

    /// Magnitude squared
    pub fn mag_sq(&self) -> f64 {
        self.dot(self)
    }

    /// Vector magnitude
    pub fn mag(&self) -> f64 {
        self.mag_sq().sqrt()
    }

    pub fn scale(&self, rhs: f64) -> Self {
        Self(self.0 * rhs, self.1 * rhs, self.2 * rhs)
    }

    /// Unit vector in the same direction, or `None` for a (near) zero vector
    pub fn normalized(&self) -> Option<Vec3> {
        let mag = self.mag();
        if !(mag > f64::EPSILON) {
            return None;
        }
        Some(self.scale(mag.recip()))
    }

    pub const fn as_array(&self) -> [f64; 3] {
        [self.0, self.1, self.2]
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Self::Output {
        Self(self.0 + rhs.0, self.1 + rhs.1, self.2 + rhs.2)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Self::Output {
        Self(self.0 - rhs.0, self.1 - rhs.1, self.2 - rhs.2)
    }
}

/// 3x3 matrix (row-major)
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mat33(pub [f64; 9]);

impl Mat33 {
    pub const fn identity() -> Self {
        Self([
            1., 0., 0.,
            0., 1., 0.,
            0., 0., 1.,
        ])
    }

    /// Build a matrix whose columns are `c0`, `c1`, `c2`
    pub const fn from_columns(c0: Vec3, c1: Vec3, c2: Vec3) -> Self {
        Self([
            c0.0, c1.0, c2.0,
            c0.1, c1.1, c2.1,
            c0.2, c1.2, c2.2,
        ])
    }

    #[inline(always)]
    pub const fn get(&self, row: usize, col: usize) -> f64 {
        self.0[row * 3 + col]
    }

    pub fn transposed(&self) -> Self {
        let m = &self.0;
        Self([
            m[0], m[3], m[6],
            m[1], m[4], m[7],
            m[2], m[5], m[8],
        ])
    }

    pub fn det(&self) -> f64 {
        let m = &self.0;
        m[0] * (m[4] * m[8] - m[5] * m[7])
            - m[1] * (m[3] * m[8] - m[5] * m[6])
            + m[2] * (m[3] * m[7] - m[4] * m[6])
    }
}

impl Mul<&Vec3> for &Mat33 {
    type Output = Vec3;

    fn mul(self, rhs: &Vec3) -> Self::Output {
        let m = &self.0;
        Vec3(
            m[0] * rhs.0 + m[1] * rhs.1 + m[2] * rhs.2,
            m[3] * rhs.0 + m[4] * rhs.1 + m[5] * rhs.2,
            m[6] * rhs.0 + m[7] * rhs.1 + m[8] * rhs.2,
        )
    }
}

/// Unit quaternion (w, x, y, z)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl Quaternion {
    pub const fn identity() -> Self {
        Self { w: 1., x: 0., y: 0., z: 0. }
    }

    /// Convert a rotation matrix (assumed orthonormal, det = +1)
    pub fn from_rotation(r: &Mat33) -> Self {
        let trace = r.get(0, 0) + r.get(1, 1) + r.get(2, 2);
        // Branch on the largest diagonal term to keep the square root well-conditioned
        let q = if trace > 0. {
            let s = (trace + 1.).sqrt() * 2.;
            Self {
                w: 0.25 * s,
                x: (r.get(2, 1) - r.get(1, 2)) / s,
                y: (r.get(0, 2) - r.get(2, 0)) / s,
                z: (r.get(1, 0) - r.get(0, 1)) / s,
            }
        } else if r.get(0, 0) > r.get(1, 1) && r.get(0, 0) > r.get(2, 2) {
            let s = (1. + r.get(0, 0) - r.get(1, 1) - r.get(2, 2)).sqrt() * 2.;
            Self {
                w: (r.get(2, 1) - r.get(1, 2)) / s,
                x: 0.25 * s,
                y: (r.get(0, 1) + r.get(1, 0)) / s,
                z: (r.get(0, 2) + r.get(2, 0)) / s,
            }
        } else if r.get(1, 1) > r.get(2, 2) {
            let s = (1. + r.get(1, 1) - r.get(0, 0) - r.get(2, 2)).sqrt() * 2.;
            Self {
                w: (r.get(0, 2) - r.get(2, 0)) / s,
                x: (r.get(0, 1) + r.get(1, 0)) / s,
                y: 0.25 * s,
                z: (r.get(1, 2) + r.get(2, 1)) / s,
            }
        } else {
            let s = (1. + r.get(2, 2) - r.get(0, 0) - r.get(1, 1)).sqrt() * 2.;
            Self {
                w: (r.get(1, 0) - r.get(0, 1)) / s,
                x: (r.get(0, 2) + r.get(2, 0)) / s,
                y: (r.get(1, 2) + r.get(2, 1)) / s,
                z: 0.25 * s,
            }
        };
        q.normalized()
    }

    pub fn norm(&self) -> f64 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn normalized(&self) -> Self {
        let n = self.norm();
        if !(n > f64::EPSILON) {
            return Self::identity();
        }
        Self { w: self.w / n, x: self.x / n, y: self.y / n, z: self.z / n }
    }
}
