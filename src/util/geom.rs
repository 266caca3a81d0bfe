use std::{fmt::Debug, ops::{Add, Sub}};

/// Point in image pixel coordinates
#[derive(Copy, Clone, PartialEq, Default)]
pub struct Point2D([f64; 2]);

impl Debug for Point2D {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Point2D")
            .field(&self.x())
            .field(&self.y())
            .finish()
    }
}

impl Point2D {
    #[inline(always)]
    pub const fn zero() -> Self {
        Self([0., 0.])
    }

    #[inline]
    pub const fn of(x: f64, y: f64) -> Self {
        Self([x, y])
    }

    #[inline(always)]
    pub const fn x(&self) -> f64 {
        self.0[0]
    }

    #[inline(always)]
    pub const fn y(&self) -> f64 {
        self.0[1]
    }

    pub fn distance_to(&self, other: &Point2D) -> f64 {
        let dx = self.x() - other.x();
        let dy = self.y() - other.y();
        dx.hypot(dy)
    }

    /// Point halfway between `self` and `other`
    pub fn midpoint(&self, other: &Point2D) -> Point2D {
        Self::of((self.x() + other.x()) / 2., (self.y() + other.y()) / 2.)
    }

    /// Nearest pixel, if it has non-negative coordinates
    pub fn to_pixel(&self) -> Option<(usize, usize)> {
        let x = self.x().round();
        let y = self.y().round();
        if !(x >= 0. && y >= 0.) {
            return None;
        }
        Some((x as usize, y as usize))
    }

    pub const fn as_array(&self) -> [f64; 2] {
        self.0
    }
}

impl Add<(f64, f64)> for Point2D {
    type Output = Point2D;

    fn add(self, rhs: (f64, f64)) -> Self::Output {
        Self::of(self.x() + rhs.0, self.y() + rhs.1)
    }
}

impl Sub<&Point2D> for &Point2D {
    type Output = (f64, f64);

    fn sub(self, rhs: &Point2D) -> Self::Output {
        (self.x() - rhs.x(), self.y() - rhs.y())
    }
}

impl From<Point2D> for [f64; 2] {
    fn from(value: Point2D) -> Self {
        value.0
    }
}

impl From<[f64; 2]> for Point2D {
    fn from(value: [f64; 2]) -> Self {
        Self(value)
    }
}
