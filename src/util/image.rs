use std::ops::{Index, IndexMut};

use super::geom::Point2D;

/// Row-major image with an explicit stride (in pixels)
#[derive(Clone, Debug, PartialEq)]
pub struct Image<T = u8> {
    pub width: usize,
    pub height: usize,
    pub stride: usize,
    pub buf: Box<[T]>,
}

/// 8-bit grayscale image
pub type ImageY8 = Image<u8>;
/// 8-bit RGB image
pub type ImageRGB8 = Image<[u8; 3]>;
/// Depth map in meters (`NaN` where unknown)
pub type ImageDepth = Image<f32>;

impl<T: Copy + Default> Image<T> {
    /// Image filled with `T::default()`
    pub fn zeroed(width: usize, height: usize) -> Self {
        Self::filled(width, height, T::default())
    }
}

impl<T: Copy> Image<T> {
    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            stride: width,
            buf: vec![value; width * height].into_boxed_slice(),
        }
    }

    /// Wrap a packed (stride = width) buffer
    ///
    /// Returns `None` if `data` doesn't hold exactly `width * height` pixels.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Option<Self> {
        if data.len() != width * height {
            return None;
        }
        Some(Self {
            width,
            height,
            stride: width,
            buf: data.into_boxed_slice(),
        })
    }

    /// Apply `update` to every pixel, producing a packed image
    pub fn map<R: Copy>(&self, update: impl Fn(&T) -> R) -> Image<R> {
        let mut buf = Vec::with_capacity(self.width * self.height);
        for row in self.rows() {
            buf.extend(row.iter().map(&update));
        }
        Image {
            width: self.width,
            height: self.height,
            stride: self.width,
            buf: buf.into_boxed_slice(),
        }
    }

    /// Set a single pixel, silently ignoring out-of-bounds coordinates
    #[inline]
    pub fn put(&mut self, x: isize, y: isize, value: T) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= self.width || y >= self.height {
            return;
        }
        self.buf[y * self.stride + x] = value;
    }

    /// Draw a line from `p0` to `p1`, `width` pixels thick
    pub fn draw_line(&mut self, p0: Point2D, p1: Point2D, color: &T, width: usize) {
        // Only the part that can touch the image is sampled
        let pad = width.max(1) as f64;
        let lo = (-pad, -pad);
        let hi = (self.width as f64 - 1. + pad, self.height as f64 - 1. + pad);
        let Some((p0, p1)) = clip_segment(p0, p1, lo, hi) else {
            return;
        };

        let dist = p0.distance_to(&p1);
        // Two samples per pixel of length
        let num_steps = f64::ceil(dist * 2.).max(1.) as usize;
        let half = (width.max(1) as isize - 1) / 2;
        let extra = (width.max(1) as isize - 1) - half;

        for i in 0..=num_steps {
            let f = (i as f64) / (num_steps as f64);
            let x = (p0.x() + (p1.x() - p0.x()) * f).round();
            let y = (p0.y() + (p1.y() - p0.y()) * f).round();
            if !x.is_finite() || !y.is_finite() {
                return;
            }
            let (x, y) = (x as isize, y as isize);

            for dy in -half..=extra {
                for dx in -half..=extra {
                    self.put(x + dx, y + dy, *color);
                }
            }
        }
    }
}

impl<T> Image<T> {
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.buf.get(y * self.stride + x)
    }

    /// Row slices, without stride padding
    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        let width = self.width;
        let stride = self.stride.max(1);
        self.buf
            .chunks(stride)
            .take(self.height)
            .map(move |row| &row[..width])
    }
}

impl<T> Index<(usize, usize)> for Image<T> {
    type Output = T;

    fn index(&self, index: (usize, usize)) -> &Self::Output {
        let (x, y) = index;

        assert!(x < self.width);
        assert!(y < self.height);

        &self.buf[x + (y * self.stride)]
    }
}

impl<T> IndexMut<(usize, usize)> for Image<T> {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut Self::Output {
        let (x, y) = index;

        assert!(x < self.width);
        assert!(y < self.height);

        &mut self.buf[x + (y * self.stride)]
    }
}

impl ImageRGB8 {
    /// Integer luma approximation (BT.601 weights, scaled by 256)
    pub fn to_gray(&self) -> ImageY8 {
        self.map(|&[r, g, b]| {
            ((r as u32 * 77 + g as u32 * 150 + b as u32 * 29) >> 8) as u8
        })
    }
}

/// Clip the segment `p0`-`p1` to the box `lo..=hi` (Liang-Barsky)
///
/// Returns `None` if no part of the segment is inside.
fn clip_segment(p0: Point2D, p1: Point2D, lo: (f64, f64), hi: (f64, f64)) -> Option<(Point2D, Point2D)> {
    let dx = p1.x() - p0.x();
    let dy = p1.y() - p0.y();
    let mut t0 = 0f64;
    let mut t1 = 1f64;
    for (p, q) in [
        (-dx, p0.x() - lo.0),
        (dx, hi.0 - p0.x()),
        (-dy, p0.y() - lo.1),
        (dy, hi.1 - p0.y()),
    ] {
        if p == 0. {
            // Parallel to this edge
            if q < 0. {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0. {
                if r > t1 {
                    return None;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return None;
                }
                t1 = t1.min(r);
            }
        }
    }
    Some((
        Point2D::of(p0.x() + t0 * dx, p0.y() + t0 * dy),
        Point2D::of(p0.x() + t1 * dx, p0.y() + t1 * dy),
    ))
}
