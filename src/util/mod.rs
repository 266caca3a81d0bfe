pub(crate) mod geom;
pub mod image;
pub(crate) mod math;
pub(crate) mod throttle;

pub use self::image::{Image, ImageDepth, ImageRGB8, ImageY8};
pub use self::geom::Point2D;
pub use self::math::{Mat33, Quaternion, Vec3};
