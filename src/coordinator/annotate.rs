use crate::{convert::encode_rgb8, frame::ColorFrame, msg::{AnnotatedImage, DetectionSet}, util::ImageRGB8};

/// Outline color for each edge, starting at the edge from corner 0 to 1
const EDGE_COLORS: [[u8; 3]; 4] = [
	[0, 255, 0],
	[0, 0, 255],
	[255, 0, 255],
	[255, 0, 0],
];
const CENTER_COLOR: [u8; 3] = [255, 255, 0];
const LINE_WIDTH: usize = 2;
const CROSS_HALF: f64 = 4.;

/// Draw outlines for `detections` onto `image`
pub(super) fn draw_detections(image: &mut ImageRGB8, detections: &DetectionSet) {
	for det in detections.detections.iter() {
		for (i, color) in EDGE_COLORS.iter().enumerate() {
			let p0 = det.corners[i];
			let p1 = det.corners[(i + 1) % 4];
			image.draw_line(p0, p1, color, LINE_WIDTH);
		}

		let c = det.center;
		image.draw_line(c + (-CROSS_HALF, 0.), c + (CROSS_HALF, 0.), &CENTER_COLOR, 1);
		image.draw_line(c + (0., -CROSS_HALF), c + (0., CROSS_HALF), &CENTER_COLOR, 1);
	}
}

/// Copy of the color frame with the detections drawn on it
pub(super) fn render(color: &ColorFrame, detections: &DetectionSet) -> AnnotatedImage {
	let mut image = color.image.clone();
	draw_detections(&mut image, detections);
	encode_rgb8(&image, color.header.clone())
}
