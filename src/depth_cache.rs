//! Single-slot store for the most recent depth frame
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{convert::ConversionError, frame::DepthFrame, msg::RawImage};

/// Holds the most recently decoded [DepthFrame]
///
/// Frames are decoded before the slot is touched, and the slot only ever
/// swaps one immutable `Arc` for another. A reader holding a frame keeps it
/// alive after it is replaced, and never sees a partially-written frame.
#[derive(Default)]
pub struct DepthCache {
	slot: Mutex<Option<Arc<DepthFrame>>>,
}

impl DepthCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// Decode `raw` and make it the current frame
	///
	/// On failure the current frame is left untouched.
	pub fn update(&self, raw: &RawImage) -> Result<(), ConversionError> {
		let frame = DepthFrame::decode(raw)?;
		self.replace(frame);
		Ok(())
	}

	/// Make an already-decoded frame the current one
	pub fn replace(&self, frame: DepthFrame) -> Option<Arc<DepthFrame>> {
		let frame = Arc::new(frame);
		// The previous frame is released by the caller, outside the lock
		self.slot.lock().replace(frame)
	}

	/// The current frame, or `None` if none was ever decoded
	pub fn read(&self) -> Option<Arc<DepthFrame>> {
		self.slot.lock().clone()
	}

	pub fn is_empty(&self) -> bool {
		self.slot.lock().is_none()
	}
}
