//! Depth-fused AprilTag detection over two independent image streams
//!
//! Color frames (with camera info) and registered depth frames arrive on
//! their own callbacks. The [DetectionCoordinator] keeps the newest depth
//! frame, runs the tag detector on each color frame when anyone wants the
//! output, and publishes the detected tags with poses.

pub mod convert;
pub mod coordinator;
mod dbg;
mod depth_cache;
pub mod detector;
mod engine;
pub mod frame;
pub mod msg;
pub mod node;
pub mod params;
pub mod publish;
pub mod util;

pub use coordinator::{CycleOutcome, Demand, DetectionCoordinator};
pub use dbg::{StampStatistics, TimeProfile, TimeProfileStatistics};
pub use depth_cache::DepthCache;
pub use engine::{Engine, EngineBuilder};
pub use node::{DepthDetectorNode, NodeOptions};
pub use params::{ConfigError, ParamValue, ParameterSource, ParameterStore};
