//! Debug helpers
mod timeprofile;

pub use timeprofile::{StampStatistics, TimeProfile, TimeProfileStatistics};
