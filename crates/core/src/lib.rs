pub mod error;
pub mod event;
pub mod state;
pub mod window;

pub use error::{HeliError, Result};
pub use event::{Command, Packet, PromotionMode, Update};
pub use state::{
    HoleWindow, PatchPolicy, PromotedRange, Sample, Segment, StatKind, StatScope,
    StatisticsSnapshot, StreamId,
};
pub use window::{Prefix, SampleWindow};
