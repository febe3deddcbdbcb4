//! Streaming graph/queue ring buffer.
//!
//! Ingests possibly out-of-order segments of fixed-rate samples into constant
//! memory, separates promoted ("graph") data from freshly arrived ("queue")
//! data, records gaps as holes to be patched later, and keeps attached
//! statistics in step with every sample that enters or leaves.

pub mod buffer;
pub mod holes;
mod ring;
pub mod settings;


pub use buffer::{GraphQueueBuffer, Ingest, PatchOutcome};
pub use holes::{Hole, HoleLedger};
pub use settings::{BufferSettings, Capacity, StatisticSpec, MAX_CAPACITY};
