//! # Wire and Snapshot Formats
//!
//! Everything that leaves the process lives here:
//! - [`ports`]: byte-stream endpoints for update distribution
//! - [`updates`]: the JSON update wire format plus the serializer
//!   observer and the deserializing input port
//! - [`persistence`]: whole-graph binary snapshots

pub mod persistence;
pub mod ports;
pub mod updates;

pub use persistence::{SnapshotHeader, graph_from_bytes, graph_to_bytes};
pub use ports::{InputPort, LoopbackBridge, OutputPort};
pub use updates::{SceneUpdate, UpdateDeserializer, UpdateSerializer};
