//! xon-core: Foundation types for the EEG streaming demos
//!
//! Error type, stream metadata, chunk container and the traits that stand in
//! for the external acquisition library and the vehicle engine.

pub mod error;
pub mod stream;
pub mod discovery;
pub mod vehicle;

pub use error::{XonError, XonResult};
pub use stream::{Chunk, StreamInfo, StreamInlet, StreamResolver};
pub use discovery::{list_streams, resolve_stream, DEFAULT_RESOLVE_ATTEMPTS, EEG_STREAM_TYPE};
pub use vehicle::{Vehicle, VehicleAddress};
