//! # fifo-capture-core
//!
//! Platform-agnostic capture-to-storage core library.
//!
//! Drains a hardware capture buffer in bounded chunks through a double
//! buffer into a sink, and commits file output atomically so a failed or
//! interrupted capture never leaves a partial file behind. Hardware backends
//! (the ArduCAM SPI FIFO) implement the `ChunkedSource` trait and plug into
//! the generic `CapturePipeline`.
//!
//! ## Architecture
//!
//! ```text
//! fifo-capture-core (this crate)
//! ├── traits/       ← ChunkedSource, ChunkSink, CaptureDelegate, ConfigProvider, Scheduler
//! ├── models/       ← CaptureError, TransferOutcome, PipelineState, CaptureConfig, CaptureReport
//! ├── processing/   ← DoubleBuffer, MarkerFramer
//! ├── session/      ← CapturePipeline (generic orchestrator)
//! ├── sources/      ← MemorySource (replay of a stored image)
//! └── storage/      ← AtomicFileWriter, WireStreamSink, metadata sidecar, StorageMedium
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod sources;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::capture_report::CaptureReport;
pub use models::config::{CaptureConfig, FrameMarkers};
pub use models::error::CaptureError;
pub use models::outcome::TransferOutcome;
pub use models::state::PipelineState;
pub use processing::double_buffer::DoubleBuffer;
pub use processing::marker_framer::MarkerFramer;
pub use session::pipeline::{CapturePipeline, CaptureSession};
pub use sources::memory::MemorySource;
pub use storage::atomic_writer::{AtomicFileSink, AtomicFileWriter};
pub use storage::medium::{LocalStorage, StorageMedium};
pub use storage::wire_sink::WireStreamSink;
pub use traits::capture_delegate::{CaptureDelegate, LogDelegate};
pub use traits::chunk_sink::{CallbackSink, ChunkSink, SinkControl};
pub use traits::chunked_source::{check_length, ChunkedSource};
pub use traits::config_provider::{ConfigProvider, SharedConfig};
pub use traits::scheduler::{Scheduler, ThreadScheduler};
