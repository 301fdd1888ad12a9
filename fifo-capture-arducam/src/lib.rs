//! # fifo-capture-arducam
//!
//! ArduCAM camera backend for fifo-capture.
//!
//! Provides:
//! - `ArducamFifo`: the ArduChip capture FIFO as a `ChunkedSource`
//! - `SharedBus` / `SharedDevice`: one SPI bus shared by several chip selects
//! - `registers`: the ArduChip register map
//!
//! ## Hardware Requirements
//! - ArduCAM Mini 2MP Plus (OV2640) or a compatible ArduChip FIFO board
//! - An `embedded-hal` 1.0 `SpiBus` and an `OutputPin` for the camera chip select
//!
//! ## Usage
//! ```ignore
//! use fifo_capture_arducam::{ArducamFifo, SharedBus};
//! use fifo_capture_core::{CaptureConfig, CapturePipeline, LocalStorage};
//!
//! let bus = SharedBus::new(spi);
//! let mut camera = ArducamFifo::new(bus.device(camera_cs)?);
//! camera.check_link()?;
//! let pipeline = CapturePipeline::new(camera, LocalStorage, CaptureConfig::default());
//! let outcome = pipeline.capture_to_file("/sd/IMG_0001.jpg", None);
//! ```

pub mod bus;
pub mod error;
pub mod fifo;
pub mod registers;

pub use bus::{DeviceError, SharedBus, SharedDevice};
pub use error::BusError;
pub use fifo::ArducamFifo;
