use embedded_hal::spi::{self, ErrorKind};
use thiserror::Error;

use fifo_capture_core::CaptureError;

/// Failures talking to the ArduChip.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    #[error("SPI transfer failed: {0}")]
    Spi(ErrorKind),

    #[error("link check failed: wrote {wrote:#04x}, read back {read:#04x}")]
    LinkCheck { wrote: u8, read: u8 },
}

impl BusError {
    pub fn from_spi<E: spi::Error>(error: E) -> Self {
        BusError::Spi(error.kind())
    }
}

impl From<BusError> for CaptureError {
    fn from(error: BusError) -> Self {
        CaptureError::SourceReadError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_to_source_read_error() {
        let error: CaptureError = BusError::LinkCheck { wrote: 0x55, read: 0xFF }.into();
        assert_eq!(
            error,
            CaptureError::SourceReadError("link check failed: wrote 0x55, read back 0xff".into())
        );

        let error: CaptureError = BusError::from_spi(ErrorKind::Overrun).into();
        assert!(matches!(error, CaptureError::SourceReadError(msg) if msg.starts_with("SPI transfer failed")));
    }
}
