//! ArduCAM FIFO capture source.
//!
//! Drives the ArduChip capture FIFO over an `embedded-hal` SPI device and
//! exposes it as a [`ChunkedSource`]: trigger a capture, poll the done flag,
//! read the length registers, then drain the FIFO in burst reads.

use std::thread;
use std::time::Duration;

use embedded_hal::spi::{Operation, SpiDevice};

use fifo_capture_core::{check_length, CaptureError, ChunkedSource};

use crate::error::BusError;
use crate::registers::*;

/// ArduCAM camera FIFO.
///
/// Owns its SPI device handle. With a [`SharedDevice`](crate::SharedDevice)
/// the bus is claimed per register access and per burst read, never across
/// a whole capture.
pub struct ArducamFifo<D> {
    spi: D,
    remaining: u32,
}

impl<D: SpiDevice> ArducamFifo<D> {
    pub fn new(spi: D) -> Self {
        Self { spi, remaining: 0 }
    }

    /// Pulse the CPLD reset line, waiting `settle` after each edge.
    pub fn reset(&mut self, settle: Duration) -> Result<(), BusError> {
        self.write_reg(ARDUCHIP_RESET, CPLD_RESET_MASK)?;
        thread::sleep(settle);
        self.write_reg(ARDUCHIP_RESET, 0x00)?;
        thread::sleep(settle);
        Ok(())
    }

    /// Check the SPI link by writing the test register and reading it back.
    pub fn check_link(&mut self) -> Result<(), BusError> {
        self.write_reg(ARDUCHIP_TEST1, TEST_PATTERN)?;
        let read = self.read_reg(ARDUCHIP_TEST1)?;
        if read != TEST_PATTERN {
            log::error!("ArduChip link check failed: read back {:#04x}", read);
            return Err(BusError::LinkCheck {
                wrote: TEST_PATTERN,
                read,
            });
        }
        log::info!("ArduChip link check passed");
        Ok(())
    }

    pub fn write_reg(&mut self, addr: u8, value: u8) -> Result<(), BusError> {
        self.spi
            .write(&[addr | WRITE_FLAG, value])
            .map_err(BusError::from_spi)
    }

    pub fn read_reg(&mut self, addr: u8) -> Result<u8, BusError> {
        let mut value = [0u8];
        self.spi
            .transaction(&mut [
                Operation::Write(&[addr & !WRITE_FLAG]),
                Operation::Read(&mut value),
            ])
            .map_err(BusError::from_spi)?;
        Ok(value[0])
    }

    /// Bytes the camera wrote into the FIFO for the last capture.
    pub fn fifo_length(&mut self) -> Result<u32, BusError> {
        let low = u32::from(self.read_reg(FIFO_SIZE1)?);
        let mid = u32::from(self.read_reg(FIFO_SIZE2)?);
        let high = u32::from(self.read_reg(FIFO_SIZE3)? & FIFO_SIZE3_MASK);
        Ok((high << 16) | (mid << 8) | low)
    }

    pub fn capture_done(&mut self) -> Result<bool, BusError> {
        Ok(self.read_reg(ARDUCHIP_TRIG)? & CAP_DONE_MASK != 0)
    }

    /// Bytes left to drain in the current capture.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn into_inner(self) -> D {
        self.spi
    }
}

impl<D: SpiDevice + Send> ChunkedSource for ArducamFifo<D> {
    fn trigger(&mut self) -> Result<(), CaptureError> {
        self.remaining = 0;
        // Flush the FIFO and clear the done flag before starting.
        self.write_reg(ARDUCHIP_FIFO, FIFO_CLEAR_MASK)?;
        self.write_reg(ARDUCHIP_FIFO, FIFO_START_MASK)?;
        log::debug!("ArduChip capture started");
        Ok(())
    }

    fn poll_ready(&mut self) -> Result<bool, CaptureError> {
        Ok(self.capture_done()?)
    }

    fn prepare(&mut self, max_length: u32) -> Result<u32, CaptureError> {
        let length = self.fifo_length()?;
        let length = check_length(length, max_length.min(MAX_FIFO_SIZE - 1))?;
        self.remaining = length;
        log::debug!("ArduChip FIFO holds {} bytes", length);
        Ok(length)
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError> {
        let n = buf.len().min(self.remaining as usize);
        if n == 0 {
            return Ok(0);
        }
        self.spi
            .transaction(&mut [
                Operation::Write(&[BURST_FIFO_READ]),
                Operation::Read(&mut buf[..n]),
            ])
            .map_err(BusError::from_spi)?;
        self.remaining -= n as u32;
        Ok(n)
    }

    fn release(&mut self) {
        self.remaining = 0;
        if let Err(e) = self.write_reg(ARDUCHIP_FIFO, FIFO_CLEAR_MASK) {
            log::warn!("failed to clear ArduChip FIFO flag: {}", e);
        }
    }
}
