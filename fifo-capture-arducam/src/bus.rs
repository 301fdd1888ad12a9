//! SPI bus shared between several chip-select lines.
//!
//! The camera shares its bus with the SD card and the display. Each
//! [`SharedDevice`] locks the bus and drives its own chip select for the
//! span of one transaction only, so a long FIFO drain never holds the bus
//! between chunks.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use embedded_hal::digital::OutputPin;
use embedded_hal::spi::{self, ErrorKind, Operation, SpiBus, SpiDevice};
use parking_lot::Mutex;

/// Owner of the raw bus. Clone it to hand the same bus to other drivers.
pub struct SharedBus<B> {
    bus: Arc<Mutex<B>>,
}

impl<B> Clone for SharedBus<B> {
    fn clone(&self) -> Self {
        Self {
            bus: Arc::clone(&self.bus),
        }
    }
}

impl<B: SpiBus> SharedBus<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus: Arc::new(Mutex::new(bus)),
        }
    }

    /// A device on this bus selected by `cs`. The line is driven high (deselected) first.
    pub fn device<CS: OutputPin>(&self, mut cs: CS) -> Result<SharedDevice<B, CS>, CS::Error> {
        cs.set_high()?;
        Ok(SharedDevice {
            bus: Arc::clone(&self.bus),
            cs,
        })
    }
}

/// Error of a [`SharedDevice`] transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError<BUS, CS> {
    Spi(BUS),
    Cs(CS),
}

impl<BUS: spi::Error, CS: core::fmt::Debug> spi::Error for DeviceError<BUS, CS> {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Spi(e) => e.kind(),
            Self::Cs(_) => ErrorKind::ChipSelectFault,
        }
    }
}

/// One chip select on a [`SharedBus`].
pub struct SharedDevice<B, CS> {
    bus: Arc<Mutex<B>>,
    cs: CS,
}

impl<B: SpiBus, CS: OutputPin> spi::ErrorType for SharedDevice<B, CS> {
    type Error = DeviceError<B::Error, CS::Error>;
}

impl<B: SpiBus, CS: OutputPin> SpiDevice for SharedDevice<B, CS> {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        let mut bus = self.bus.lock();
        self.cs.set_low().map_err(DeviceError::Cs)?;

        let result = run_operations(&mut *bus, operations);
        // Deselect even when the transfer failed.
        let flushed = bus.flush();
        let deselected = self.cs.set_high();

        result.map_err(DeviceError::Spi)?;
        flushed.map_err(DeviceError::Spi)?;
        deselected.map_err(DeviceError::Cs)
    }
}

fn run_operations<B: SpiBus>(bus: &mut B, operations: &mut [Operation<'_, u8>]) -> Result<(), B::Error> {
    for operation in operations {
        match operation {
            Operation::Read(buf) => bus.read(buf)?,
            Operation::Write(buf) => bus.write(buf)?,
            Operation::Transfer(read, write) => bus.transfer(read, write)?,
            Operation::TransferInPlace(buf) => bus.transfer_in_place(buf)?,
            Operation::DelayNs(ns) => {
                bus.flush()?;
                thread::sleep(Duration::from_nanos(u64::from(*ns)));
            }
        }
    }
    Ok(())
}
