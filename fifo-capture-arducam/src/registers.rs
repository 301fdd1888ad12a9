//! ArduChip register map (OV2640 Mini 2MP Plus).

/// Scratch register used for the link check.
pub const ARDUCHIP_TEST1: u8 = 0x00;
/// Value written to and read back from `ARDUCHIP_TEST1` by the link check.
pub const TEST_PATTERN: u8 = 0x55;

pub const ARDUCHIP_FIFO: u8 = 0x04;
/// Clears the capture-done flag and resets the FIFO write pointer.
pub const FIFO_CLEAR_MASK: u8 = 0x01;
pub const FIFO_START_MASK: u8 = 0x02;

pub const ARDUCHIP_RESET: u8 = 0x07;
pub const CPLD_RESET_MASK: u8 = 0x80;

pub const ARDUCHIP_TRIG: u8 = 0x41;
pub const CAP_DONE_MASK: u8 = 0x08;

/// FIFO length, little-endian across three registers.
pub const FIFO_SIZE1: u8 = 0x42;
pub const FIFO_SIZE2: u8 = 0x43;
pub const FIFO_SIZE3: u8 = 0x44;
/// Only the low 7 bits of `FIFO_SIZE3` are length bits.
pub const FIFO_SIZE3_MASK: u8 = 0x7F;

pub const BURST_FIFO_READ: u8 = 0x3C;

/// Set on the address byte of a register write.
pub const WRITE_FLAG: u8 = 0x80;

/// FIFO capacity. The length registers read full scale on overflow, so a
/// valid capture is strictly shorter.
pub const MAX_FIFO_SIZE: u32 = 0x5FFFF;
