pub mod atomic_writer;
pub mod medium;
pub mod metadata;
pub mod wire_sink;
