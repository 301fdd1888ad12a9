pub mod capture_delegate;
pub mod chunk_sink;
pub mod chunked_source;
pub mod config_provider;
pub mod scheduler;
