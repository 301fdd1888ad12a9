pub mod double_buffer;
pub mod marker_framer;
