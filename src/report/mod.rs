pub mod writer;

pub use writer::{format_command_listing, format_packet, save_report};
