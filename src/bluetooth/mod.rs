pub mod scanner;

pub use scanner::capture_advertisements;
