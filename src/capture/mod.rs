pub mod replay;
pub mod store;

pub use replay::{replay, ReplayError, SystemRunner};
pub use store::{lock_store, CaptureStore, SharedStore};
