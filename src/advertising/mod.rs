pub mod command;
pub mod encoder;

pub use command::CommandTemplate;
pub use encoder::{encode, EncodeDiagnostic, EncodedPayload};
