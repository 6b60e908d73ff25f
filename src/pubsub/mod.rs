pub mod auth;
pub mod publisher;
pub mod push;

pub use publisher::Publisher;
pub use push::{PushEnvelope, TriggerError, TriggerPayload, decode_offset};
