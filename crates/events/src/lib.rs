pub mod messages;

pub use messages::{EngineEvent, Severity};
