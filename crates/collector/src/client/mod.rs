//! Engine client — abstract interface plus live and fake implementations.

pub mod engine;
pub mod error;
pub mod fake;
pub mod live;

pub use engine::{ContainerEvent, ContainerSummary, EngineOps, EventActor, LogReader};
pub use error::EngineError;
pub use fake::FakeEngine;
pub use live::EngineClient;
