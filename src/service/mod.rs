//! Service layer: stateless command evaluation.

pub mod command_processor;

pub use command_processor::{CommandProcessor, CommandRequest, CommandResponse, Operation};
