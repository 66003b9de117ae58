//! External tool abstractions
//!
//! Trait-based wrappers around the vendor CLI so the workflows can be tested
//! against scripted devices. Pure decision logic lives in `workflows`; this
//! module only runs commands and parses what they print.

pub mod azsphere;
pub mod command;

pub use azsphere::AzSphereCli;
pub use command::{CommandError, CommandExecutor, CommandOutput, ProcessCommandExecutor};
