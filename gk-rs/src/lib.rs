//! Gatekeeper: a chat bot whose commands are small scripts.
//!
//! - [`script`]: the command language (parser, evaluator, builtins).
//! - [`env`]: the capability interface scripts act through.
//! - [`command`]: extracting a command from a chat line.
//! - [`store`] and [`registry`]: persisting and dispatching commands.

pub mod cli;
pub mod command;
pub mod config;
pub mod env;
pub mod logging;
pub mod registry;
pub mod script;
pub mod store;

pub use registry::{Outcome, Registry};
