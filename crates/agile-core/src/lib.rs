//! Core of `agile`: routes operator commands to prompt templates and keeps
//! the registry of the artifacts they produce.
//!
//! ```text
//! operator ─▶ CommandRegistry::resolve ─▶ ArgumentBinder::bind ─▶ Dispatcher
//!                                                                   │
//!                                             Collaborator::invoke ◀┘
//!                                                                   │
//!                              SharedRegistry::upsert ─▶ SearchIndex::rebuild
//! ```

pub mod binder;
pub mod command;
pub mod command_registry;
pub mod config;
pub mod dispatcher;
pub mod document;
pub mod error;
pub mod io;
pub mod paths;
pub mod registry;
pub mod search;
pub mod workflow;

pub use error::{AgileError, Result};
