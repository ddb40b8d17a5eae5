//! Declarative dotfile state engine.
//!
//! The source directory encodes the desired state of a destination
//! directory (usually `$HOME`) in file names and contents. This crate reads
//! that tree into a [`state::SourceState`], resolves templates and
//! encryption lazily, and reconciles the destination through a pluggable
//! [`system::System`].
//!
//! The public API is organised into layers:
//!
//! - **[`attr`]**, **[`patterns`]**, **[`include`]**: name codec and filters
//! - **[`template`]**, **[`format`]**, **[`encryption`]**: collaborators used while resolving
//! - **[`system`]**, **[`persistent`]**: the execution surface and its decorators
//! - **[`state`]**: reading the source tree and applying it
//! - **[`config`]**, **[`commands`]**: configuration and subcommand orchestration
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod attr;
pub mod cli;
pub mod commands;
pub mod config;
pub mod encryption;
pub mod error;
pub mod exec;
pub mod format;
pub mod include;
pub mod logging;
pub mod patterns;
pub mod persistent;
pub mod platform;
pub mod state;
pub mod system;
pub mod template;
