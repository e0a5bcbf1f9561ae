//! vigilctl library - CLI definition and handlers, exposed for testing.

pub mod cli;
pub mod commands;
pub mod output;
