//! Side-effecting code: model calls, tools, processes, config and files.

pub mod config;
pub mod fs_tools;
pub mod model;
pub mod process;
pub mod prompt;
pub mod retry;
pub mod secret_store;
pub mod shell;
pub mod terminal;
pub mod transcript;
pub mod wait;
