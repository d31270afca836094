//! Tool-calling deploy agent.
//!
//! A language model is driven through a multi-turn conversation in which it
//! calls a fixed set of tools (listing, reading and writing files, running
//! shell commands, asking the user, pushing secrets) until the required
//! deployment artifacts exist or the turn budget runs out. The crate keeps a
//! strict separation:
//!
//! - **[`core`]**: Pure logic (conversation log, run state, backoff schedule,
//!   secrets parsing and redaction). No I/O.
//! - **[`io`]**: Side effects (model HTTP client, filesystem and shell tools,
//!   terminal prompt, secret store, config).
//!
//! [`tools`] resolves model calls into typed invocations and dispatches them;
//! [`step`] and [`looping`] drive the conversation.

pub mod console;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
pub mod profile;
pub mod step;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tools;
