//! chatstream is a terminal chat client for a backend that streams replies
//! as plain text interleaved with `__METADATA__:` usage frames.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns frame decoding, the streaming client, per-session state,
//!   configuration and the prompt library.
//! - [`ui`] renders the terminal interface, including incremental markdown,
//!   and runs the interactive event loop.
//! - [`api`] defines the wire payloads for chat, models and prompts.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`], which dispatches into [`ui::chat_loop`] for
//! interactive sessions and into plain subcommands otherwise.

pub mod api;
pub mod cli;
pub mod core;
pub mod ui;
pub mod utils;
