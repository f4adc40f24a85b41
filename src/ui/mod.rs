//! Terminal UI layer for interactive chat sessions.
//!
//! - [`chat_loop`]: application state, key handling and the main loop that
//!   drains stream events from [`crate::core::chat_stream`].
//! - [`renderer`]: frame composition for the chat and settings views.
//! - [`markdown`]: incremental markdown rendering into styled lines.
//! - [`picker`] and [`theme`]: selection lists and color policy.
//!
//! This layer presents and captures interaction state; [`crate::core`] owns
//! the conversation and backend coordination.

pub mod chat_loop;
pub mod markdown;
pub mod picker;
pub mod renderer;
pub mod theme;
