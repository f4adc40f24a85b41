pub mod chat_stream;
pub mod config;
pub mod constants;
pub mod frame;
pub mod message;
pub mod prompts;
pub mod session;
pub mod usage;
