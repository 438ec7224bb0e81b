pub mod catalog;
pub mod chat_stream;
pub mod config;
pub mod input;
pub mod message;
pub mod panel;
pub mod settings;
pub mod workspace;
