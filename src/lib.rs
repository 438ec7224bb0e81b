//! Chorus is a terminal-first playground for comparing remote LLM providers
//! side by side: several chat panels stream answers to a shared (or
//! per-panel) prompt at the same time.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns runtime state: the panel workspace, per-panel session
//!   lifecycles, the shared generation settings, the model catalog, and the
//!   stream client that talks to the relay endpoint.
//! - [`server`] implements the relay endpoint (`POST /api/chat`) that
//!   validates requests and forwards them to a hosted generation backend,
//!   streaming message-part events back to the caller.
//! - [`ui`] renders the terminal interface: the message-part renderer,
//!   markdown handling, and the interactive multi-panel event loop.
//! - [`api`] defines the wire payloads: the endpoint request body, the
//!   stream-event envelope, and the upstream provider protocol.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::run`], which dispatches into [`ui::chat_loop`] for
//! interactive sessions and [`server`] for the relay service.

pub mod api;
pub mod cli;
pub mod core;
pub mod server;
pub mod ui;
pub mod utils;
