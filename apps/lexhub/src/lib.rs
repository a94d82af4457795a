//! # lexhub
//!
//! The LexHub application: everything async or user-facing that sits on top
//! of the synchronous `lexhub-core` hub.
//!
//! - [`context`]: permission-scoped, preference-shaped module data
//! - [`adapters`]: per-module response shapes over the context provider
//! - [`api`]: axum HTTP server
//! - [`cli`]: clap command line
//! - [`config`]: `lexhub.toml` and `LEXHUB_*` overrides
//! - [`events`]: broadcast bus for hub events

pub mod adapters;
pub mod api;
pub mod cli;
pub mod config;
pub mod context;
pub mod events;
