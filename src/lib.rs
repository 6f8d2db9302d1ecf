//! chatgate streams chat completions from several backend wire protocols
//! behind one session-oriented interface.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core::frame`] and [`core::protocol`] turn a chunked response body into
//!   text deltas for the openai, anthropic, and gemini protocols.
//! - [`core::search`] and [`core::tools`] run the optional `web_search`
//!   negotiation and fold the results into the request.
//! - [`core::session`] owns every session's messages and cancellation state,
//!   and [`core::gateway`] drives one turn per call on top of it.
//! - [`api`] defines the wire payloads for each backend.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
