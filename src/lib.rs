//! Server-side proxy for the classroom genie site.
//!
//! Accepts text and image generation requests from the browser, attaches the
//! provider API key kept on the server, and relays the provider's response.

pub mod ai;
pub mod error;
pub mod models;
pub mod payload;
pub mod relay;
pub mod server;

pub use error::{Error, Result};
