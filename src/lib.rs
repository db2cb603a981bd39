//! Opportunity agent — reads an inbox, applies to scholarships and jobs,
//! and reports back over WhatsApp.

pub mod actors;
pub mod channels;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod scheduler;
pub mod server;
pub mod service;

pub use error::{Error, Result};
