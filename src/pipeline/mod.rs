//! Triage-and-action pipeline.
//!
//! Every fetched email flows through:
//! 1. `Classifier::classify()` — LLM verdict (category, should-act, URL)
//! 2. `policy::decide()` — pure act/skip rule
//! 3. `ActionExecutor::execute()` — one application attempt
//! 4. `NotificationDispatcher::notify()` — WhatsApp summary after success
//!
//! `CycleOrchestrator` drives a batch in order; `CycleRunner` adds config
//! loading and mailbox fetch around it.

pub mod classifier;
pub mod dispatcher;
pub mod executor;
pub mod orchestrator;
pub mod policy;
pub mod runner;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use classifier::Classifier;
pub use dispatcher::NotificationDispatcher;
pub use executor::ActionExecutor;
pub use orchestrator::CycleOrchestrator;
pub use runner::CycleRunner;
pub use types::*;
