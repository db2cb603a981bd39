//! Application actors: how an application is actually submitted.

pub mod dry_run;
pub mod http;

pub use dry_run::DryRunActor;
pub use http::HttpApplicationActor;
