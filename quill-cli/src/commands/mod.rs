//! CLI command implementations

mod context;
mod dry_run;
pub mod event;
pub mod review;
pub mod runs;

pub use event::EventArgs;
pub use review::ReviewArgs;
pub use runs::RunsArgs;
