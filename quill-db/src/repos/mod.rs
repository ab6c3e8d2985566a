//! Repository modules for database operations

pub mod kv;
pub mod runs;

pub use kv::KvRepository;
pub use runs::{ReviewRun, ReviewRunRepository, RunStatus};
