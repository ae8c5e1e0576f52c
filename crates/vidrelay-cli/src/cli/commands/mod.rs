//! CLI command handlers, one per file.

mod forget;
mod probe;
mod progress;
mod run;
mod status;

pub use forget::run_forget;
pub use probe::run_probe;
pub use run::{run_batch, RunArgs};
pub use status::run_status;
