//! CLI command handlers, one file per subcommand.

mod cancel;
mod clear;
mod errors;
mod probe;
mod queue;
mod status;
mod sweep;

pub use cancel::run_cancel;
pub use clear::run_clear;
pub use errors::run_errors;
pub use probe::run_probe;
pub use queue::run_queue;
pub use status::run_status;
pub use sweep::run_sweep;
