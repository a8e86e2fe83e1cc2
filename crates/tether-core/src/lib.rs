pub mod config;
pub mod logging;

pub mod clock;
pub mod connectivity;
pub mod errors;
pub mod retry;
pub mod store;
pub mod transport;
