mod config;
mod logging;
mod remote;

pub use config::*;
pub use logging::*;
pub use remote::*;
