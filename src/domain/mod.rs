mod dashboard;
mod error;
mod log_store;
mod session;
mod types;
mod validator;

pub use dashboard::*;
pub use error::*;
pub use log_store::*;
pub use session::*;
pub use types::*;
pub use validator::*;
