//! HTTP API over the record store, image cache and origin

pub mod errors;
pub mod handlers;
pub mod protocol;
pub mod server;

pub use errors::ApiError;
pub use protocol::{HostUrl, StudentForm, StudentView};
pub use server::{create_router, ApiServer, AppState};
