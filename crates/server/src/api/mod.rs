pub mod channels;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod settings;
pub mod sync;
pub mod ws;

pub use commands::Command;
pub use error::ApiError;
pub use routes::create_router;
