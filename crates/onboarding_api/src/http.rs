mod error;
mod handlers;
mod server;

pub use error::*;
pub use handlers::*;
pub use server::*;
