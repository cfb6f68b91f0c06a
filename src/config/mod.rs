mod server;

pub use server::{JWT_SECRET_ENV, ServerConfig};
