pub mod error;
pub mod models;
pub mod server;
pub mod services;
pub mod state;

pub use server::{router, serve};
pub use state::AppState;
