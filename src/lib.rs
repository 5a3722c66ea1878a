pub mod app;
pub mod auth;
pub mod config;
pub mod schema;
pub mod state;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod users;
