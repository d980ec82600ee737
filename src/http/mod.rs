//! HTTP server, router, handlers, and middleware.

pub mod context;
pub mod handler_authorize;
pub mod handler_callback;
pub mod handler_register;
pub mod handler_session;
pub mod handler_token;
pub mod handler_well_known;
pub mod middleware_auth;
pub mod server;

pub use context::AppContext;
pub use server::build_router;
