//! webblog HTTP server: auth gate, routes and CLI configuration

pub mod config;
pub mod gate;
pub mod handlers;
pub mod response;
pub mod server;

pub use gate::{current_principal, AuthGate, AuthenticatedPrincipal, GateOutcome};
pub use handlers::{handle_request, AppState};
pub use server::WebblogServer;
