//! Authentication domain module.
//!
//! - `model`: credentials, auth responses and JWT claims
//! - `session`: the live session and the controller's state machine

mod model;
mod session;

pub use model::{AuthResponse, Credentials, TokenClaims, User};
pub use session::{Session, SessionState};
