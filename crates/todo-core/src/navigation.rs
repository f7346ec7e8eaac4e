//! Navigation targets and the seam the front end implements.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// Views the session lifecycle can send the user to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
pub enum Route {
    #[strum(serialize = "/signin")]
    SignIn,
    #[strum(serialize = "/dashboard")]
    Dashboard,
}

/// Receives navigation requests from the session controller.
///
/// A web front end would push a history entry; the CLI prints the view it
/// lands on. Implementations must not block.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Navigator that ignores every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, route: Route) {
        tracing::trace!("[NoopNavigator] Ignoring navigation to {}", route);
    }
}
