use colored::Colorize;
use todo_core::{Navigator, Route};

/// Tells the user where a session transition left them.
pub struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, route: Route) {
        match route {
            Route::SignIn => eprintln!("{}", "Signed out. Run `todo login <email>` to sign in.".dimmed()),
            Route::Dashboard => tracing::debug!("Navigated to {}", route),
        }
    }
}
