use colored::Colorize;
use std::io::{self, Write};
use todo_application::TodoContext;
use todo_core::Result;

pub const PASSWORD_ENV: &str = "TODO_PASSWORD";

pub async fn register(ctx: &TodoContext, email: &str, password: Option<String>) -> Result<()> {
    let password = read_password(password)?;
    let session = ctx.session().register(email, &password).await?;
    println!("{} {}", "Registered and signed in as".green(), session.email.bold());
    Ok(())
}

pub async fn login(ctx: &TodoContext, email: &str, password: Option<String>) -> Result<()> {
    let password = read_password(password)?;
    let session = ctx.session().login(email, &password).await?;
    println!("{} {}", "Signed in as".green(), session.email.bold());
    Ok(())
}

pub async fn logout(ctx: &TodoContext) -> Result<()> {
    ctx.session().logout().await;
    Ok(())
}

pub fn whoami(ctx: &TodoContext) -> Result<()> {
    match ctx.session().session() {
        Some(session) => println!("{} ({})", session.email.bold(), session.user_id.dimmed()),
        None => println!("{}", "Not signed in".dimmed()),
    }
    Ok(())
}

/// Flag, then `TODO_PASSWORD`, then an interactive prompt.
fn read_password(flag: Option<String>) -> Result<String> {
    if let Some(password) = flag.or_else(|| std::env::var(PASSWORD_ENV).ok()) {
        return Ok(password);
    }

    eprint!("Password: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
