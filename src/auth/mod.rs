//! Authentication against the marketplace backend
//!
//! Email/password login yields a bearer token that authenticates both the
//! REST calls and the realtime channel.

pub mod tokens;

use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};

use crate::api::{self, ApiClient};
use crate::config::Config;

pub use tokens::StoredSession;

/// Log in and store the session
pub async fn login(email: Option<String>, password: Option<String>, force: bool) -> Result<()> {
    let mut config = Config::load()?;

    if !force {
        if let Some(session) = config.active_session() {
            println!(
                "Already logged in as {} ({}). Use --force to log in again.",
                session.user.name,
                session.user.role.as_str()
            );
            return Ok(());
        }
    }

    let email = match email {
        Some(e) => e,
        None => prompt("Email: ")?,
    };
    let password = match password.or_else(|| std::env::var("VENUE_CHAT_PASSWORD").ok()) {
        Some(p) => p,
        None => prompt("Password: ")?,
    };
    if email.is_empty() || password.is_empty() {
        bail!("Email and password are required");
    }

    tracing::info!("Logging in as {}...", email);
    let reply = api::client::login(&config.api_base_url, &email, &password)
        .await
        .context("Login failed")?;

    let session = StoredSession::new(reply.token, reply.user);
    println!(
        "Logged in as {} (user {}, {}).",
        session.user.name,
        session.user.id,
        session.user.role.as_str()
    );
    config.set_session(session);
    config.save()?;
    Ok(())
}

/// Invalidate the token server-side (best-effort) and clear it locally
pub async fn logout() -> Result<()> {
    let mut config = Config::load()?;
    let Some(session) = config.session.clone() else {
        println!("Not logged in.");
        return Ok(());
    };

    let client = ApiClient::new(&config.api_base_url, &session.token);
    if let Err(e) = client.logout().await {
        tracing::warn!("Server-side logout failed: {:#}", e);
    }

    config.clear_session();
    config.save()?;
    println!("Logged out.");
    Ok(())
}

/// Display current auth status
pub async fn status() -> Result<()> {
    let config = Config::load()?;

    println!("API:         {}", config.api_base_url);
    match &config.session {
        Some(session) => {
            let state = if session.is_expired() { "expired" } else { "valid" };
            println!("Session:     {}", state);
            println!("  user:      {} (id {})", session.user.name, session.user.id);
            println!("  role:      {}", session.user.role.as_str());
            if let Some(exp) = session.expires_at {
                println!("  expires_at: {}", exp);
            }
        }
        None => {
            println!("Session:     none");
            println!("\nRun 'venue-chat login' to authenticate.");
        }
    }

    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", label)?;
    stdout.flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim().to_string())
}
