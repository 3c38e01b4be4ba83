//! CLI authentication: password login, registration and reset

use anyhow::{bail, Result};
use shared::{
    Ack, AuthResponse, ForgotPasswordRequest, LoginRequest, RegisterRequest,
    ResetPasswordRequest, WhoAmI,
};
use std::io::{self, BufRead, Write};

use crate::api::ApiClient;
use crate::config::Config;

/// Use the flag value, or ask on the terminal
pub fn password_or_prompt(flag: Option<String>, label: &str) -> Result<String> {
    if let Some(password) = flag {
        return Ok(password);
    }
    if let Ok(password) = std::env::var("FILINGS_PASSWORD") {
        return Ok(password);
    }

    print!("{}: ", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("A password is required");
    }
    Ok(password)
}

fn store_session(config: &mut Config, server: &str, email: &str, auth: &AuthResponse) -> Result<()> {
    config.remote.server = Some(server.to_string());
    config.remote.token = Some(auth.token.clone());
    config.remote.email = Some(email.to_string());
    config.save()
}

pub async fn register(
    config: &mut Config,
    server: &str,
    request: RegisterRequest,
) -> Result<()> {
    let client = ApiClient::new(server, None);
    let auth: AuthResponse = client.post("/api/auth/register", &request).await?;
    store_session(config, server, &request.email, &auth)?;

    println!("\x1b[1;32m✅ Account created\x1b[0m");
    println!("\x1b[90mUser ID: {}\x1b[0m", auth.user_id);
    Ok(())
}

/// Log in and keep the token in the config file
pub async fn login(config: &mut Config, server: &str, email: &str, password: String) -> Result<()> {
    let client = ApiClient::new(server, None);
    let auth: AuthResponse = client
        .post(
            "/api/auth/login",
            &LoginRequest {
                email: email.to_string(),
                password,
            },
        )
        .await?;
    store_session(config, server, email, &auth)?;

    println!("\x1b[1;32m✅ Login successful!\x1b[0m");
    println!("\x1b[90mUser ID: {}\x1b[0m", auth.user_id);
    Ok(())
}

/// Logout by clearing the stored token
pub fn logout(config: &mut Config) -> Result<()> {
    config.remote.token = None;
    config.remote.email = None;
    config.save()?;
    println!("\x1b[32m✅ Logged out successfully\x1b[0m");
    Ok(())
}

/// Show current login status, validated against the server
pub async fn whoami(config: &Config, server: &str) -> Result<()> {
    if config.remote.token.is_none() {
        println!("\x1b[33m✗ Not logged in\x1b[0m");
        println!("Run '\x1b[1mfilings login\x1b[0m' to authenticate");
        return Ok(());
    }

    let client = ApiClient::new(server, config.remote.token.clone());
    let me: WhoAmI = client.get("/api/auth/me").await?;

    println!("\x1b[32m✓ Logged in\x1b[0m as {}", me.email);
    println!("User ID: {}", me.user_id);
    println!("Server: {}", server);
    if me.is_admin {
        println!("Role: admin");
    }
    Ok(())
}

pub async fn forgot_password(server: &str, email: &str) -> Result<()> {
    let client = ApiClient::new(server, None);
    let ack: Ack = client
        .post(
            "/api/auth/forgot-password",
            &ForgotPasswordRequest {
                email: email.to_string(),
            },
        )
        .await?;
    println!("{}", ack.message);
    Ok(())
}

pub async fn reset_password(server: &str, token: &str, password: String) -> Result<()> {
    let client = ApiClient::new(server, None);
    let ack: Ack = client
        .post(
            "/api/auth/reset-password",
            &ResetPasswordRequest {
                token: token.to_string(),
                password,
            },
        )
        .await?;
    println!("\x1b[32m✅ {}\x1b[0m", ack.message);
    Ok(())
}
