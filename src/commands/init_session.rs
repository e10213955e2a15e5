//! Session initialization command
//!
//! Logs in interactively and stores the authorized session for later scrapes.

use std::io::{self, Write};
use std::path::Path;

use grammers_client::SignInError;
use tracing::info;

use crate::config::Credentials;
use crate::error::{Error, Result};
use crate::session::get_client_for_init;

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

pub async fn run<P: AsRef<Path>>(session_file: P, phone: Option<String>) -> Result<()> {
    let credentials = Credentials::from_env()?;
    let phone = match phone.filter(|p| !p.trim().is_empty()) {
        Some(phone) => phone,
        None => prompt("Phone number (international format): ")?,
    };
    if phone.is_empty() {
        return Err(Error::InvalidArgument("phone number is required".to_string()));
    }

    let session_file = session_file.as_ref();
    let client = get_client_for_init(session_file, &credentials).await?;

    if client.is_authorized().await? {
        println!("Session {} is already authorized.", session_file.display());
        return Ok(());
    }

    info!("Requesting login code for {}", phone);
    let token = client
        .request_login_code(&phone, &credentials.api_hash)
        .await
        .map_err(|e| Error::TelegramError(format!("Failed to request code: {}", e)))?;

    let code = prompt("Enter the code from Telegram: ")?;

    let user = match client.sign_in(&token, &code).await {
        Ok(user) => user,
        Err(SignInError::PasswordRequired(password_token)) => {
            let password = prompt("Two-step verification password: ")?;
            client
                .check_password(password_token, password.as_bytes())
                .await
                .map_err(|e| Error::TelegramError(format!("Failed to check password: {}", e)))?
        }
        Err(e) => return Err(Error::TelegramError(format!("Failed to sign in: {}", e))),
    };

    // Session is auto-saved by SqliteSession
    println!(
        "Signed in as {} (@{}). Session stored in {}",
        user.full_name(),
        user.username().unwrap_or("-"),
        session_file.display()
    );

    Ok(())
}
