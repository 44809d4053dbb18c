//! Session token utility for InvestHub
//!
//! Issues an HS256 session token signed with `JWT_SECRET`, for local testing
//! of gated endpoints without going through the login flow.
//!
//! Usage:
//!   cargo run --bin issue-token -- <user_id> [role] [email]
//!
//! Example:
//!   cargo run --bin issue-token -- 7d1c0e2a trader trader@example.com

use std::env;

use investhub_api::auth::JwtManager;
use investhub_shared::types::{AppRole, User};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let mut args = env::args().skip(1);
    let Some(user_id) = args.next() else {
        eprintln!("Usage: issue-token <user_id> [role] [email]");
        std::process::exit(1);
    };
    let role = args.next().map(AppRole::from).unwrap_or_default();
    let email = args.next();

    let secret = env::var("JWT_SECRET").map_err(|_| "JWT_SECRET is not set")?;
    if secret.len() < 32 {
        return Err("JWT_SECRET must be at least 32 characters".into());
    }
    let expiry_hours = env::var("JWT_EXPIRY_HOURS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(24);

    let mut user = User::new(user_id.as_str(), role);
    user.email = email;

    let token = JwtManager::new(&secret, expiry_hours).generate_token(&user)?;

    eprintln!("Token for {} ({}), valid {}h:", user.id, user.app_role, expiry_hours);
    println!("{}", token);

    Ok(())
}
