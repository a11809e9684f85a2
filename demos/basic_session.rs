//! Basic session example
//!
//! Usage:
//!   cargo run --example basic_session

use serde_json::{json, Value};
use session_rs_client::{
    AuthClient, AuthSession, MemoryStorage, ReqwestTransport, SessionConfig, UserProfileCache,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let base_url = std::env::var("API_BASE_URL")
        .unwrap_or_else(|_| "http://localhost:8080".to_string());
    let username = std::env::var("API_USERNAME").unwrap_or_else(|_| "demo".to_string());
    let password = std::env::var("API_PASSWORD").unwrap_or_else(|_| "demo".to_string());

    println!("=== Session Client Example ===");
    println!("API: {}", base_url);
    println!();

    let transport = Arc::new(ReqwestTransport::new(base_url));
    let session = AuthSession::connect(SessionConfig::default(), transport, MemoryStorage::new()).await;
    println!("Restored session: logged in = {}", session.is_authenticated());

    let mut state = session.subscribe();
    tokio::spawn(async move {
        while state.changed().await.is_ok() {
            println!("  (session state changed: logged in = {})", *state.borrow_and_update());
        }
    });

    if !session.is_authenticated() {
        session
            .login(&json!({ "username": username, "password": password }))
            .await?;
        println!("✓ Logged in");
    }

    let client = AuthClient::new(Arc::clone(&session));
    let profiles = UserProfileCache::new(client.clone());

    // Both calls share one request
    let (a, b) = tokio::join!(profiles.current_user(), profiles.current_user());
    println!("✓ Current user: {:?}", a?);
    println!("  (second caller saw the same profile: {})", b.is_ok());

    // Requests that hit an expired token are refreshed and replayed transparently
    match client.get::<Value>("user/me").await {
        Ok(me) => println!("✓ GET user/me: {}", me),
        Err(e) => println!("! GET user/me failed: {}", e),
    }

    if let Err(e) = session.logout(true).await {
        println!("! Server logout failed: {} (local session cleared anyway)", e);
    }
    println!("Logged in after logout: {}", session.is_authenticated());

    Ok(())
}
