//! Dashboard API command-line client
//!
//! Restores the persisted session, issues one request through the
//! authenticated gateway and prints the response body.

mod config;

use anyhow::{Context, Result, bail};
use common::Secret;
use gateway::{Endpoints, Gateway, GatewayError, RequestOptions, TracingNotifier};
use serde_json::Value;
use session_auth::{FileTokenStore, InMemoryAuthState};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::{ApiResponse, HttpTransport};

use crate::config::Config;

const USAGE: &str = "usage: dashboard-cli [--config PATH] <get|delete PATH | post|put PATH JSON | login EMAIL | logout>";

#[derive(Debug, PartialEq)]
enum Command {
    Get(String),
    Delete(String),
    Post(String, Value),
    Put(String, Value),
    Login(String),
    Logout,
}

/// Split `--config PATH` out of the arguments and parse the rest as a command.
fn parse_args(args: &[String]) -> Result<(Option<String>, Command)> {
    let mut config = None;
    let mut rest = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let path = iter.next().context("--config requires a path")?;
            config = Some(path.clone());
        } else {
            rest.push(arg.as_str());
        }
    }

    let command = match rest.as_slice() {
        ["get", path] => Command::Get(path.to_string()),
        ["delete", path] => Command::Delete(path.to_string()),
        ["post", path, body] => Command::Post(path.to_string(), parse_body(body)?),
        ["put", path, body] => Command::Put(path.to_string(), parse_body(body)?),
        ["login", email] => Command::Login(email.to_string()),
        ["logout"] => Command::Logout,
        _ => bail!(USAGE),
    };
    Ok((config, command))
}

fn parse_body(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("request body is not valid JSON: {raw}"))
}

fn print_body(response: &ApiResponse) {
    let text = response.text();
    if !text.is_empty() {
        println!("{text}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (cli_config_path, command) = parse_args(&args)?;

    let config_path = Config::resolve_path(cli_config_path.as_deref());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        base_url = %config.api.base_url,
        timeout_secs = config.api.timeout_secs,
        token_file = %config.storage.refresh_token_file.display(),
        "configuration loaded"
    );

    let transport = HttpTransport::new(
        reqwest::Client::new(),
        config.api.base_url.clone(),
        Duration::from_secs(config.api.timeout_secs),
    );
    let tokens = FileTokenStore::load(config.storage.refresh_token_file.clone())
        .await
        .context("failed to load refresh token file")?;

    let gateway = Gateway::new(
        Arc::new(transport),
        Arc::new(tokens),
        Arc::new(InMemoryAuthState::new()),
        Arc::new(TracingNotifier),
    )
    .with_endpoints(Endpoints {
        refresh: config.api.refresh_path.clone(),
        login: config.api.login_path.clone(),
        logout: config.api.logout_path.clone(),
    });

    let restored = gateway.restore_session().await;
    info!(restored, "session restore finished");

    let outcome = match command {
        Command::Get(path) => gateway.get(&path, RequestOptions::default()).await,
        Command::Delete(path) => gateway.delete(&path, RequestOptions::default()).await,
        Command::Post(path, body) => gateway.post(&path, body, RequestOptions::default()).await,
        Command::Put(path, body) => gateway.put(&path, body, RequestOptions::default()).await,
        Command::Login(email) => {
            let password = std::env::var("DASHBOARD_PASSWORD")
                .context("DASHBOARD_PASSWORD must be set to sign in")?;
            gateway
                .sign_in(&email, &Secret::new(password))
                .await
                .context("sign in failed")?;
            return Ok(());
        }
        Command::Logout => {
            gateway.sign_out().await;
            return Ok(());
        }
    };

    match outcome {
        Ok(response) => {
            print_body(&response);
            Ok(())
        }
        Err(e) => {
            if let Some(response) = e.response() {
                print_body(response);
            }
            if let GatewayError::AuthorizationExpired { .. } = e {
                bail!("{e}; run `dashboard-cli login <email>`");
            }
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_verbs() {
        let (config, command) = parse_args(&args(&["get", "/Users"])).unwrap();
        assert!(config.is_none());
        assert_eq!(command, Command::Get("/Users".into()));

        let (_, command) =
            parse_args(&args(&["post", "/Announcements", r#"{"title":"Eid"}"#])).unwrap();
        assert_eq!(
            command,
            Command::Post("/Announcements".into(), json!({"title": "Eid"}))
        );

        let (_, command) = parse_args(&args(&["logout"])).unwrap();
        assert_eq!(command, Command::Logout);
    }

    #[test]
    fn config_flag_may_appear_anywhere() {
        let (config, command) =
            parse_args(&args(&["delete", "/Users/4", "--config", "/etc/dash.toml"])).unwrap();
        assert_eq!(config.as_deref(), Some("/etc/dash.toml"));
        assert_eq!(command, Command::Delete("/Users/4".into()));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["get"])).is_err());
        assert!(parse_args(&args(&["get", "/a", "--config"])).is_err());
        assert!(parse_args(&args(&["put", "/a", "{not json"])).is_err());
    }
}
