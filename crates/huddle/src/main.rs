//! # huddle-relay
//!
//! Huddle realtime relay binary: loads settings, wires authentication and
//! metrics into the server, and serves until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use huddle_auth::Authenticator;
use huddle_server::{HuddleServer, ServerConfig};
use huddle_settings::HuddleSettings;

/// Huddle realtime relay.
#[derive(Parser, Debug)]
#[command(name = "huddle-relay", about = "Huddle realtime update relay")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.huddle/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level filter, e.g. `debug` or `huddle_server=trace` (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Apply command-line overrides on top of loaded settings.
    fn apply(&self, settings: &mut HuddleSettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
    }
}

/// Build the server described by `settings`.
fn build_server(settings: &HuddleSettings) -> Result<HuddleServer> {
    let authenticator =
        Authenticator::from_settings(&settings.auth).context("Failed to configure authentication")?;
    let metrics =
        huddle_server::metrics::install_recorder().context("Failed to install metrics recorder")?;
    Ok(HuddleServer::new(
        ServerConfig::from_settings(&settings.server),
        authenticator,
        metrics,
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(huddle_settings::settings_path);
    let mut settings = {
        let _bootstrap = huddle_logging::bootstrap_subscriber();
        huddle_settings::load_settings_from_path(&settings_path)
            .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?
    };
    args.apply(&mut settings);

    huddle_logging::init_subscriber(&settings.logging.level, settings.logging.format);
    tracing::info!(
        settings = %settings_path.display(),
        auth_mode = ?settings.auth.mode,
        "starting huddle relay"
    );

    let server = build_server(&settings)?;
    let (addr, handle) = server.listen().await.context("Failed to start server")?;
    tracing::info!(%addr, "relay ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.hub().close_all().await;
    let report = server.shutdown().drain(vec![handle], None).await;
    tracing::info!(clean = report.is_clean(), "Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_settings::{AuthMode, StaticToken};

    #[test]
    fn cli_defaults_override_nothing() {
        let cli = Cli::parse_from(["huddle-relay"]);
        let mut settings = HuddleSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 8787);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn cli_overrides_settings() {
        let cli = Cli::parse_from([
            "huddle-relay",
            "--host",
            "0.0.0.0",
            "--port",
            "0",
            "--log-level",
            "debug",
            "--settings",
            "/etc/huddle.json",
        ]);
        let mut settings = HuddleSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 0);
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(cli.settings, Some(PathBuf::from("/etc/huddle.json")));
    }

    #[test]
    fn jwt_mode_without_secret_fails_to_build() {
        let settings = HuddleSettings::default();
        let err = build_server(&settings).err().unwrap();
        assert!(format!("{err:#}").contains("authentication"));
    }

    #[tokio::test]
    async fn settings_file_to_listening_server() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            serde_json::json!({
                "server": {"port": 0},
                "auth": {"mode": "static", "staticTokens": [{"token": "t", "userId": "alice"}]}
            })
            .to_string(),
        )
        .unwrap();

        let settings = huddle_settings::load_settings_from_path(&path).unwrap();
        assert_eq!(settings.auth.mode, AuthMode::Static);
        assert_eq!(
            settings.auth.static_tokens,
            vec![StaticToken {
                token: "t".into(),
                user_id: "alice".into(),
                display_name: None,
            }]
        );

        let server = build_server(&settings).unwrap();
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);
        let report = server
            .shutdown()
            .drain(vec![handle], Some(std::time::Duration::from_secs(5)))
            .await;
        assert!(report.is_clean());
    }
}
