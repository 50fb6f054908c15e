use anyhow::Context;
use cas_server::{CasServer, ServerConfig};
use tracing::info;

use crate::cli::{Cli, Command, ServeArgs};

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args).await,
    }
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = resolve_config(&args)?;
    let server = CasServer::open(config.clone())
        .await
        .with_context(|| format!("opening store at {}", config.store_dir.display()))?;

    tokio::select! {
        res = server.serve() => res.with_context(|| format!("serving on {}", config.bind_addr))?,
        res = tokio::signal::ctrl_c() => {
            res.context("waiting for shutdown signal")?;
            info!("shutting down");
        }
    }
    Ok(())
}

/// Defaults, then the config file, then environment and flags.
pub fn resolve_config(args: &ServeArgs) -> anyhow::Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(dir) = &args.store_dir {
        config.store_dir = dir.clone();
    }
    if args.allow_empty_body {
        config.allow_empty_body = true;
    }
    if let Some(secs) = args.header_timeout {
        config.request_header_timeout_secs = secs;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn defaults_without_overrides() {
        let config = resolve_config(&ServeArgs::default()).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cas.toml");
        std::fs::write(&path, "bind_addr = \"127.0.0.1:7000\"\nstore_dir = \"/from/file\"\n").unwrap();

        let from_file = resolve_config(&ServeArgs {
            config: Some(path.clone()),
            ..ServeArgs::default()
        })
        .unwrap();
        assert_eq!(from_file.bind_addr, "127.0.0.1:7000".parse().unwrap());
        assert_eq!(from_file.store_dir, PathBuf::from("/from/file"));

        let overridden = resolve_config(&ServeArgs {
            config: Some(path),
            store_dir: Some(PathBuf::from("/from/flag")),
            header_timeout: Some(30),
            ..ServeArgs::default()
        })
        .unwrap();
        assert_eq!(overridden.bind_addr, "127.0.0.1:7000".parse().unwrap());
        assert_eq!(overridden.store_dir, PathBuf::from("/from/flag"));
        assert_eq!(overridden.request_header_timeout_secs, 30);
    }

    #[test]
    fn missing_config_file_fails() {
        let args = ServeArgs {
            config: Some(PathBuf::from("/definitely/not/here.toml")),
            ..ServeArgs::default()
        };
        assert!(resolve_config(&args).is_err());
    }
}
