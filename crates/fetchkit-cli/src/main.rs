//! fetchkit - read and write a REST service through a local ephemeral cache.
//!
//! Reads are served from the cache directory while fresh; writes purge the
//! affected entry. The outcome is printed as the resource state JSON
//! (`data`, `loading`, `error`, `message`).

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fetchkit_core::{
    ApiClient, AuthPolicy, Config, CredentialSource, EphemeralCache, FileStorage, Invalidation,
    Resource, ResourceState, StaticCredential, StatusController,
};
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Read and write a REST service through a local ephemeral cache.
///
/// FETCHKIT_BASE_URL and FETCHKIT_TOKEN override the config file.
/// RUST_LOG controls log verbosity (default: warn).
#[derive(Parser, Debug)]
#[command(name = "fetchkit")]
#[command(version)]
struct Cli {
    /// Call the remote without a credential
    #[arg(long, global = true)]
    no_auth: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// Read <path> through the cache
    Get {
        path: String,
        /// Maximum age of a cached entry in seconds
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Show the cached entry for <path>, fresh or not
    Inspect { path: String },
    /// Create, then invalidate <path>
    Post {
        path: String,
        #[arg(value_parser = parse_json)]
        body: Value,
    },
    /// Update, then invalidate <path>
    Put {
        path: String,
        #[arg(value_parser = parse_json)]
        body: Value,
    },
    /// Delete, then invalidate <path>
    Delete { path: String },
    /// Drop the cached entry for <path>
    Purge { path: String },
    /// Wipe the whole cache directory
    Clear,
    /// Print the effective configuration
    Config {
        /// Write it to the config file
        #[arg(long)]
        save: bool,
    },
}

fn parse_json(raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("not valid JSON: {}", e))
}

/// Initialize the tracing subscriber for logging.
/// Logs go to stderr unless the config names a log file.
fn init_tracing(config: &Config) -> Result<Option<WorkerGuard>> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match config.log_file {
        Some(ref path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("log_file has no file name: {}", path.display()))?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            Ok(None)
        }
    }
}

fn open_cache(config: &Config) -> Result<EphemeralCache> {
    let dir = config.cache_dir()?;
    let storage = FileStorage::new(&dir)
        .with_context(|| format!("Failed to open cache directory: {}", dir.display()))?;
    Ok(EphemeralCache::new(Arc::new(storage)).with_default_max_age(config.cache_ttl()))
}

fn api_client(config: &Config) -> Result<ApiClient> {
    let base_url = config
        .base_url
        .clone()
        .ok_or_else(|| anyhow::anyhow!("No base URL configured (set FETCHKIT_BASE_URL)"))?;
    Ok(ApiClient::with_timeout(base_url, config.request_timeout())?)
}

fn build_resource(
    config: &Config,
    cache: EphemeralCache,
    api: ApiClient,
    path: &str,
    anonymous: bool,
) -> Resource<Value> {
    let credentials: Arc<dyn CredentialSource> =
        Arc::new(StaticCredential::from(config.credential.clone()));

    let fetch_path = path.to_string();
    let resource = Resource::new(path, cache, move |credential| {
        let api = api.with_token(credential);
        let path = fetch_path.clone();
        async move { api.get::<Value>(&path).await }
    })
    .with_credentials(credentials)
    .with_status(StatusController::new().with_clear_after(config.status_clear_after()))
    .with_messages(format!("Fetched {}", path), format!("Saved {}", path));

    if anonymous {
        resource.with_auth_policy(AuthPolicy::Anonymous)
    } else {
        resource
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Outcome of a remote write: the server's reply next to the resource state.
#[derive(Serialize)]
struct MutationReport {
    response: Option<Value>,
    #[serde(flatten)]
    state: ResourceState<Value>,
}

fn fail_on_error(error: Option<String>) -> Result<()> {
    match error {
        Some(error) => bail!(error),
        None => Ok(()),
    }
}

/// Print the resource state and turn a reported error into a failing exit.
fn finish(resource: &Resource<Value>) -> Result<()> {
    let state = resource.state();
    print_json(&state)?;
    fail_on_error(state.error)
}

fn finish_mutation(resource: &Resource<Value>, response: Option<Value>) -> Result<()> {
    let report = MutationReport {
        response,
        state: resource.state(),
    };
    print_json(&report)?;
    fail_on_error(report.state.error)
}

/// Config as printed, with the credential masked.
fn redacted(config: &Config) -> Config {
    Config {
        credential: config.credential.as_ref().map(|_| "********".to_string()),
        ..config.clone()
    }
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let anonymous = cli.no_auth;

    match cli.command {
        Command::Config { save } => {
            print_json(&redacted(&config))?;
            if save {
                config.save()?;
                info!(path = %Config::config_path()?.display(), "Saved config");
            }
        }
        Command::Get { path, ttl } => {
            let cache = open_cache(&config)?;
            let api = api_client(&config)?;
            let mut resource = build_resource(&config, cache, api, &path, anonymous);
            if let Some(secs) = ttl {
                resource = resource.with_max_age(Duration::from_secs(secs));
            }
            resource.fetch().await;
            finish(&resource)?;
        }
        Command::Inspect { path } => {
            let cache = open_cache(&config)?;
            match cache.inspect::<Value>(&path) {
                Some(entry) => {
                    let max_age = cache.default_max_age();
                    print_json(&serde_json::json!({
                        "key": path,
                        "written_at": entry.written_at(),
                        "age": entry.age_display(),
                        "fresh": entry.is_fresh(max_age),
                        "value": entry.value,
                    }))?;
                }
                None => bail!("No cache entry for {}", path),
            }
        }
        Command::Post { path, body } => {
            let cache = open_cache(&config)?;
            let api = api_client(&config)?;
            let resource = build_resource(&config, cache, api.clone(), &path, anonymous);
            let response = resource
                .mutate_with(
                    |credential| async move {
                        api.with_token(credential).post::<Value, _>(&path, &body).await
                    },
                    Invalidation::own(),
                )
                .await;
            finish_mutation(&resource, response)?;
        }
        Command::Put { path, body } => {
            let cache = open_cache(&config)?;
            let api = api_client(&config)?;
            let resource = build_resource(&config, cache, api.clone(), &path, anonymous);
            let response = resource
                .mutate_with(
                    |credential| async move {
                        api.with_token(credential).put::<Value, _>(&path, &body).await
                    },
                    Invalidation::own(),
                )
                .await;
            finish_mutation(&resource, response)?;
        }
        Command::Delete { path } => {
            let cache = open_cache(&config)?;
            let api = api_client(&config)?;
            let resource = build_resource(&config, cache, api.clone(), &path, anonymous);
            let response = resource
                .mutate(|credential| async move {
                    api.with_token(credential).delete::<Value>(&path).await
                })
                .await;
            finish_mutation(&resource, response)?;
        }
        Command::Purge { path } => {
            open_cache(&config)?.purge(&path);
            info!(key = %path, "Purged cache entry");
        }
        Command::Clear => {
            open_cache(&config)?.clear();
            info!("Cleared cache directory");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = Config::load()?;
    let _log_guard = init_tracing(&config)?;
    info!(command = ?cli.command, "fetchkit starting");

    run(cli, config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("fetchkit").chain(args.iter().copied()))
    }

    #[test]
    fn test_parse_get() {
        let cli = parse(&["get", "users"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Get {
                path: "users".to_string(),
                ttl: None
            }
        );
        assert!(!cli.no_auth);

        let cli = parse(&["--no-auth", "get", "users/7", "--ttl", "30"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Get {
                path: "users/7".to_string(),
                ttl: Some(30)
            }
        );
        assert!(cli.no_auth);

        // Global flag also works after the subcommand
        assert!(parse(&["get", "users", "--no-auth"]).unwrap().no_auth);
    }

    #[test]
    fn test_parse_mutations() {
        let cli = parse(&["post", "users", r#"{"name":"bob"}"#]).unwrap();
        assert_eq!(
            cli.command,
            Command::Post {
                path: "users".to_string(),
                body: serde_json::json!({"name": "bob"})
            }
        );
        assert_eq!(
            parse(&["delete", "users/7"]).unwrap().command,
            Command::Delete {
                path: "users/7".to_string()
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["get"]).is_err());
        assert!(parse(&["get", "users", "--ttl"]).is_err());
        assert!(parse(&["get", "users", "--ttl", "soon"]).is_err());
        assert!(parse(&["post", "users", "{bad"]).is_err());
        assert!(parse(&["frobnicate"]).is_err());
    }

    #[test]
    fn test_trailing_arguments_are_rejected() {
        assert!(parse(&["get", "users", "--ttl", "30", "extra"]).is_err());
        assert!(parse(&["purge", "users", "teams"]).is_err());
    }

    #[test]
    fn test_parse_maintenance() {
        assert_eq!(parse(&["clear"]).unwrap().command, Command::Clear);
        assert_eq!(
            parse(&["purge", "users"]).unwrap().command,
            Command::Purge {
                path: "users".to_string()
            }
        );
        assert_eq!(
            parse(&["config", "--save"]).unwrap().command,
            Command::Config { save: true }
        );
    }

    #[test]
    fn test_mutation_report_includes_response() {
        let report = MutationReport {
            response: Some(serde_json::json!({"id": 42})),
            state: ResourceState {
                data: Value::Null,
                loading: false,
                error: None,
                message: Some("Saved users".to_string()),
            },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["response"]["id"], 42);
        assert_eq!(json["message"], "Saved users");
        assert_eq!(json["loading"], false);
    }

    #[test]
    fn test_redacted_config_masks_credential() {
        let config = Config {
            credential: Some("secret".to_string()),
            ..Config::default()
        };
        assert_eq!(redacted(&config).credential.as_deref(), Some("********"));
        assert_eq!(redacted(&Config::default()).credential, None);
    }
}
