//! Command-line and environment configuration

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use webblog_core::auth::AuthConfig;

#[derive(Debug, Parser)]
#[command(name = "webblog-server", version, about = "Stateless token authentication service")]
pub struct Cli {
    /// Data directory path
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        default_value = "./data",
        env = "WEBBLOG_DATA_DIR"
    )]
    pub data_dir: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve(ServeArgs),
    /// Register a principal in the data directory
    AddPrincipal(AddPrincipalArgs),
    /// Print an Argon2id hash of a password
    HashPassword(HashPasswordArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Bind address
    #[arg(long, value_name = "ADDR", default_value = "127.0.0.1:8080", env = "WEBBLOG_BIND")]
    pub bind: SocketAddr,

    #[command(flatten)]
    pub auth: AuthArgs,
}

/// Token signing settings
#[derive(Debug, Args)]
pub struct AuthArgs {
    /// HMAC-SHA256 signing secret, at least 32 bytes
    #[arg(long, env = "WEBBLOG_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Token lifetime in milliseconds
    #[arg(long, env = "WEBBLOG_JWT_EXPIRATION_MS")]
    pub jwt_expiration_ms: Option<u64>,

    /// Key identifier stamped into token headers
    #[arg(long, env = "WEBBLOG_JWT_KEY_ID")]
    pub jwt_key_id: Option<String>,
}

impl AuthArgs {
    /// Validate into an [`AuthConfig`]; missing values are configuration errors
    pub fn to_config(&self) -> webblog_core::Result<AuthConfig> {
        let secret = self.jwt_secret.as_deref().ok_or_else(|| {
            webblog_core::WebblogError::Config(
                "signing secret is required (--jwt-secret or WEBBLOG_JWT_SECRET)".to_string(),
            )
        })?;
        let ttl_ms = self.jwt_expiration_ms.ok_or_else(|| {
            webblog_core::WebblogError::Config(
                "token TTL is required (--jwt-expiration-ms or WEBBLOG_JWT_EXPIRATION_MS)"
                    .to_string(),
            )
        })?;

        let config = AuthConfig::new(secret.as_bytes(), ttl_ms)?;
        match &self.jwt_key_id {
            Some(key_id) => config.with_key_id(key_id.as_str()),
            None => Ok(config),
        }
    }
}

#[derive(Debug, Args)]
pub struct AddPrincipalArgs {
    /// Subject identifier (username)
    #[arg(long)]
    pub subject: String,

    /// Alternate login identifier
    #[arg(long)]
    pub mail: Option<String>,

    /// Plaintext password to hash and store
    #[arg(long, env = "WEBBLOG_PRINCIPAL_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Debug, Args)]
pub struct HashPasswordArgs {
    /// Plaintext password
    #[arg(long, env = "WEBBLOG_PRINCIPAL_PASSWORD", hide_env_values = true)]
    pub password: String,
}
