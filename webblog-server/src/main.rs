//! webblog server binary

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use webblog_core::auth::{self, LoginService, PrincipalResolver, TokenCodec};
use webblog_core::{LoginIdentifier, Principal, SubjectId};
use webblog_engine::StorageEngine;
use webblog_server::config::{AddPrincipalArgs, Cli, Command, HashPasswordArgs, ServeArgs};
use webblog_server::{AppState, AuthGate, WebblogServer};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Serve(args) => serve(&cli.data_dir, args).await,
        Command::AddPrincipal(args) => add_principal(&cli.data_dir, args),
        Command::HashPassword(args) => hash_password(args),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn open_storage(data_dir: &Path) -> Result<StorageEngine> {
    if !data_dir.exists() {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
        info!("Created data directory: {}", data_dir.display());
    }

    StorageEngine::new(data_dir).context("Failed to initialize storage engine")
}

async fn serve(data_dir: &Path, args: ServeArgs) -> Result<()> {
    // Configuration errors abort before anything binds
    let auth_config = args.auth.to_config().context("Invalid authentication configuration")?;

    info!("Starting webblog server");
    info!("Data directory: {}", data_dir.display());
    info!("Bind address: {}", args.bind);

    let storage = open_storage(data_dir)?;
    let store = storage.principals().context("Failed to open principal store")?;
    info!("Storage engine initialized ({} principal(s))", store.count()?);

    let resolver: Arc<dyn PrincipalResolver> = Arc::new(store);
    let codec = Arc::new(TokenCodec::new(&auth_config));
    let login = LoginService::new(resolver.clone(), codec.clone())
        .context("Failed to build login service")?;
    let login = Arc::new(login);
    let gate = Arc::new(AuthGate::new(codec, resolver));

    let server = WebblogServer::new(AppState::new(gate, login));
    server.serve(args.bind).await.context("Server error")?;

    storage.persist()?;
    info!("Server shutdown gracefully");
    Ok(())
}

fn add_principal(data_dir: &Path, args: AddPrincipalArgs) -> Result<()> {
    let subject = SubjectId::new(&args.subject)?;
    let alternates = args
        .mail
        .as_deref()
        .map(LoginIdentifier::new)
        .transpose()?
        .into_iter()
        .collect();
    let credential_hash = auth::hash_password(&args.password)?;

    let storage = open_storage(data_dir)?;
    let store = storage.principals()?;
    store
        .register(&Principal::new(subject, alternates, credential_hash))
        .with_context(|| format!("Failed to register '{}'", args.subject))?;

    println!("Registered principal '{}'", args.subject);
    Ok(())
}

fn hash_password(args: HashPasswordArgs) -> Result<()> {
    let hash = auth::hash_password(&args.password)?;
    println!("{}", hash);
    Ok(())
}
