//! docchat binary - composition root.
//!
//! 1. Parse CLI args and initialise tracing
//! 2. Load configuration from TOML, applying its log level if none was given
//! 3. Open the persisted session and build the HTTP backend
//! 4. Wire the dashboard and run the requested command

mod cli;

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

use docchat_client::{
    Dashboard, HttpBackend, Navigation, Selection, SendOutcome, SessionStore, UploadOutcome,
};
use docchat_core::{DocChatConfig, DocumentId, EventBus, UploadFile};

use cli::{CliArgs, Command};

type AppResult<T> = Result<T, Box<dyn Error>>;

type LevelHandle = reload::Handle<EnvFilter, Registry>;

/// Install the subscriber. `RUST_LOG` wins, then `--log-level`.
///
/// Returns a handle when neither was given, so the level from the config
/// file can be applied once it is loaded.
fn init_tracing(args: &CliArgs) -> Option<LevelHandle> {
    let explicit = EnvFilter::try_from_default_env().ok().or_else(|| {
        args.resolve_log_level()
            .and_then(|level| EnvFilter::try_new(level).ok())
    });
    let deferred = explicit.is_none();
    let (filter, handle) =
        reload::Layer::new(explicit.unwrap_or_else(|| EnvFilter::new("info")));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
    deferred.then_some(handle)
}

fn apply_config_level(handle: &LevelHandle, level: &str) {
    match EnvFilter::try_new(level) {
        Ok(filter) => {
            if let Err(e) = handle.reload(filter) {
                tracing::warn!(error = %e, "Failed to apply configured log level");
            }
        }
        Err(e) => tracing::warn!(configured = level, error = %e, "Invalid log_level in config"),
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let args = CliArgs::parse();

    let reload_level = init_tracing(&args);

    let config_file = args.resolve_config_path();
    let mut config = DocChatConfig::load_or_default(&config_file);
    if let Some(handle) = reload_level {
        apply_config_level(&handle, &config.general.log_level);
    }
    config.api.base_url = args.resolve_api_url(&config.api.base_url);

    if args.command == Command::Init {
        config.save(&config_file)?;
        println!("Wrote {}", config_file.display());
        return Ok(());
    }

    let events = EventBus::default();
    let session = Arc::new(SessionStore::open(config.token_path(), events.clone()));
    let backend = Arc::new(HttpBackend::new(&config.api)?);
    tracing::debug!(base_url = %backend.base_url(), "Backend configured");
    let dashboard = Dashboard::new(backend, session, events);

    match args.command {
        // Handled before the backend is built.
        Command::Init => {}
        Command::Login { token } => {
            dashboard.session().set_token(&token)?;
            println!("Signed in.");
        }
        Command::Logout => {
            dashboard.logout()?;
            println!("Signed out.");
        }
        Command::Route { path } => match dashboard.gate().resolve_path(&path) {
            Navigation::Allow(route) => println!("{route}"),
            Navigation::Redirect(route) => println!("redirect -> {route}"),
            Navigation::NotFound => println!("not found"),
        },
        Command::Documents => {
            enter(&dashboard).await?;
            print_documents(&dashboard);
        }
        Command::Upload { files } => {
            enter(&dashboard).await?;
            upload(&dashboard, &files).await?;
        }
        Command::Chat { document } => {
            enter(&dashboard).await?;
            chat(&dashboard, DocumentId(document)).await?;
        }
    }

    Ok(())
}

/// Open the dashboard, failing if the session may not see it or the list
/// could not be loaded.
async fn enter(dashboard: &Dashboard) -> AppResult<()> {
    if let Navigation::Redirect(route) = dashboard.open().await {
        return Err(format!("not signed in; run `docchat login --token <TOKEN>` ({route})").into());
    }
    if let Some(message) = dashboard.documents().error() {
        return Err(message.into());
    }
    Ok(())
}

fn print_documents(dashboard: &Dashboard) {
    if let Some(message) = dashboard.empty_state() {
        println!("{message}");
        return;
    }
    for document in dashboard.documents().documents() {
        println!("{:>6}  {}", document.id, document.title);
    }
}

async fn upload(dashboard: &Dashboard, paths: &[std::path::PathBuf]) -> AppResult<()> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(read_upload(path).await?);
    }
    if files.len() > 1 {
        tracing::info!(ignored = files.len() - 1, "Only the first file is uploaded");
    }

    match dashboard.upload(files).await {
        UploadOutcome::Uploaded(document) => {
            println!("Uploaded {} as document {}.", document.title, document.id);
            print_documents(dashboard);
            Ok(())
        }
        UploadOutcome::Failed { message, .. } => Err(message.into()),
        other => Err(format!("upload not started: {other:?}").into()),
    }
}

async fn read_upload(path: &Path) -> AppResult<UploadFile> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| format!("not a file: {}", path.display()))?;
    Ok(UploadFile::new(file_name, bytes))
}

async fn chat(dashboard: &Dashboard, id: DocumentId) -> AppResult<()> {
    if let Selection::Missing = dashboard.select(id) {
        return Err(format!("no document with id {id}").into());
    }
    let conversation = dashboard.conversation();
    if let Some(title) = conversation.title() {
        println!("Chat with: {title}");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        conversation.set_input(line);
        match conversation.submit().await {
            SendOutcome::Replied(message) => println!("{}", message.content),
            SendOutcome::Failed { message, .. } => eprintln!("{message}"),
            SendOutcome::Ignored(_) | SendOutcome::Stale => {}
        }
        if !dashboard.session().is_authenticated() {
            return Err("session expired; sign in again".into());
        }
    }
    Ok(())
}
