use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use scriptsync::{
    ChangeChannel, ChangeEvent, FolderWatcher, PushReport, PushResult, ReconcileSummary, TrackedFolder,
    WorkspaceRegistry,
};
use scriptsync_core::{HttpScriptClient, ScriptClient};

mod config;
mod logging;

use config::CliConfig;

#[derive(Parser)]
#[command(name = "scriptsync")]
#[command(about = "Keep a local folder of scripts in sync with a remote script store")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the API base URL
    #[arg(long)]
    url: Option<String>,

    /// API token (falls back to SCRIPTSYNC_TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the guilds available to the token
    Guilds,
    /// Bind a folder to a guild and pull its scripts
    Init {
        /// Folder to bind (created if missing)
        folder: PathBuf,
        /// Guild id
        #[arg(short, long)]
        guild: String,
    },
    /// Pull remote changes into a bound folder
    Pull {
        folder: PathBuf,
    },
    /// Show pending local changes
    Status {
        folder: PathBuf,
    },
    /// Push local changes, then pull and reload the guild
    Push {
        folder: PathBuf,
        /// Only push these files
        files: Vec<PathBuf>,
    },
    /// Watch folders and report changes until interrupted
    Watch {
        #[arg(required = true)]
        folders: Vec<PathBuf>,
    },
    /// Forget a folder's binding, keeping its script files
    Unbind {
        folder: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(CliConfig::default_path);
    let mut config = CliConfig::load_or_default(&config_path).await?;
    if let Some(url) = cli.url {
        config.api.base_url = url;
    }
    if let Some(token) = cli.token.or_else(|| std::env::var("SCRIPTSYNC_TOKEN").ok()) {
        config.api.token = Some(token);
    }
    config.validate()?;

    let _log_guard = logging::init(&config.logging, cli.verbose)?;
    debug!(config = %config_path.display(), "Loaded configuration");

    let http = Arc::new(config.api.build_client()?);
    let client: Arc<dyn ScriptClient> = http.clone();

    match cli.command {
        Commands::Guilds => list_guilds(&http).await,
        Commands::Init { folder, guild } => init(&http, client, &config, &folder, &guild).await,
        Commands::Pull { folder } => {
            let folder = open(&folder, client, &config).await?;
            let summary = folder.sync().await?;
            print_summary(&summary);
            Ok(())
        }
        Commands::Status { folder } => {
            let folder = scriptsync::open_folder(resolve(&folder)?, config.workspace.clone(), client).await?;
            print_status(&folder);
            Ok(())
        }
        Commands::Push { folder, files } => {
            let folder = scriptsync::open_folder(resolve(&folder)?, config.workspace.clone(), client).await?;
            let report = if files.is_empty() {
                folder.push_all().await?
            } else {
                let paths = files
                    .iter()
                    .map(|file| script_path(folder.root(), file))
                    .collect::<Result<Vec<_>>>()?;
                folder.push_paths(&paths).await?
            };

            print_report(&report);
            ensure_pushed(&report)
        }
        Commands::Watch { folders } => watch(client, &config, &folders).await,
        Commands::Unbind { folder } => {
            let folder = open(&folder, client, &config).await?;
            folder.unbind().await?;
            println!("Unbound {}", folder.root().display());
            Ok(())
        }
    }
}

async fn list_guilds(http: &HttpScriptClient) -> Result<()> {
    let guilds = http.list_guilds().await?;
    if guilds.is_empty() {
        println!("No guilds available");
    }
    for guild in guilds {
        println!("{}\t{}", guild.id, guild.name);
    }
    Ok(())
}

async fn init(
    http: &HttpScriptClient,
    client: Arc<dyn ScriptClient>,
    config: &CliConfig,
    folder: &Path,
    guild_id: &str,
) -> Result<()> {
    let guild = http
        .list_guilds()
        .await?
        .into_iter()
        .find(|guild| guild.id == guild_id)
        .with_context(|| format!("Guild {} is not available to this token", guild_id))?;

    let registry = WorkspaceRegistry::new(client, config.workspace.clone());
    let (folder, summary) = registry.bind(folder, guild.clone()).await?;

    println!("Bound {} to {} ({})", folder.root().display(), guild.name, guild.id);
    print_summary(&summary);
    Ok(())
}

async fn watch(client: Arc<dyn ScriptClient>, config: &CliConfig, folders: &[PathBuf]) -> Result<()> {
    let (notifier, mut channel) = ChangeChannel::new();
    let registry = Arc::new(WorkspaceRegistry::with_notifier(
        client,
        config.workspace.clone(),
        Arc::new(notifier),
    ));

    let mut watcher = FolderWatcher::start(registry.clone())?;
    for path in folders {
        let folder = registry.add(path).await?;
        let pending = folder.refresh().await?;
        watcher.watch(folder.root())?;
        println!("Watching {} ({} pending)", folder.root().display(), pending);
    }

    info!(folders = registry.len(), "Watching for changes, press Ctrl-C to stop");

    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => None,
            event = channel.recv() => event,
        };
        let Some(event) = event else { break };

        for (path, state) in debounce(&mut channel, event, config.watch.debounce).await {
            match state {
                Some(state) => {
                    let decoration = state.decoration();
                    println!("{:>1} {:<10} {}", decoration.badge, decoration.label, path.display());
                }
                None => println!("  {:<10} {}", "Clean", path.display()),
            }
        }
    }

    println!("Stopping");
    drop(watcher);
    Ok(())
}

/// Collect events until the channel stays quiet for `window`, keeping the
/// latest state per path.
async fn debounce(
    channel: &mut ChangeChannel,
    first: ChangeEvent,
    window: Duration,
) -> BTreeMap<PathBuf, Option<scriptsync::ChangeState>> {
    let mut latest = BTreeMap::new();
    latest.insert(first.path, first.state);

    while let Ok(Some(event)) = tokio::time::timeout(window, channel.recv()).await {
        latest.insert(event.path, event.state);
    }
    latest
}

async fn open(folder: &Path, client: Arc<dyn ScriptClient>, config: &CliConfig) -> Result<TrackedFolder> {
    let folder = TrackedFolder::new(
        resolve(folder)?,
        config.workspace.clone(),
        client,
        Arc::new(scriptsync::NoopNotifier),
    )?;
    folder.index().await?;
    Ok(folder)
}

fn resolve(folder: &Path) -> Result<PathBuf> {
    folder
        .canonicalize()
        .with_context(|| format!("Folder {} does not exist", folder.display()))
}

/// Map a user-supplied file to the working path inside `root`. Deleted files
/// cannot be canonicalized, so only their parent is resolved.
fn script_path(root: &Path, file: &Path) -> Result<PathBuf> {
    let absolute = if file.is_absolute() {
        file.to_path_buf()
    } else {
        std::env::current_dir()?.join(file)
    };

    let parent = absolute.parent().and_then(|parent| parent.canonicalize().ok());
    match (parent, absolute.file_name()) {
        (Some(parent), Some(name)) if parent == root => Ok(root.join(name)),
        _ => Ok(absolute),
    }
}

fn print_summary(summary: &ReconcileSummary) {
    println!("Fetched {} scripts", summary.fetched);
    for name in &summary.materialized {
        println!("  + {}", name);
    }
    for name in &summary.overwritten {
        println!("  ~ {}", name);
    }
    for name in &summary.removed {
        println!("  - {}", name);
    }
    for name in &summary.preserved {
        println!("  kept local changes: {}", name);
    }
    for name in &summary.rejected {
        println!("  ignored remote script: {}", name);
    }
    println!("{} pending local changes", summary.pending_changes);
}

fn print_status(folder: &TrackedFolder) {
    let changes = folder.changes();
    if changes.is_empty() {
        println!("Nothing to push, {} is in sync", folder.root().display());
        return;
    }

    for change in changes {
        let decoration = change.state.decoration();
        let name = change
            .path
            .strip_prefix(folder.root())
            .unwrap_or(&change.path);
        println!("{} {:<10} {}", decoration.badge, decoration.label, name.display());
    }
}

fn print_report(report: &PushReport) {
    println!("Push batch {}", report.batch_id);
    for outcome in &report.outcomes {
        let name = outcome.name.as_deref().unwrap_or("?");
        match &outcome.result {
            PushResult::Created { id } => println!("  created  {} (id {})", name, id),
            PushResult::Updated => println!("  updated  {}", name),
            PushResult::Deleted => println!("  deleted  {}", name),
            PushResult::Skipped { reason } => println!("  skipped  {}: {}", outcome.path.display(), reason),
            PushResult::Failed { error } => println!("  FAILED   {}: {}", name, error),
        }
    }

    match &report.reconcile {
        Ok(summary) => println!("{} pending local changes", summary.pending_changes),
        Err(e) => println!("Pull after push failed: {}", e),
    }
    if let Err(e) = &report.reload {
        println!("Guild reload failed: {}", e);
    }
}

/// Turn an incomplete push into an error so the process exits non-zero
fn ensure_pushed(report: &PushReport) -> Result<()> {
    if report.is_successful() {
        return Ok(());
    }

    let failed = report.failures().count();
    if failed > 0 {
        anyhow::bail!("Push batch {} had {} failed entries", report.batch_id, failed);
    }
    anyhow::bail!("Push batch {} did not finish its pull and reload", report.batch_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scriptsync::{ChangeState, PushOutcome, SyncError};
    use tempfile::TempDir;
    use uuid::Uuid;

    fn report(result: PushResult) -> PushReport {
        PushReport {
            batch_id: Uuid::nil(),
            outcomes: vec![PushOutcome {
                path: PathBuf::from("/work/greet.ts"),
                name: Some("greet".to_string()),
                state: ChangeState::Modified,
                result,
            }],
            reconcile: Err(SyncError::NotTracked { path: PathBuf::from("/work") }),
            reload: Ok(()),
        }
    }

    #[test]
    fn test_cli_parses_push_files() {
        let cli = Cli::parse_from(["scriptsync", "push", "work", "a.ts", "b.ts"]);
        match cli.command {
            Commands::Push { folder, files } => {
                assert_eq!(folder, PathBuf::from("work"));
                assert_eq!(files.len(), 2);
            }
            _ => panic!("expected push"),
        }
    }

    #[test]
    fn test_script_path_keeps_deleted_files_in_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();

        let path = script_path(&root, &root.join("gone.ts")).unwrap();
        assert_eq!(path, root.join("gone.ts"));
    }

    #[test]
    fn test_failed_push_is_an_error() {
        let err = ensure_pushed(&report(PushResult::Failed {
            error: "Server error (500)".to_string(),
        }))
        .unwrap_err();
        assert!(err.to_string().contains("1 failed entries"));
    }

    #[test]
    fn test_push_without_pull_is_an_error() {
        let err = ensure_pushed(&report(PushResult::Updated)).unwrap_err();
        assert!(err.to_string().contains("pull and reload"));
    }
}
