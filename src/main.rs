use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info};

use inkpage::autosave::{FileSink, SaveError, save_now};
use inkpage::config::EngineConfig;
use inkpage::doc::BrushKind;
use inkpage::engine::EngineCore;
use inkpage::input::PointerEvent;
use inkpage::persist::{PersistError, PersistedDocument};
use inkpage::tools::ToolKey;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("io error on {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("invalid script: {0}")]
    Script(#[from] serde_json::Error),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Save(#[from] SaveError),
}

#[derive(Parser, Debug)]
#[command(name = "inkpage", about = "Inspect and replay paged handwriting documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print page size, object counts and preview height.
    Inspect { document: PathBuf },
    /// Replay a scripted session against a document.
    Replay {
        document: PathBuf,
        script: PathBuf,
        /// Where saves go; defaults to the document path.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// One scripted step.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Step {
    Pointer { event: PointerEvent },
    Tick { now_ms: u64 },
    Undo,
    Redo,
    Tool { key: ToolKey },
    Brush { kind: BrushKind },
    Clear,
    ExtendPage,
    Save,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Inspect { document } => run_inspect(&document).await,
        Command::Replay { document, script, out } => {
            let out = out.unwrap_or_else(|| document.clone());
            run_replay(&document, &script, out).await
        }
    }
}

async fn read(path: &Path) -> Result<String, CliError> {
    tokio::fs::read_to_string(path).await.map_err(|source| CliError::Io { path: path.to_owned(), source })
}

async fn run_inspect(path: &Path) -> Result<(), CliError> {
    let document = PersistedDocument::from_json(&read(path).await?)?;
    let summary = json!({
        "width": document.width,
        "height": document.height,
        "objects": document.census(),
        "previewHeight": document.preview_height(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn run_replay(document: &Path, script: &Path, out: PathBuf) -> Result<(), CliError> {
    let mut core = EngineCore::new(EngineConfig::from_env());
    if tokio::fs::try_exists(document).await.unwrap_or(false) {
        core.load_document(&PersistedDocument::from_json(&read(document).await?)?)?;
    } else {
        info!(path = %document.display(), "document not found; starting blank");
    }
    let steps: Vec<Step> = serde_json::from_str(&read(script).await?)?;
    let engine = Mutex::new(core);
    let sink = FileSink::new(out);

    let mut actions = 0;
    let mut saves = 0;
    for (index, step) in steps.into_iter().enumerate() {
        debug!(index, ?step, "replaying step");
        let mut core = engine.lock().await;
        let produced = match step {
            Step::Pointer { event } => core.on_pointer(&event),
            Step::Tick { now_ms } => core.tick(now_ms),
            Step::Undo => core.undo(),
            Step::Redo => core.redo(),
            Step::Tool { key } => core.set_tool(key.tool()),
            Step::Brush { kind } => core.select_brush(kind),
            Step::Clear => core.clear(),
            Step::ExtendPage => core.extend_page(),
            Step::Save => {
                drop(core);
                if save_now(&engine, &sink).await? {
                    saves += 1;
                }
                continue;
            }
        };
        actions += produced.len();
    }

    if save_now(&engine, &sink).await? {
        saves += 1;
    }
    let core = engine.lock().await;
    info!(
        session_id = %core.session_id(),
        objects = core.doc.len(),
        history = core.history().len(),
        actions,
        saves,
        out = %sink.path().display(),
        "replay finished"
    );
    Ok(())
}
