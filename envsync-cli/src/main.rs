//! Operator CLI for the envsync core

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use envsync_core::{
    FileAuditSink, JsonProjectStore, ProcessRunner, RemoteFiles, SyncOrchestrator, WorkspaceFiles,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

#[derive(Parser)]
#[command(
    name = "envsync",
    about = "Fetch, draft, and sync environment configuration files",
    version
)]
struct Args {
    /// Data directory holding projects.json, audit.log, and workspace copies
    #[arg(long, env = "ENVSYNC_DATA_DIR", default_value = "data", value_name = "PATH")]
    data_dir: PathBuf,

    /// Print resolved paths and spawned commands to stderr
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Read the authoritative copy and the workspace draft of a file
    Fetch {
        project: String,
        env: String,
        file: String,
    },
    /// Save a workspace draft (and mirror it to the tree for local envs)
    Save {
        project: String,
        env: String,
        file: String,
        /// Read the draft content from this file instead of stdin
        #[arg(long, value_name = "PATH")]
        from: Option<PathBuf>,
    },
    /// Push the workspace draft of a file to its remote environment
    Sync {
        project: String,
        env: String,
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(if args.verbose { "debug" } else { "warn" })
        .with_writer(std::io::stderr)
        .init();

    let store = Arc::new(JsonProjectStore::new(&args.data_dir));
    let audit = Arc::new(FileAuditSink::in_data_dir(&args.data_dir));
    let orchestrator = SyncOrchestrator::new(
        store,
        audit,
        WorkspaceFiles::new(args.data_dir.join("workspace")),
        RemoteFiles::new(Arc::new(ProcessRunner)),
    );

    match args.command {
        CliCommand::Fetch { project, env, file } => {
            let result = orchestrator
                .fetch(&project, &env, &file)
                .await
                .with_context(|| format!("failed to fetch {file}"))?;
            print_json(&result)
        }
        CliCommand::Save {
            project,
            env,
            file,
            from,
        } => {
            let content = read_draft_content(from.as_deref()).await?;
            let result = orchestrator
                .save_draft(&project, &env, &file, &content)
                .await
                .with_context(|| format!("failed to save draft of {file}"))?;
            print_json(&result)
        }
        CliCommand::Sync { project, env, file } => {
            let result = orchestrator
                .sync(&project, &env, &file)
                .await
                .with_context(|| format!("failed to sync {file}"))?;
            print_json(&result)
        }
    }
}

async fn read_draft_content(from: Option<&std::path::Path>) -> Result<String> {
    match from {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read draft from {}", path.display())),
        None => {
            let mut content = String::new();
            tokio::io::stdin()
                .read_to_string(&mut content)
                .await
                .context("failed to read draft from stdin")?;
            Ok(content)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
