// sheetpilot CLI - headless driver for the command sync engine

mod exit_codes;
mod remote;

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use sheetpilot_engine::workbook::Workbook;
use sheetpilot_sync::apply::{apply_batch, BatchReport};

use exit_codes::{
    hub_exit_code, sync_exit_code, EXIT_APPLY_PARTIAL, EXIT_IO, EXIT_PARSE, EXIT_SUCCESS,
    EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "sheetpilot")]
#[command(about = "Apply AI edit commands to spreadsheets and sync them with the document backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Which stored document a remote command acts on.
#[derive(Args, Debug, Clone)]
pub struct DocArgs {
    /// Document id
    #[arg(long, env = "SHEETPILOT_DOCUMENT_ID")]
    pub document: String,

    /// Chat id the document belongs to
    #[arg(long, env = "SHEETPILOT_CHAT_ID", default_value = "")]
    pub chat: String,

    /// User id (defaults to the one saved by `login`)
    #[arg(long, env = "SHEETPILOT_USER_ID")]
    pub user: Option<String>,

    /// API token (defaults to the one saved by `login`)
    #[arg(long, env = "SHEETPILOT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Backend base URL (defaults to settings, then saved credentials)
    #[arg(long)]
    pub api_base: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a batch of edit commands to a snapshot, offline
    #[command(after_help = "\
Examples:
  sheetpilot apply commands.json --snapshot doc.json -o doc.out.json
  cat frame.json | sheetpilot apply - --snapshot doc.json
  sheetpilot apply commands.json            # start from a blank workbook

The batch may be a JSON array of commands, an object with `dataEditCommands`,
or a whole `ai_tasks_executed` frame. Skipped commands are listed on stderr
and the exit code is 10.")]
    Apply {
        /// Command batch file, or - for stdin
        commands: PathBuf,

        /// Snapshot to start from (blank workbook if omitted)
        #[arg(long, short = 's')]
        snapshot: Option<PathBuf>,

        /// Write the resulting snapshot here instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Print nothing to stderr
        #[arg(long, short = 'q')]
        quiet: bool,
    },

    /// Fetch a document from the backend and print its snapshot
    #[command(after_help = "\
Examples:
  sheetpilot load --document doc-42 --chat chat-7
  sheetpilot load --document doc-42 --chat chat-7 -o doc.json")]
    Load {
        #[command(flatten)]
        doc: DocArgs,

        /// Write the snapshot here instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Save a snapshot as the document's next version
    #[command(after_help = "\
Examples:
  sheetpilot save doc.json --document doc-42 --chat chat-7

The current lock version is fetched first. Exit code 23 means the document
was changed elsewhere since; load it again before saving.")]
    Save {
        /// Snapshot file to save
        snapshot: PathBuf,

        #[command(flatten)]
        doc: DocArgs,
    },

    /// Rename a document
    #[command(after_help = "\
Examples:
  sheetpilot rename 'Q3 Budget' --document doc-42")]
    Rename {
        /// New file name
        name: String,

        #[command(flatten)]
        doc: DocArgs,
    },

    /// Roll a document back to a conversation branch
    #[command(after_help = "\
Examples:
  sheetpilot rollback b1 --document doc-42 --chat chat-7
  sheetpilot rollback b1 --document doc-42 --chat chat-7 -o restored.json

Prints the restored snapshot. The parent branch for the next message is
reported on stderr.")]
    Rollback {
        /// Branch id to restore
        branch: String,

        #[command(flatten)]
        doc: DocArgs,

        /// Write the restored snapshot here instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Save backend credentials
    #[command(after_help = "\
Examples:
  sheetpilot login --token sk_live_... --user user-1
  SHEETPILOT_TOKEN=sk_live_... sheetpilot login --api-base http://localhost:8080")]
    Login {
        /// API token
        #[arg(long, env = "SHEETPILOT_TOKEN", hide_env_values = true)]
        token: String,

        /// Backend base URL (defaults to settings)
        #[arg(long)]
        api_base: Option<String>,

        /// User id sent with every request
        #[arg(long)]
        user: Option<String>,
    },

    /// Remove saved credentials
    Logout,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Apply { commands, snapshot, output, quiet } => cmd_apply(commands, snapshot, output, quiet),
        Commands::Load { doc, output } => remote::cmd_load(&doc, output),
        Commands::Save { snapshot, doc } => remote::cmd_save(&doc, snapshot),
        Commands::Rename { name, doc } => remote::cmd_rename(&doc, &name),
        Commands::Rollback { branch, doc, output } => remote::cmd_rollback(&doc, &branch, output),
        Commands::Login { token, api_base, user } => remote::cmd_login(token, api_base, user),
        Commands::Logout => remote::cmd_logout(),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self { code: EXIT_PARSE, message: msg.into(), hint: None }
    }

    pub fn sync(err: sheetpilot_sync::SyncError) -> Self {
        let code = sync_exit_code(&err);
        let hint = match &err {
            sheetpilot_sync::SyncError::StaleVersionConflict { .. } => {
                Some("the document was changed elsewhere; load it again and reapply your edits".to_string())
            }
            sheetpilot_sync::SyncError::RollbackFailure(_) => {
                Some("nothing was changed; check the branch id".to_string())
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    pub fn hub(err: sheetpilot_hub_client::HubError) -> Self {
        let hint = match &err {
            sheetpilot_hub_client::HubError::NotAuthenticated => {
                Some("pass --token or run `sheetpilot login`".to_string())
            }
            _ => None,
        };
        Self { code: hub_exit_code(&err), message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// Shared I/O
// ============================================================================

pub fn read_input(path: &PathBuf) -> Result<String, CliError> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| CliError::io(format!("stdin: {}", e)))?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).map_err(|e| CliError::io(format!("{}: {}", path.display(), e)))
}

pub fn read_snapshot(path: &PathBuf) -> Result<Workbook, CliError> {
    let text = read_input(path)?;
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| CliError::parse(format!("{}: {}", path.display(), e)))?;
    Workbook::from_json(&value).map_err(|e| CliError::parse(format!("{}: {}", path.display(), e)))
}

pub fn write_output(value: &Value, output: Option<&PathBuf>) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CliError::io(e.to_string()))?;
    match output {
        Some(path) => std::fs::write(path, format!("{}\n", text))
            .map_err(|e| CliError::io(format!("{}: {}", path.display(), e))),
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{}", text).map_err(|e| CliError::io(e.to_string()))
        }
    }
}

// ============================================================================
// apply
// ============================================================================

/// Pull the command list out of any of the accepted batch shapes.
fn extract_commands(value: Value) -> Result<Vec<Value>, CliError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut obj) => {
            if let Some(Value::Array(items)) = obj.remove("dataEditCommands") {
                return Ok(items);
            }
            if let Some(Value::Object(mut res)) = obj.remove("dataEditChatRes") {
                if let Some(Value::Array(items)) = res.remove("dataEditCommands") {
                    return Ok(items);
                }
            }
            Err(CliError::parse("no dataEditCommands list found"))
        }
        _ => Err(CliError::parse("command batch must be a JSON array or object")),
    }
}

fn print_report(report: &BatchReport) {
    eprintln!(
        "applied {}, ignored {}, skipped {}",
        report.applied,
        report.ignored,
        report.failures.len()
    );
    for failure in &report.failures {
        eprintln!("  command {}: {}", failure.index + 1, failure.error);
    }
}

fn cmd_apply(
    commands: PathBuf,
    snapshot: Option<PathBuf>,
    output: Option<PathBuf>,
    quiet: bool,
) -> Result<(), CliError> {
    if snapshot.as_ref().is_some_and(|s| s.as_os_str() == "-") && commands.as_os_str() == "-" {
        return Err(CliError::args("only one of the batch and the snapshot can come from stdin"));
    }

    let mut workbook = match &snapshot {
        Some(path) => read_snapshot(path)?,
        None => Workbook::new(),
    };
    let text = read_input(&commands)?;
    let batch: Value = serde_json::from_str(&text)
        .map_err(|e| CliError::parse(format!("{}: {}", commands.display(), e)))?;
    let batch = extract_commands(batch)?;

    let report = apply_batch(&mut workbook, &batch);
    write_output(&workbook.to_json(), output.as_ref())?;

    if !quiet {
        print_report(&report);
    }
    if report.is_clean() {
        Ok(())
    } else {
        Err(CliError { code: EXIT_APPLY_PARTIAL, message: String::new(), hint: None })
    }
}
