//! Command-line interface.

pub mod capture_cmd;
pub mod doctor;
pub mod generate_cmd;
pub mod normalize_cmd;
pub mod test_cmd;

use crate::config::Settings;
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use scrapi_core::SchemaSpec;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "scrapi",
    about = "scrapi: turn a web page into a tested data-extraction function",
    version,
    after_help = "Run 'scrapi <command> --help' for details on each command."
)]
pub struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    pub json: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record a page's network traffic into a transcript
    Capture {
        /// Absolute URL to visit
        url: String,
        /// Launch a local headless Chromium instead of a Browserbase session
        #[arg(long)]
        local: bool,
        /// Where to write the transcript
        #[arg(long, default_value = "data/out.json")]
        out: PathBuf,
    },
    /// Capture a page, then synthesize an extraction function from it
    Generate {
        /// Absolute URL to visit
        #[arg(long)]
        url: String,
        /// Launch a local headless Chromium instead of a Browserbase session
        #[arg(long)]
        local: bool,
        #[command(flatten)]
        task: TaskArgs,
    },
    /// Synthesize an extraction function from a saved transcript
    Synthesize {
        /// Transcript written by `scrapi capture`
        #[arg(long)]
        transcript: PathBuf,
        #[command(flatten)]
        task: TaskArgs,
    },
    /// Run one candidate through the test executor
    Test {
        /// Candidate source file
        #[arg(long)]
        script: PathBuf,
        #[command(flatten)]
        schema: SchemaArgs,
    },
    /// Print a payload file the way captured bodies are normalized
    Normalize {
        /// File to normalize
        file: PathBuf,
    },
    /// Serve the run-test API
    Serve {
        /// Port to listen on
        #[arg(long, default_value_t = 8787)]
        port: u16,
    },
    /// Check environment and configuration
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish)
        shell: Shell,
    },
}

/// Declared schemas and example input. A value starting with `@` is read
/// from the named file.
#[derive(Args, Debug, Clone)]
pub struct SchemaArgs {
    /// Input schema, e.g. `{event_id: string}`
    #[arg(long, default_value = "")]
    pub input_schema: String,
    /// Output schema, e.g. `array<{name: string(1..), picture_url?: string}>`
    #[arg(long)]
    pub output_schema: String,
    /// Example input, as a JS object literal
    #[arg(long, default_value = "{}")]
    pub example_args: String,
}

impl SchemaArgs {
    pub fn to_spec(&self) -> Result<SchemaSpec> {
        Ok(SchemaSpec {
            input_schema: read_arg(&self.input_schema)?,
            output_schema: read_arg(&self.output_schema)?,
            example_args: read_arg(&self.example_args)?,
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct TaskArgs {
    /// What the function should extract
    #[arg(long)]
    pub prompt: String,
    #[command(flatten)]
    pub schema: SchemaArgs,
    /// Directory for the generated function and the attempt report
    #[arg(long, default_value = "out")]
    pub out_dir: PathBuf,
    /// Do not append attempts to ~/.scrapi/attempts.jsonl
    #[arg(long)]
    pub no_trail: bool,
}

fn read_arg(value: &str) -> Result<String> {
    match value.strip_prefix('@') {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))
        }
        None => Ok(value.to_string()),
    }
}

/// Run the parsed command.
pub async fn run(cli: Cli) -> Result<()> {
    let json = cli.json;
    let settings = cli.settings;
    match cli.command {
        Commands::Capture { url, local, out } => {
            capture_cmd::run(&settings, &url, local, &out, json).await
        }
        Commands::Generate { url, local, task } => {
            generate_cmd::run_generate(&settings, &url, local, &task, json).await
        }
        Commands::Synthesize { transcript, task } => {
            generate_cmd::run_synthesize(&settings, &transcript, &task, json).await
        }
        Commands::Test { script, schema } => test_cmd::run(&settings, &script, &schema, json).await,
        Commands::Normalize { file } => normalize_cmd::run(&file),
        Commands::Serve { port } => crate::server::start(port, settings.executor()).await,
        Commands::Doctor => doctor::run(&settings, json),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "scrapi", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(_) => println!("{value}"),
    }
}
