#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only output and panic-based assertions are permitted."
    )
)]
// crates/spec-desk-cli/src/main.rs
// ============================================================================
// Module: Spec Desk CLI Entry Point
// Description: Command dispatcher for cortex route planning and run passes.
// Purpose: Provide an offline-safe CLI emitting JSON reports to stdout.
// Dependencies: clap, spec-desk-core, spec-desk-cortex, serde, tokio, tracing
// ============================================================================

//! ## Overview
//! The Spec Desk CLI exposes the cortex surface: `cortex-route-plan` computes
//! a deep-task routing plan without executing, and `cortex-run-pass` runs one
//! aggressive-mode pass against the deterministic local toolset. Both emit
//! JSON to stdout and exit non-zero on argument or execution failure.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod local_tools;
mod storage;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use spec_desk_core::RunId;
use spec_desk_cortex::CortexConfig;
use spec_desk_cortex::CortexMode;
use spec_desk_cortex::DEFAULT_MAX_DEEP_FIELDS;
use spec_desk_cortex::DEFAULT_TOOL_TIMEOUT_MS;
use spec_desk_cortex::DeepTask;
use spec_desk_cortex::ENV_CORTEX_ENABLED;
use spec_desk_cortex::ENV_CORTEX_MAX_DEEP_FIELDS;
use spec_desk_cortex::Orchestrator;
use spec_desk_cortex::ProductRecord;
use spec_desk_cortex::RouteContext;
use spec_desk_cortex::ToolSet;
use spec_desk_cortex::TraceWriter;
use spec_desk_cortex::plan_routes;
use thiserror::Error;

use crate::local_tools::LocalToolSet;
use crate::storage::FsArtifactStore;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "spec-desk", disable_help_subcommand = true, arg_required_else_help = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute a deep-task routing plan without executing it.
    CortexRoutePlan(CortexArgs),
    /// Run one aggressive-mode pass with the local toolset.
    CortexRunPass(CortexArgs),
}

/// Shared arguments for the cortex subcommands.
#[derive(Args, Debug)]
struct CortexArgs {
    /// Path to the tasks (or product record) JSON input.
    #[arg(long = "tasks-json")]
    tasks_json: PathBuf,
    /// Path to the context JSON input.
    #[arg(long = "context-json")]
    context_json: PathBuf,
    /// Force local-only execution.
    #[arg(long = "local", action = ArgAction::SetTrue)]
    local: bool,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI errors mapped to exit codes.
#[derive(Debug, Error)]
enum CliError {
    /// Malformed arguments or inputs.
    #[error("usage error: {0}")]
    Usage(String),
    /// Execution failed after valid inputs.
    #[error("execution error: {0}")]
    Execution(String),
}

impl CliError {
    /// Returns the process exit code for the error.
    fn exit_code(&self) -> ExitCode {
        match self {
            Self::Usage(_) => ExitCode::from(2),
            Self::Execution(_) => ExitCode::FAILURE,
        }
    }
}

// ============================================================================
// SECTION: Run Context
// ============================================================================

/// Context input for `cortex-run-pass`.
#[derive(Debug, Clone, Deserialize)]
struct RunPassContext {
    /// Run identifier for trace output.
    run_id: RunId,
    /// Orchestration mode.
    #[serde(default)]
    mode: CortexMode,
    /// Per-product deep task cap.
    #[serde(default = "default_deep_cap")]
    max_deep_fields_per_product: u32,
    /// Per-call tool timeout in milliseconds.
    #[serde(default = "default_tool_timeout_ms")]
    tool_timeout_ms: u64,
    /// Output root directory for traces.
    #[serde(default = "default_output_root")]
    output_root: String,
}

/// Returns the default deep-task cap.
const fn default_deep_cap() -> u32 {
    DEFAULT_MAX_DEEP_FIELDS
}

/// Returns the default tool timeout.
const fn default_tool_timeout_ms() -> u64 {
    DEFAULT_TOOL_TIMEOUT_MS
}

/// Returns the default output root.
fn default_output_root() -> String {
    "out".to_string()
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::CortexRoutePlan(args) => run_route_plan(&args),
        Commands::CortexRunPass(args) => run_run_pass(&args).await,
    };
    match result {
        Ok(value) => match emit(&value) {
            Ok(()) => ExitCode::SUCCESS,
            Err(error) => {
                tracing::error!(%error, "failed to emit output");
                error.exit_code()
            }
        },
        Err(error) => {
            tracing::error!(%error, "command failed");
            error.exit_code()
        }
    }
}

/// Executes `cortex-route-plan`.
fn run_route_plan(args: &CortexArgs) -> Result<serde_json::Value, CliError> {
    let tasks: Vec<DeepTask> = read_json_input(&args.tasks_json)?;
    let mut context: RouteContext = read_json_input(&args.context_json)?;
    if let Some(cap) = env_u32(ENV_CORTEX_MAX_DEEP_FIELDS) {
        context.max_deep_fields_per_product = cap;
    }
    if args.local {
        context.local_only = true;
    }
    let plan = plan_routes(&tasks, &context);
    serde_json::to_value(&plan).map_err(|err| CliError::Execution(err.to_string()))
}

/// Executes `cortex-run-pass`.
async fn run_run_pass(args: &CortexArgs) -> Result<serde_json::Value, CliError> {
    let mut record: ProductRecord = read_json_input(&args.tasks_json)?;
    let context: RunPassContext = read_json_input(&args.context_json)?;

    let mut config = CortexConfig {
        mode: context.mode,
        max_deep_fields_per_product: context.max_deep_fields_per_product,
        tool_timeout_ms: context.tool_timeout_ms,
    };
    if env_flag(ENV_CORTEX_ENABLED) == Some(false) {
        config.mode = CortexMode::Disabled;
    }
    if let Some(cap) = env_u32(ENV_CORTEX_MAX_DEEP_FIELDS) {
        config.max_deep_fields_per_product = cap;
    }

    let store = FsArtifactStore::new(&context.output_root);
    let trace = TraceWriter::new(store, context.run_id.clone());
    let tools = LocalToolSet;
    let toolset = ToolSet {
        auditor: &tools,
        rescuer: &tools,
        resolver: &tools,
        cortex: &tools,
    };
    let orchestrator = Orchestrator::new(toolset, &trace, config);
    let report = orchestrator
        .run_pass(&mut record)
        .await
        .map_err(|err| CliError::Execution(err.to_string()))?;
    serde_json::to_value(&report).map_err(|err| CliError::Execution(err.to_string()))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads a JSON input file into its typed shape.
fn read_json_input<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let text = fs::read_to_string(path)
        .map_err(|err| CliError::Usage(format!("cannot read {}: {err}", path.display())))?;
    serde_json::from_str(&text)
        .map_err(|err| CliError::Usage(format!("malformed json {}: {err}", path.display())))
}

/// Writes the JSON result to stdout.
fn emit(value: &serde_json::Value) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::Execution(err.to_string()))?;
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    writeln!(lock, "{text}").map_err(|err| CliError::Execution(err.to_string()))
}

/// Parses a boolean-ish environment flag.
fn env_flag(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parses a numeric environment override.
fn env_u32(name: &str) -> Option<u32> {
    std::env::var(name).ok()?.trim().parse().ok()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
