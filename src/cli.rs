// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};

/// `--color` argument (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorArg {
    #[default]
    Auto,
    Always,
    Never,
}

#[derive(Parser, Debug, Default, Clone)]
pub struct ExecFlags {
    /// Path to a config file, overriding auto-discovery of ~/.echo/config.toml.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Model to use, e.g. "claude-sonnet-4".
    #[arg(long, short = 'm')]
    pub model: Option<String>,
    /// Working directory to run in.
    #[arg(long = "cd", short = 'C')]
    pub cd: Option<PathBuf>,
    /// Initial prompt text. Read from stdin if omitted and stdin is not a tty.
    #[arg(long)]
    pub prompt: Option<String>,
    /// Resume a specific saved session by id.
    #[arg(long)]
    pub session: Option<String>,
    /// Resume the most recently updated session.
    #[arg(long)]
    pub resume_last: bool,
    /// Print saved sessions and exit.
    #[arg(long)]
    pub list_sessions: bool,
    /// Attach a file (read as text) to the initial prompt. May repeat.
    #[arg(long)]
    pub attach: Vec<PathBuf>,
    /// Attach an image by path reference. May repeat.
    #[arg(long)]
    pub image: Vec<PathBuf>,
    /// Reasoning effort hint threaded into the prompt context.
    #[arg(long)]
    pub reasoning_effort: Option<String>,
    /// Per-request timeout in seconds, overriding config.
    #[arg(long)]
    pub timeout: Option<u64>,
    /// Retries on a transient model error, overriding config.
    #[arg(long)]
    pub retries: Option<u32>,
    /// JSON schema the final assistant message must conform to.
    #[arg(long)]
    pub output_schema: Option<PathBuf>,
    /// Colorize human-readable output.
    #[arg(long, value_enum, default_value_t = ColorArg::Auto)]
    pub color: ColorArg,
    /// Emit JSONL events to stdout instead of human-readable lines.
    #[arg(long)]
    pub json: bool,
    /// Write the final assistant message to this file.
    #[arg(long)]
    pub output_last_message: Option<PathBuf>,
    /// Run a shell command as the turn's only input.
    #[arg(long)]
    pub run: Option<String>,
    /// Apply a patch file directly via the apply_patch tool, skipping the model.
    #[arg(long)]
    pub apply_patch: Option<PathBuf>,
    /// Skip the check that the working directory is inside a git repository.
    #[arg(long)]
    pub skip_git_repo_check: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ExecMode {
    /// Resume the most recent session and run headlessly.
    Resume,
    /// Run headlessly with `context.review_mode = true`.
    Review,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run one turn headlessly, emitting JSONL events (§4.8).
    Exec {
        #[command(subcommand)]
        mode: Option<ExecMode>,
        #[command(flatten)]
        flags: ExecFlags,
    },
    /// Open the interactive TUI, resuming a saved session.
    Resume {
        #[command(flatten)]
        flags: ExecFlags,
    },
    /// Open the interactive TUI with `context.review_mode = true`.
    Review {
        #[command(flatten)]
        flags: ExecFlags,
    },
    /// Print or establish auth state.
    Login {
        /// Print the current auth status instead of writing a token.
        #[arg(long)]
        status: bool,
        /// Read the API key from stdin rather than ANTHROPIC_AUTH_TOKEN.
        #[arg(long)]
        with_api_key: bool,
    },
    /// Remove the stored auth token.
    Logout,
    /// Apply a patch file via the apply_patch tool, outside of a model turn.
    Apply {
        file: PathBuf,
        #[arg(long = "cd", short = 'C')]
        cd: Option<PathBuf>,
    },
    /// Check connectivity to the configured model endpoint.
    Ping,
    /// Print a shell completion script.
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
    /// Print the feature flags --enable/--disable accept.
    Features,
    /// Out of core scope: delegates to an external execution-policy binary.
    Execpolicy,
    /// Out of core scope: delegates to an external sandbox binary.
    Sandbox,
    /// Out of core scope: delegates to an external MCP server/client binary.
    Mcp,
    /// Out of core scope: delegates to an external cloud-sync binary.
    Cloud,
    /// Out of core scope: delegates to an external stdio-to-UDS bridge.
    StdioToUds,
    /// Out of core scope: delegates to an external Responses API proxy.
    ResponsesProxy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
}

impl From<CompletionShell> for Shell {
    fn from(value: CompletionShell) -> Self {
        match value {
            CompletionShell::Bash => Shell::Bash,
            CompletionShell::Zsh => Shell::Zsh,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "echo", about = "An agentic CLI coding assistant", version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Flags usable when no subcommand is given; bare `echo` launches the
    /// interactive TUI with these as its initial options.
    #[command(flatten)]
    pub flags: ExecFlags,

    /// `key=value` runtime config override. Repeatable.
    #[arg(short = 'c', long = "config-override", value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,

    /// Enable a named feature flag. Repeatable.
    #[arg(long)]
    pub enable: Vec<String>,

    /// Disable a named feature flag. Repeatable.
    #[arg(long)]
    pub disable: Vec<String>,

    /// Increase log verbosity (-v = debug, -vv = trace). Interactive mode
    /// ignores this unless ECHO_LOG_FILE is also set, to avoid corrupting
    /// the TUI display.
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn is_interactive(&self) -> bool {
        !matches!(
            self.command,
            Some(Commands::Exec { .. })
                | Some(Commands::Login { .. })
                | Some(Commands::Logout)
                | Some(Commands::Apply { .. })
                | Some(Commands::Ping)
                | Some(Commands::Completion { .. })
                | Some(Commands::Features)
                | Some(Commands::Execpolicy)
                | Some(Commands::Sandbox)
                | Some(Commands::Mcp)
                | Some(Commands::Cloud)
                | Some(Commands::StdioToUds)
                | Some(Commands::ResponsesProxy)
        )
    }
}

pub fn print_completions(shell: CompletionShell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(Shell::from(shell), &mut cmd, name, &mut std::io::stdout());
}

/// The feature flags this build recognizes via `--enable`/`--disable`.
pub const KNOWN_FEATURES: &[&str] = &["attachments", "apply_patch", "plan_tool", "auto_compact"];
