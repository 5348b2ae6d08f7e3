// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::io::{IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, CompletionShell, ExecFlags, ExecMode, Commands, KNOWN_FEATURES};
use echo_core::{ApprovalHandler, Dispatcher, EngineConfig, EventManager, ExecutionEngine, UserInputHandler};
use echo_model::ModelProvider;
use echo_render::ExecRenderer;
use echo_session::SessionStore;
use echo_tools::ToolPolicy;
use echo_types::{
    Event, EventPayload, EventType, InputContext, InputMessage, SessionRecord, Submission,
    SubmissionOperation, ToolCall, ToolKind,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let is_tui = cli.is_interactive();
    init_logging(cli.verbose, is_tui);
    validate_features(&cli.enable, &cli.disable)?;

    let result = match cli.command.clone() {
        Some(Commands::Exec { mode, flags }) => run_exec(mode, flags, &cli).await,
        Some(Commands::Resume { flags }) => run_tui(flags, true, false).await,
        Some(Commands::Review { flags }) => run_tui(flags, false, true).await,
        Some(Commands::Login { status, with_api_key }) => cmd_login(status, with_api_key).await,
        Some(Commands::Logout) => cmd_logout(),
        Some(Commands::Apply { file, cd }) => cmd_apply(file, cd).await,
        Some(Commands::Ping) => cmd_ping().await,
        Some(Commands::Completion { shell }) => {
            cli::print_completions(shell);
            Ok(())
        }
        Some(Commands::Features) => {
            cmd_features();
            Ok(())
        }
        Some(Commands::Execpolicy) => out_of_scope("execpolicy"),
        Some(Commands::Sandbox) => out_of_scope("sandbox"),
        Some(Commands::Mcp) => out_of_scope("mcp"),
        Some(Commands::Cloud) => out_of_scope("cloud"),
        Some(Commands::StdioToUds) => out_of_scope("stdio-to-uds"),
        Some(Commands::ResponsesProxy) => out_of_scope("responses-proxy"),
        None => run_tui(cli.flags.clone(), false, false).await,
    };

    if let Err(e) = &result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

fn out_of_scope(name: &str) -> anyhow::Result<()> {
    bail!("`{name}` delegates to an external binary and is not part of this core");
}

fn validate_features(enable: &[String], disable: &[String]) -> anyhow::Result<()> {
    for flag in enable.iter().chain(disable.iter()) {
        if !KNOWN_FEATURES.contains(&flag.as_str()) {
            bail!("unknown feature flag '{flag}' (known: {})", KNOWN_FEATURES.join(", "));
        }
    }
    Ok(())
}

// ─── Shared wiring ─────────────────────────────────────────────────────────

/// Resolves `--cd` (or the current directory) and, unless
/// `--skip-git-repo-check` is set, requires it to be inside a git repository
/// (§6 `--skip-git-repo-check`).
fn resolve_workdir(flags: &ExecFlags) -> anyhow::Result<PathBuf> {
    let dir = match &flags.cd {
        Some(p) => p.clone(),
        None => std::env::current_dir().context("determining current directory")?,
    };
    let dir = dir.canonicalize().with_context(|| format!("resolving workdir {}", dir.display()))?;

    if !flags.skip_git_repo_check {
        let mut probe = dir.as_path();
        let mut found = false;
        loop {
            if probe.join(".git").exists() {
                found = true;
                break;
            }
            match probe.parent() {
                Some(parent) => probe = parent,
                None => break,
            }
        }
        if !found {
            bail!(
                "{} is not inside a git repository; pass --skip-git-repo-check to proceed anyway",
                dir.display()
            );
        }
    }
    Ok(dir)
}

fn runtime_config(cli_overrides: &[String]) -> anyhow::Result<echo_config::RuntimeConfig> {
    let mut config = echo_config::RuntimeConfig::default();
    let overrides: anyhow::Result<Vec<(String, String)>> =
        cli_overrides.iter().map(|raw| echo_config::parse_kv(raw)).collect();
    echo_config::apply_overrides(&mut config, &overrides?);
    Ok(config)
}

fn build_provider(
    runtime: &echo_config::RuntimeConfig,
    persisted: &echo_config::PersistedConfig,
    flags: &ExecFlags,
) -> Arc<dyn ModelProvider> {
    let model = flags.model.clone().unwrap_or_else(|| runtime.model.clone());
    if std::env::var("ECHO_MOCK_MODEL").is_ok() {
        return Arc::new(echo_model::MockProvider::new(model));
    }
    Arc::new(echo_model::AnthropicProvider::new(model, persisted.token.clone(), persisted.url.clone()))
}

struct Wired {
    manager: EventManager,
    sq: echo_queue::SqSender,
    dispatcher: Arc<Dispatcher>,
    engine: Arc<ExecutionEngine>,
}

fn wire(
    workdir: &Path,
    runtime: &echo_config::RuntimeConfig,
    persisted: &echo_config::PersistedConfig,
    flags: &ExecFlags,
    interactive: bool,
) -> Wired {
    let tool_timeout = Duration::from_secs(if interactive {
        runtime.tool_timeout_interactive_secs
    } else {
        runtime.tool_timeout_exec_secs
    });
    let registry = echo_tools::shared_default_registry(workdir, tool_timeout);
    // Sandbox/approval policy is out of scope (§1 Non-goals): every call is
    // auto-approved. The `Ask`/`Deny` plumbing still exists end-to-end so a
    // real policy can be dropped in without touching the dispatcher.
    let policy = ToolPolicy::new(&["*".to_string()], &[]);
    let dispatcher = Arc::new(Dispatcher::new(registry, policy));

    let provider = build_provider(runtime, persisted, flags);
    let engine_config = EngineConfig {
        max_tool_rounds: runtime.max_tool_rounds,
        request_timeout: Duration::from_secs(flags.timeout.unwrap_or(runtime.request_timeout_secs)),
        retries: flags.retries.unwrap_or(runtime.retries),
        compaction_threshold: runtime.compaction_threshold,
        compaction_keep_recent: runtime.compaction_keep_recent,
        context_window_tokens: 180_000,
    };
    let engine = Arc::new(ExecutionEngine::new(provider, dispatcher.clone(), engine_config));

    let mut manager = EventManager::new(runtime.sq_capacity);
    manager.register_handler("user_input", Arc::new(UserInputHandler { engine: engine.clone() }));
    manager.register_handler("approval_decision", Arc::new(ApprovalHandler { dispatcher: dispatcher.clone() }));
    let sq = manager.sq_sender();

    Wired { manager, sq, dispatcher, engine }
}

fn resolve_session(
    store: &SessionStore,
    workdir: &Path,
    session_id: &Option<String>,
    resume_last: bool,
) -> anyhow::Result<SessionRecord> {
    if let Some(id) = session_id {
        return store.load(id)?.context(format!("no saved session with id '{id}'"));
    }
    if resume_last {
        if let Some(record) = store.load_last()? {
            return Ok(record);
        }
    }
    Ok(store.new_session(workdir.to_string_lossy()))
}

fn gather_attachments(flags: &ExecFlags, workdir: &Path) -> anyhow::Result<Vec<InputMessage>> {
    let mut out = Vec::new();
    for path in flags.attach.iter().chain(flags.image.iter()) {
        let resolved = if path.is_absolute() { path.clone() } else { workdir.join(path) };
        out.push(echo_session::read_attachment(&resolved).with_context(|| format!("reading attachment {}", path.display()))?);
    }
    Ok(out)
}

fn build_input_context(
    session_id: &str,
    model: &str,
    workdir: &Path,
    echo_home: &Path,
    flags: &ExecFlags,
    review_mode: bool,
    attachments: Vec<InputMessage>,
) -> anyhow::Result<InputContext> {
    let output_schema = match &flags.output_schema {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading output schema {}", path.display()))?;
            Some(serde_json::from_str(&text).with_context(|| format!("parsing output schema {}", path.display()))?)
        }
        None => None,
    };
    let instructions = echo_session::discover_instructions(workdir, echo_home);
    Ok(InputContext {
        session_id: session_id.to_string(),
        model: Some(model.to_string()),
        system: None,
        output_schema,
        instructions,
        language: None,
        reasoning_effort: flags.reasoning_effort.clone(),
        review_mode,
        attachments,
        metadata: Default::default(),
    })
}

// ─── exec (§4.8, §6) ────────────────────────────────────────────────────────

async fn run_exec(mode: Option<ExecMode>, flags: ExecFlags, cli: &Cli) -> anyhow::Result<()> {
    let workdir = resolve_workdir(&flags)?;
    let echo_home = echo_config::echo_home()?;
    let persisted = echo_config::load(flags.config.as_deref())?;
    let runtime = runtime_config(&cli.overrides)?;

    let store = SessionStore::new(&echo_home);
    if flags.list_sessions {
        for record in store.list()? {
            println!("{}  {}  {}", record.id, record.updated_at.to_rfc3339(), record.workdir);
        }
        return Ok(());
    }

    let resume_last = flags.resume_last || matches!(mode, Some(ExecMode::Resume));
    let review_mode = matches!(mode, Some(ExecMode::Review));
    let mut session = resolve_session(&store, &workdir, &flags.session, resume_last)?;

    let Wired { mut manager, sq, dispatcher, engine } = wire(&workdir, &runtime, &persisted, &flags, false);
    engine.seed_history(&session.id, &session.messages);

    let eq = manager.eq();
    let mut subscriber = eq.subscribe().context("event queue already closed")?;
    let manager_task = tokio::spawn(async move {
        manager.run().await;
    });

    let model = flags.model.clone().unwrap_or_else(|| runtime.model.clone());
    let mut renderer = ExecRenderer::new(uuid::Uuid::new_v4().to_string(), session.id.clone());
    let mut out = std::io::stdout();
    let json_mode = flags.json;
    let mut last_message = String::new();
    let mut failed = false;

    emit(&mut out, json_mode, &renderer.thread_started())?;

    let prompt_text = resolve_prompt_text(&flags)?;
    if let Some(text) = prompt_text {
        let attachments = gather_attachments(&flags, &workdir)?;
        let context = build_input_context(&session.id, &model, &workdir, &echo_home, &flags, review_mode, attachments)?;
        let submission = Submission::new(
            session.id.clone(),
            SubmissionOperation::UserInput { items: vec![InputMessage::text(text)], context },
        );
        let submission_id = submission.id.clone();
        let cancel = CancellationToken::new();
        manager_submit(&sq, submission, &cancel).await?;

        loop {
            let Some(event) = subscriber.recv().await else { break };
            if event.submission_id != submission_id {
                continue;
            }
            if let EventType::AgentOutput = event.event_type {
                if let EventPayload::AgentOutput(out_ev) = &event.payload {
                    if out_ev.is_final {
                        last_message = out_ev.content.clone();
                    }
                }
            }
            let is_terminal = matches!(event.event_type, EventType::TaskCompleted);
            if matches!(event.event_type, EventType::TaskCompleted) {
                if let EventPayload::TaskCompleted(completed) = &event.payload {
                    failed = matches!(completed.status, echo_types::TaskStatus::Failed);
                }
            }
            for value in renderer.render(&event) {
                emit(&mut out, json_mode, &value)?;
            }
            if is_terminal {
                break;
            }
        }
        session.messages = engine.history(&session.id);
        store.save(&session)?;
    }

    if let Some(command) = &flags.run {
        let call = ToolCall { command: Some(command.clone()), ..ToolCall::new(uuid::Uuid::new_v4().to_string(), ToolKind::Command) };
        dispatcher.dispatch(call, &eq, "exec-run", &session.id).await;
        drain(&mut subscriber, &mut renderer, &mut out, json_mode)?;
    }

    if let Some(patch_file) = &flags.apply_patch {
        let patch = std::fs::read_to_string(patch_file).with_context(|| format!("reading patch file {}", patch_file.display()))?;
        let call = ToolCall { patch: Some(patch), ..ToolCall::new(uuid::Uuid::new_v4().to_string(), ToolKind::ApplyPatch) };
        dispatcher.dispatch(call, &eq, "exec-apply-patch", &session.id).await;
        drain(&mut subscriber, &mut renderer, &mut out, json_mode)?;
    }

    if let Some(path) = &flags.output_last_message {
        std::fs::write(path, &last_message).with_context(|| format!("writing {}", path.display()))?;
    }

    drop(manager_task);
    if failed {
        bail!("turn failed");
    }
    Ok(())
}

async fn manager_submit(sq: &echo_queue::SqSender, submission: Submission, cancel: &CancellationToken) -> anyhow::Result<()> {
    sq.submit(submission, cancel).await.map_err(|e| anyhow::anyhow!("submitting turn: {e}"))
}

fn drain(
    subscriber: &mut tokio::sync::mpsc::Receiver<Event>,
    renderer: &mut ExecRenderer,
    out: &mut impl Write,
    json_mode: bool,
) -> anyhow::Result<()> {
    while let Ok(event) = subscriber.try_recv() {
        for value in renderer.render(&event) {
            emit(out, json_mode, &value)?;
        }
    }
    Ok(())
}

fn emit(out: &mut impl Write, json_mode: bool, value: &serde_json::Value) -> anyhow::Result<()> {
    if json_mode {
        writeln!(out, "{value}")?;
    } else if let Some(line) = ExecRenderer::human_line(value) {
        eprintln!("{line}");
    }
    Ok(())
}

fn resolve_prompt_text(flags: &ExecFlags) -> anyhow::Result<Option<String>> {
    if let Some(prompt) = &flags.prompt {
        return Ok(Some(prompt.clone()));
    }
    if flags.run.is_some() || flags.apply_patch.is_some() {
        return Ok(None);
    }
    if !std::io::stdin().is_terminal() {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text).context("reading prompt from stdin")?;
        let text = text.trim().to_string();
        if !text.is_empty() {
            return Ok(Some(text));
        }
    }
    Ok(None)
}

// ─── interactive TUI (§4.7) ─────────────────────────────────────────────────

async fn run_tui(flags: ExecFlags, resume: bool, review_mode: bool) -> anyhow::Result<()> {
    let workdir = resolve_workdir(&flags)?;
    let echo_home = echo_config::echo_home()?;
    let persisted = echo_config::load(flags.config.as_deref())?;
    let runtime = runtime_config(&[])?;

    let store = SessionStore::new(&echo_home);
    let resume_last = resume || flags.resume_last;
    let session = resolve_session(&store, &workdir, &flags.session, resume_last)?;

    let Wired { mut manager, sq, dispatcher: _dispatcher, engine } = wire(&workdir, &runtime, &persisted, &flags, true);
    engine.seed_history(&session.id, &session.messages);

    let model = flags.model.clone().unwrap_or_else(|| runtime.model.clone());
    let mut instructions = echo_session::discover_instructions(&workdir, &echo_home);
    if review_mode {
        instructions.insert(0, "You are in review mode: focus on correctness, do not make changes unless asked.".to_string());
    }

    let eq = manager.eq();
    let eq_rx = eq.subscribe().context("event queue already closed")?;
    let manager_task = tokio::spawn(async move {
        manager.run().await;
    });

    let cancel = CancellationToken::new();
    let opts = echo_tui::AppOptions { model, workdir, echo_home, instructions };
    let mut app = echo_tui::App::new(opts, session, store, sq, eq_rx, cancel);

    if let Some(prompt) = &flags.prompt {
        app.submit_text(prompt.clone()).await?;
    }

    install_panic_hook();
    let mut terminal = ratatui::init();
    let result = app.run(&mut terminal).await;
    ratatui::restore();
    drop(manager_task);
    result
}

fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        ratatui::restore();
        original_hook(info);
    }));
}

// ─── login / logout / apply / ping / features ──────────────────────────────

async fn cmd_login(status: bool, with_api_key: bool) -> anyhow::Result<()> {
    if status {
        let config = echo_config::load(None)?;
        match (&config.url, &config.token) {
            (_, Some(_)) => println!("logged in (token present, url={})", config.url.as_deref().unwrap_or("default")),
            (_, None) => println!("not logged in"),
        }
        return Ok(());
    }

    let token = if with_api_key {
        print!("API key: ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        line.trim().to_string()
    } else {
        std::env::var("ANTHROPIC_AUTH_TOKEN").context("ANTHROPIC_AUTH_TOKEN not set; pass --with-api-key to enter one interactively")?
    };
    if token.is_empty() {
        bail!("no API key provided");
    }

    let mut config = echo_config::load(None)?;
    config.token = Some(token);
    echo_config::save(&config, None)?;
    println!("saved credentials to {}", echo_config::config_path(None)?.display());
    Ok(())
}

fn cmd_logout() -> anyhow::Result<()> {
    let mut config = echo_config::load(None)?;
    config.token = None;
    echo_config::save(&config, None)?;
    println!("logged out");
    Ok(())
}

async fn cmd_apply(file: PathBuf, cd: Option<PathBuf>) -> anyhow::Result<()> {
    let workdir = match cd {
        Some(p) => p,
        None => std::env::current_dir()?,
    };
    let patch = std::fs::read_to_string(&file).with_context(|| format!("reading patch file {}", file.display()))?;
    let registry = echo_tools::default_registry(&workdir, Duration::from_secs(30));
    let call = ToolCall { patch: Some(patch), ..ToolCall::new(uuid::Uuid::new_v4().to_string(), ToolKind::ApplyPatch) };
    let result = registry.execute(&call).await;
    match result.status {
        echo_types::ToolStatus::Completed => {
            println!("{}", result.output.unwrap_or_default());
            Ok(())
        }
        _ => bail!(result.error.unwrap_or_else(|| "apply_patch failed".to_string())),
    }
}

async fn cmd_ping() -> anyhow::Result<()> {
    let persisted = echo_config::load(None)?;
    let runtime = runtime_config(&[])?;
    let provider = build_provider(&runtime, &persisted, &ExecFlags::default());
    let request = echo_model::CompletionRequest { messages: vec![echo_model::Message::user("ping")], tools: vec![], stream: true };
    provider.complete(request).await.context("connecting to model endpoint")?;
    println!("ok: {} ({})", provider.name(), provider.model_name());
    Ok(())
}

fn cmd_features() {
    for feature in KNOWN_FEATURES {
        println!("{feature}");
    }
}

// ─── logging (§9 "Global process state") ───────────────────────────────────

fn init_logging(verbosity: u8, is_tui: bool) {
    if is_tui {
        if let Ok(log_path) = std::env::var("ECHO_LOG_FILE") {
            use std::sync::Mutex;
            if let Ok(file) = std::fs::OpenOptions::new().create(true).append(true).open(&log_path) {
                let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
                let _ = tracing_subscriber::registry()
                    .with(fmt::layer().with_target(true).with_ansi(false).with_writer(Mutex::new(file)))
                    .with(filter)
                    .try_init();
                return;
            }
        }
        let _ = tracing_subscriber::registry().with(tracing_subscriber::filter::LevelFilter::OFF).try_init();
        return;
    }

    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
