// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The interactive terminal application (§4.7): owns the transcript,
//! composer, viewport, plan/approval overlays, and drives the EQ/SQ pair
//! through one render loop, matching the shape of the teacher's
//! `sven-tui::app` event loop (`crossterm::EventStream` merged via
//! `tokio::select!` against the agent's own event channel and a tick).

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crossterm::event::{Event as CtEvent, EventStream, KeyCode, KeyEvent, KeyModifiers};
use echo_core::Transcript;
use echo_queue::SqSender;
use echo_render::{catalog_builtin, SlashAction};
use echo_session::{PromptHistory, SessionStore};
use echo_types::{
    Event as CoreEvent, EventType, InputContext, InputMessage, SessionRecord, Submission, SubmissionOperation,
};
use futures::StreamExt;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::approval::ApprovalQueue;
use crate::composer::{Composer, SubmitOutcome};
use crate::file_search::FileSearch;
use crate::help::help_lines;
use crate::layout::AppLayout;
use crate::plan::PlanSection;
use crate::render::TuiEventRenderer;
use crate::session_picker::SessionPicker;
use crate::slash_overlay::SlashOverlay;
use crate::viewport::DiffAwareViewport;

/// Which overlay currently has input focus, if any. Approval modals are
/// not part of this enum — they always take priority whenever one is
/// pending, independent of whatever else is open (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Overlay {
    None,
    Slash,
    FileSearch,
    SessionPicker,
    Help,
}

/// Construction-time parameters, analogous to the teacher's `AppOptions`.
pub struct AppOptions {
    pub model: String,
    pub workdir: PathBuf,
    pub echo_home: PathBuf,
    pub instructions: Vec<String>,
}

pub struct App {
    opts: AppOptions,
    session: SessionRecord,
    session_store: SessionStore,
    history: PromptHistory,

    sq: SqSender,
    eq_rx: mpsc::Receiver<CoreEvent>,
    cancel: CancellationToken,

    transcript: Transcript,
    plan: PlanSection,
    viewport: DiffAwareViewport,
    composer: Composer,
    approvals: ApprovalQueue,
    renderer: TuiEventRenderer,

    overlay: Overlay,
    slash: SlashOverlay,
    file_search: FileSearch,
    file_search_query: String,
    session_picker: Option<SessionPicker>,

    turn_pending: bool,
    turn_started_at: Option<Instant>,
    spinner_frame: usize,
    should_quit: bool,
}

const SPINNER_FRAMES: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
const TICK: Duration = Duration::from_millis(120);

impl App {
    pub fn new(
        opts: AppOptions,
        session: SessionRecord,
        session_store: SessionStore,
        sq: SqSender,
        eq_rx: mpsc::Receiver<CoreEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let history = PromptHistory::new(&opts.echo_home);
        let mut composer = Composer::new();
        composer.set_history(history.load().unwrap_or_default().into_iter().map(|e| e.text).collect());

        let mut transcript = Transcript::new();
        transcript.load_messages(&session.messages);

        let file_search = FileSearch::new(&opts.workdir);

        Self {
            opts,
            session,
            session_store,
            history,
            sq,
            eq_rx,
            cancel,
            transcript,
            plan: PlanSection::new(),
            viewport: DiffAwareViewport::new(80, 24),
            composer,
            approvals: ApprovalQueue::new(),
            renderer: TuiEventRenderer::new(),
            overlay: Overlay::None,
            slash: SlashOverlay::with_catalog(catalog_builtin()),
            file_search,
            file_search_query: String::new(),
            session_picker: None,
            turn_pending: false,
            turn_started_at: None,
            spinner_frame: 0,
            should_quit: false,
        }
    }

    /// Submits the initial prompt, if any, before entering the render loop.
    pub async fn submit_text(&mut self, text: String) -> anyhow::Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }
        self.transcript.append_user(&text);
        let _ = self.history.append(&text);
        let (clean, attachments) = extract_attachments(&text, &self.opts.workdir);
        let context = InputContext {
            session_id: self.session.id.clone(),
            model: Some(self.opts.model.clone()),
            instructions: self.opts.instructions.clone(),
            attachments,
            ..Default::default()
        };
        let submission = Submission::new(
            self.session.id.clone(),
            SubmissionOperation::UserInput { items: vec![InputMessage::text(clean)], context },
        );
        self.sq.submit(submission, &self.cancel).await?;
        self.turn_pending = true;
        self.turn_started_at = Some(Instant::now());
        Ok(())
    }

    pub async fn run(&mut self, terminal: &mut ratatui::DefaultTerminal) -> anyhow::Result<()> {
        let mut crossterm_events = EventStream::new();
        let mut tick = tokio::time::interval(TICK);

        while !self.should_quit {
            terminal.draw(|f| self.draw(f))?;

            tokio::select! {
                maybe_event = crossterm_events.next() => {
                    match maybe_event {
                        Some(Ok(ev)) => self.handle_crossterm(ev).await?,
                        Some(Err(_)) | None => break,
                    }
                }
                event = self.eq_rx.recv() => {
                    match event {
                        Some(ev) => self.handle_core_event(ev),
                        None => break,
                    }
                }
                _ = tick.tick() => {
                    self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAMES.len();
                }
            }
        }
        Ok(())
    }

    fn handle_core_event(&mut self, event: CoreEvent) {
        if event.event_type == EventType::ToolEvent {
            if let echo_types::EventPayload::ToolEvent(tool_event) = &event.payload {
                if tool_event.result.status == echo_types::ToolStatus::RequiresApproval {
                    let id = tool_event.result.approval_id.clone().unwrap_or_default();
                    let reason = tool_event.result.approval_reason.clone().unwrap_or_default();
                    self.approvals.enqueue(id, reason);
                }
            }
        }
        let is_completion = matches!(event.event_type, EventType::TaskCompleted);
        self.renderer.apply(&event, &mut self.transcript, &mut self.plan);
        if is_completion {
            self.turn_pending = false;
            self.turn_started_at = None;
            self.session.messages = self.transcript.messages().to_vec();
            let _ = self.session_store.save(&self.session);
            self.drain_queue();
        }
    }

    fn drain_queue(&mut self) {
        if self.turn_pending {
            return;
        }
        if let Some(next) = self.composer.pop_queued() {
            // submit_text is async; queued drains happen from the sync tick
            // path so we spawn it rather than block the render loop.
            let text = next;
            tokio::spawn({
                let sq = self.sq.clone();
                let cancel = self.cancel.clone();
                let session_id = self.session.id.clone();
                let model = self.opts.model.clone();
                let instructions = self.opts.instructions.clone();
                let workdir = self.opts.workdir.clone();
                async move {
                    let (clean, attachments) = extract_attachments(&text, &workdir);
                    let context = InputContext {
                        session_id: session_id.clone(),
                        model: Some(model),
                        instructions,
                        attachments,
                        ..Default::default()
                    };
                    let submission = Submission::new(
                        session_id,
                        SubmissionOperation::UserInput { items: vec![InputMessage::text(clean)], context },
                    );
                    let _ = sq.submit(submission, &cancel).await;
                }
            });
            self.turn_pending = true;
            self.turn_started_at = Some(Instant::now());
        }
    }

    async fn handle_crossterm(&mut self, event: CtEvent) -> anyhow::Result<()> {
        let CtEvent::Key(key) = event else {
            if let CtEvent::Resize(w, h) = event {
                self.viewport.resize(w, h.saturating_sub(6));
            }
            return Ok(());
        };
        if key.kind != crossterm::event::KeyEventKind::Press {
            return Ok(());
        }

        if self.approvals.has_pending() {
            self.handle_approval_key(key);
            return Ok(());
        }

        match self.overlay {
            Overlay::Help => self.handle_help_key(key),
            Overlay::SessionPicker => self.handle_session_picker_key(key),
            Overlay::FileSearch => self.handle_file_search_key(key),
            Overlay::Slash => self.handle_slash_key(key).await?,
            Overlay::None => self.handle_composer_key(key).await?,
        }
        Ok(())
    }

    fn handle_approval_key(&mut self, key: KeyEvent) {
        let Some(request) = self.approvals.head().cloned() else { return };
        match key.code {
            KeyCode::Char('y') => {
                self.approvals.resolve(&request.id);
                let submission = Submission::new(
                    self.session.id.clone(),
                    SubmissionOperation::ApprovalDecision { approval_id: request.id, approved: true },
                );
                let sq = self.sq.clone();
                let cancel = self.cancel.clone();
                tokio::spawn(async move { let _ = sq.submit(submission, &cancel).await; });
            }
            KeyCode::Char('n') => {
                self.approvals.resolve(&request.id);
                let submission = Submission::new(
                    self.session.id.clone(),
                    SubmissionOperation::ApprovalDecision { approval_id: request.id, approved: false },
                );
                let sq = self.sq.clone();
                let cancel = self.cancel.clone();
                tokio::spawn(async move { let _ = sq.submit(submission, &cancel).await; });
            }
            _ => {}
        }
    }

    fn handle_help_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Esc || key.code == KeyCode::Char('?') {
            self.overlay = Overlay::None;
        }
    }

    fn handle_session_picker_key(&mut self, key: KeyEvent) {
        let Some(picker) = &mut self.session_picker else { self.overlay = Overlay::None; return };
        match key.code {
            KeyCode::Up => picker.move_up(),
            KeyCode::Down => picker.move_down(),
            KeyCode::Esc => self.overlay = Overlay::None,
            KeyCode::Enter => {
                if let Some(record) = picker.selected().cloned() {
                    self.session = record;
                    self.transcript.load_messages(&self.session.messages);
                }
                self.overlay = Overlay::None;
            }
            _ => {}
        }
    }

    fn handle_file_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.overlay = Overlay::None;
                self.file_search_query.clear();
            }
            KeyCode::Enter => {
                if let Some(path) = self.file_search.search(&self.file_search_query).first() {
                    let reference = format!("@{} ", path.display());
                    for c in reference.chars() {
                        self.composer.insert_char(c);
                    }
                }
                self.overlay = Overlay::None;
                self.file_search_query.clear();
            }
            KeyCode::Backspace => {
                self.file_search_query.pop();
            }
            KeyCode::Char(c) => self.file_search_query.push(c),
            _ => {}
        }
    }

    async fn handle_slash_key(&mut self, key: KeyEvent) -> anyhow::Result<()> {
        let first_line = self.composer.lines().first().cloned().unwrap_or_default();
        match key.code {
            KeyCode::Esc => {
                self.overlay = Overlay::None;
            }
            KeyCode::Tab => {
                if let SlashAction::Insert { text, .. } = self.slash.on_tab(&first_line) {
                    self.composer.clear();
                    for c in text.chars() {
                        self.composer.insert_char(c);
                    }
                }
            }
            KeyCode::Enter => match self.slash.on_enter(&first_line) {
                SlashAction::SubmitCommand { command, .. } => {
                    self.composer.clear();
                    self.overlay = Overlay::None;
                    self.run_builtin_command(&command);
                }
                SlashAction::SubmitPrompt { text } => {
                    self.composer.clear();
                    self.overlay = Overlay::None;
                    self.submit_text(text).await?;
                }
                SlashAction::Insert { text, .. } => {
                    self.composer.clear();
                    for c in text.chars() {
                        self.composer.insert_char(c);
                    }
                }
                SlashAction::Error(_) | SlashAction::Close => {
                    self.overlay = Overlay::None;
                }
            },
            _ => self.handle_composer_key(key).await?,
        }
        Ok(())
    }

    fn run_builtin_command(&mut self, command: &str) {
        match command {
            "quit" => self.should_quit = true,
            "new" => {
                self.session = self.session_store.new_session(self.opts.workdir.to_string_lossy());
                self.transcript = Transcript::new();
                self.plan.clear();
            }
            "help" => self.overlay = Overlay::Help,
            "init" => self.run_init_command(),
            _ => {}
        }
    }

    /// `/init` (§1, §9): a coarse, non-AST scan of the workspace written
    /// into `AGENTS.md`, then re-discovered so it takes effect on the next
    /// turn without restarting the session.
    fn run_init_command(&mut self) {
        match echo_session::write_agents_md(&self.opts.workdir) {
            Ok(path) => {
                self.transcript.append_tool_block(format!("wrote repository summary to {}", path.display()));
                self.opts.instructions = echo_session::discover_instructions(&self.opts.workdir, &self.opts.echo_home);
            }
            Err(e) => {
                self.transcript.append_tool_block(format!("/init failed: {e}"));
            }
        }
    }

    async fn handle_composer_key(&mut self, key: KeyEvent) -> anyhow::Result<()> {
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                let submission = Submission::new(self.session.id.clone(), SubmissionOperation::Interrupt {});
                let sq = self.sq.clone();
                let cancel = self.cancel.clone();
                tokio::spawn(async move { let _ = sq.submit(submission, &cancel).await; });
            }
            KeyCode::Char('q') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Char('p') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.session_picker = Some(SessionPicker::new(self.session_store.list().unwrap_or_default()));
                self.overlay = Overlay::SessionPicker;
            }
            KeyCode::Char('?') => {
                self.overlay = Overlay::Help;
            }
            KeyCode::Char('@') => {
                self.file_search.refresh(&self.opts.workdir);
                self.file_search_query.clear();
                self.overlay = Overlay::FileSearch;
            }
            KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => {
                self.composer.insert_newline();
            }
            KeyCode::Enter => {
                match self.composer.submit(self.turn_pending) {
                    SubmitOutcome::Immediate(text) => self.submit_text(text).await?,
                    SubmitOutcome::Queued(_) | SubmitOutcome::Empty => {}
                }
            }
            KeyCode::Backspace => self.composer.backspace(),
            KeyCode::Up => self.composer.history_prev(),
            KeyCode::Down => self.composer.history_next(),
            KeyCode::PageUp => {
                self.viewport.page_up();
            }
            KeyCode::PageDown => {
                self.viewport.page_down();
            }
            KeyCode::Home if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.viewport.home();
            }
            KeyCode::End if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.viewport.end();
            }
            KeyCode::Char(c) => {
                self.composer.insert_char(c);
                let first_line = self.composer.lines().first().cloned().unwrap_or_default();
                if self.slash.is_active(&first_line) {
                    self.overlay = Overlay::Slash;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn draw(&mut self, f: &mut Frame) {
        let area = f.area();
        let layout = AppLayout::compute(area, self.plan.height(), self.composer.height());

        f.render_widget(Paragraph::new(session_card_line(&self.opts.model, &self.opts.workdir)), layout.session_card);

        if let Some(plan_rect) = layout.plan {
            f.render_widget(Paragraph::new(self.plan.render_lines()), plan_rect);
        }

        let width = layout.chat.width.max(1) as usize;
        let lines = self.transcript.render_view_lines(width);
        self.viewport.set_lines(lines);
        self.viewport.resize(layout.chat.width, layout.chat.height);
        let visible: Vec<Line> = self.viewport.visible_lines().iter().map(|l| Line::from(l.clone())).collect();
        f.render_widget(Paragraph::new(visible), layout.chat);

        let status = status_line(
            self.turn_pending,
            self.turn_started_at.map(|t| t.elapsed().as_secs()).unwrap_or(0),
            self.composer.queued_len(),
            self.viewport.scroll_percent(),
            SPINNER_FRAMES[self.spinner_frame],
        );
        f.render_widget(Paragraph::new(status), layout.status);

        let composer_text = self.composer.lines().join("\n");
        f.render_widget(
            Paragraph::new(composer_text).block(Block::default().borders(Borders::ALL)),
            layout.composer,
        );

        f.render_widget(Paragraph::new("Enter submit · Alt+Enter newline · / commands · @ files · ? help · Ctrl+Q quit"), layout.hints);

        if self.approvals.has_pending() {
            self.draw_approval_modal(f, area);
        } else {
            match self.overlay {
                Overlay::Help => self.draw_help_overlay(f, area),
                Overlay::SessionPicker => self.draw_session_picker(f, area),
                Overlay::FileSearch => self.draw_file_search(f, area),
                Overlay::Slash => self.draw_slash_popup(f, area),
                Overlay::None => {}
            }
        }
    }

    fn draw_approval_modal(&self, f: &mut Frame, area: Rect) {
        let Some(request) = self.approvals.head() else { return };
        let rect = centered_rect(area, 60, 20);
        f.render_widget(Clear, rect);
        let text = vec![
            Line::from(Span::styled("Approval required", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))),
            Line::from(request.reason.clone()),
            Line::from(""),
            Line::from("y = approve   n = deny"),
        ];
        f.render_widget(Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("approval")), rect);
    }

    fn draw_help_overlay(&self, f: &mut Frame, area: Rect) {
        let rect = centered_rect(area, 60, 60);
        f.render_widget(Clear, rect);
        let lines: Vec<Line> = help_lines().into_iter().map(Line::from).collect();
        f.render_widget(Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("help")), rect);
    }

    fn draw_session_picker(&self, f: &mut Frame, area: Rect) {
        let rect = centered_rect(area, 60, 60);
        f.render_widget(Clear, rect);
        let Some(picker) = &self.session_picker else { return };
        let lines: Vec<Line> = picker
            .entries()
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let marker = if i == picker.selected_index() { "> " } else { "  " };
                Line::from(format!("{marker}{} ({})", r.id, r.workdir))
            })
            .collect();
        f.render_widget(Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("sessions")), rect);
    }

    fn draw_file_search(&self, f: &mut Frame, area: Rect) {
        let rect = centered_rect(area, 60, 60);
        f.render_widget(Clear, rect);
        let mut lines = vec![Line::from(format!("@{}", self.file_search_query))];
        lines.extend(self.file_search.search(&self.file_search_query).into_iter().take(20).map(|p| Line::from(p.display().to_string())));
        f.render_widget(Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("files")), rect);
    }

    fn draw_slash_popup(&self, f: &mut Frame, area: Rect) {
        let rect = centered_rect(area, 50, 40);
        f.render_widget(Clear, rect);
        let first_line = self.composer.lines().first().cloned().unwrap_or_default();
        let lines: Vec<Line> = self
            .slash
            .matches(&first_line)
            .into_iter()
            .map(|e| Line::from(format!("/{}  {}", e.name, e.description)))
            .collect();
        f.render_widget(Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("commands")), rect);
    }
}

fn centered_rect(area: Rect, pct_x: u16, pct_y: u16) -> Rect {
    let w = area.width * pct_x / 100;
    let h = area.height * pct_y / 100;
    let x = area.x + (area.width.saturating_sub(w)) / 2;
    let y = area.y + (area.height.saturating_sub(h)) / 2;
    Rect::new(x, y, w.min(area.width), h.min(area.height))
}

fn session_card_line(model: &str, workdir: &Path) -> String {
    format!("echo · {model} · {}", workdir.display())
}

fn status_line(turn_pending: bool, elapsed_secs: u64, queued: usize, scroll_percent: u8, spinner: char) -> String {
    let mut parts = Vec::new();
    if turn_pending {
        parts.push(format!("{spinner} {elapsed_secs}s"));
    }
    if queued > 0 {
        parts.push(format!("{queued} queued"));
    }
    parts.push(format!("{scroll_percent}%"));
    parts.join("  ")
}

/// Pulls `@path` tokens out of `text`, resolving each against `workdir` and
/// converting it into an [`InputMessage`] attachment via
/// [`echo_session::read_attachment`]; unresolvable tokens are left in the
/// text verbatim rather than silently dropped.
fn extract_attachments(text: &str, workdir: &Path) -> (String, Vec<InputMessage>) {
    let mut clean_words = Vec::new();
    let mut attachments = Vec::new();
    for word in text.split_whitespace() {
        if let Some(rel) = word.strip_prefix('@') {
            let path = workdir.join(rel);
            if let Ok(msg) = echo_session::read_attachment(&path) {
                attachments.push(msg);
                continue;
            }
        }
        clean_words.push(word);
    }
    (clean_words.join(" "), attachments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_hides_spinner_when_idle() {
        let line = status_line(false, 0, 0, 100, '⠋');
        assert!(!line.contains('⠋'));
        assert!(line.contains("100%"));
    }

    #[test]
    fn status_line_shows_spinner_and_elapsed_when_pending() {
        let line = status_line(true, 12, 2, 50, '⠙');
        assert!(line.contains("⠙ 12s"));
        assert!(line.contains("2 queued"));
    }

    #[test]
    fn session_card_includes_model_and_workdir() {
        let line = session_card_line("claude-sonnet-4", Path::new("/home/me/project"));
        assert!(line.contains("claude-sonnet-4"));
        assert!(line.contains("/home/me/project"));
    }

    #[test]
    fn extract_attachments_leaves_plain_words_untouched_when_path_missing() {
        let dir = tempfile::tempdir().unwrap();
        let (clean, attachments) = extract_attachments("look at @missing.txt please", dir.path());
        assert!(attachments.is_empty());
        assert!(clean.contains("@missing.txt"));
    }

    #[test]
    fn extract_attachments_reads_an_existing_text_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        let (clean, attachments) = extract_attachments("summarize @notes.txt", dir.path());
        assert_eq!(attachments.len(), 1);
        assert!(!clean.contains("@notes.txt"));
        assert!(attachments[0].text.contains("hello"));
    }

    #[test]
    fn centered_rect_is_within_bounds() {
        let area = Rect::new(0, 0, 100, 40);
        let rect = centered_rect(area, 50, 50);
        assert!(rect.x + rect.width <= area.width);
        assert!(rect.y + rect.height <= area.height);
    }
}
