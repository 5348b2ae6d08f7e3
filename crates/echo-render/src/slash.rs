// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Slash-command state machine (§4.9, §8 seed scenario 4). Pure and
//! side-effect free: the composer feeds it the first line of the buffer on
//! every keystroke and acts on the `SlashAction` it returns.

/// The current state of slash-command parsing for a given input string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    /// Input does not start with `/` — not a slash command at all.
    NotCommand,
    /// User has typed `/` or `/partial_name` with no trailing space yet.
    PartialCommand { partial: String },
    /// Command name is complete; user is now typing argument `arg_index`.
    CompletingArgs { command: String, arg_index: usize, partial: String },
    /// Input is a fully-specified command ready for execution.
    Complete { command: String, args: Vec<String> },
}

/// Tokenise a command body: splits on whitespace, respects double-quoted
/// strings. Quoted strings have their quotes stripped.
fn tokenise(s: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in s.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ' ' | '\t' if !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Parses the caret-context into a [`ParsedCommand`]. Pure; safe to call on
/// every keystroke.
pub fn parse(input: &str) -> ParsedCommand {
    if !input.starts_with('/') {
        return ParsedCommand::NotCommand;
    }
    let body = &input[1..];
    let tokens = tokenise(body);
    if tokens.is_empty() {
        return ParsedCommand::PartialCommand { partial: String::new() };
    }
    let command_name = &tokens[0];
    let body_ends_with_space = body.ends_with(' ');

    if tokens.len() == 1 && !body_ends_with_space {
        return ParsedCommand::PartialCommand { partial: command_name.clone() };
    }

    let args = &tokens[1..];
    if args.is_empty() {
        return ParsedCommand::CompletingArgs { command: command_name.clone(), arg_index: 0, partial: String::new() };
    }
    if body_ends_with_space {
        return ParsedCommand::Complete { command: command_name.clone(), args: args.to_vec() };
    }
    let partial = args.last().cloned().unwrap_or_default();
    ParsedCommand::CompletingArgs { command: command_name.clone(), arg_index: args.len() - 1, partial }
}

/// A user-defined prompt's placeholder skeleton: either named `{{NAME}}`
/// markers or positional `{{1}}..{{N}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub body: String,
    pub placeholders: Vec<String>,
}

impl PromptTemplate {
    pub fn new(body: impl Into<String>) -> Self {
        let body = body.into();
        let mut placeholders = Vec::new();
        let mut rest = body.as_str();
        while let Some(start) = rest.find("{{") {
            if let Some(end) = rest[start..].find("}}") {
                let name = rest[start + 2..start + end].trim().to_string();
                if !placeholders.contains(&name) {
                    placeholders.push(name);
                }
                rest = &rest[start + end + 2..];
            } else {
                break;
            }
        }
        Self { body, placeholders }
    }

    /// Substitutes `NAME=value` assignments (named or positional-by-index)
    /// into the template body. Returns `None` if any placeholder is
    /// unassigned.
    fn expand(&self, assignments: &[(String, String)]) -> Option<String> {
        let mut text = self.body.clone();
        for name in &self.placeholders {
            let value = assignments.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())?;
            text = text.replace(&format!("{{{{{name}}}}}"), value);
        }
        Some(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogKind {
    Builtin,
    Prompt(PromptTemplate),
}

/// One entry in the slash popup's catalog: a built-in command or a
/// user-defined prompt under `prompts:<name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub description: String,
    pub kind: CatalogKind,
}

impl CatalogEntry {
    pub fn builtin(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self { name: name.into(), description: description.into(), kind: CatalogKind::Builtin }
    }

    pub fn prompt(name: impl Into<String>, description: impl Into<String>, template: PromptTemplate) -> Self {
        Self { name: format!("prompts:{}", name.into()), description: description.into(), kind: CatalogKind::Prompt(template) }
    }
}

/// The built-in command set a fresh session starts with.
pub fn catalog_builtin() -> Vec<CatalogEntry> {
    vec![
        CatalogEntry::builtin("model", "switch the active model"),
        CatalogEntry::builtin("approvals", "change the approval policy"),
        CatalogEntry::builtin("new", "start a new session"),
        CatalogEntry::builtin("compact", "compact the conversation history"),
        CatalogEntry::builtin("init", "scan the workspace and write a coarse summary to AGENTS.md"),
        CatalogEntry::builtin("quit", "exit the program"),
        CatalogEntry::builtin("help", "show the help overlay"),
    ]
}

/// The outcome of a Tab/Enter/Esc keystroke against the slash state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashAction {
    /// Replace the composer's first line with `text`, placing the caret at
    /// byte offset `caret`.
    Insert { text: String, caret: usize },
    /// A built-in command is ready to run.
    SubmitCommand { command: String, args: Vec<String> },
    /// A prompt's placeholders are all satisfied; submit the expanded text
    /// as a user turn.
    SubmitPrompt { text: String },
    /// The token didn't resolve to any catalog entry.
    Error(String),
    /// Esc: dismiss the popup without changing the buffer.
    Close,
}

fn score(partial: &str, name: &str) -> Option<i32> {
    if partial.is_empty() {
        return Some(0);
    }
    if name == partial {
        return Some(100);
    }
    if name.starts_with(partial) {
        return Some(80);
    }
    if name.contains(partial) {
        return Some(40);
    }
    None
}

/// Fuzzy-matches `partial` against the catalog, best match first.
pub fn fuzzy_match<'a>(partial: &str, catalog: &'a [CatalogEntry]) -> Vec<&'a CatalogEntry> {
    let mut scored: Vec<(i32, &CatalogEntry)> =
        catalog.iter().filter_map(|e| score(partial, &e.name).map(|s| (s, e))).collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.name.cmp(&b.1.name)));
    scored.into_iter().map(|(_, e)| e).collect()
}

/// Drives the `/` popup: holds the catalog, resolves Tab/Enter/Esc against
/// whatever the composer's first line currently parses to.
pub struct SlashMachine {
    catalog: Vec<CatalogEntry>,
}

impl Default for SlashMachine {
    fn default() -> Self {
        Self { catalog: catalog_builtin() }
    }
}

impl SlashMachine {
    pub fn new(catalog: Vec<CatalogEntry>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &[CatalogEntry] {
        &self.catalog
    }

    fn find(&self, name: &str) -> Option<&CatalogEntry> {
        self.catalog.iter().find(|e| e.name == name)
    }

    fn best_match(&self, partial: &str) -> Option<&CatalogEntry> {
        fuzzy_match(partial, &self.catalog).into_iter().next()
    }

    /// Tab: complete the command name, or, for a matched prompt, insert a
    /// placeholder skeleton with the caret inside the first value.
    pub fn on_tab(&self, input: &str) -> SlashAction {
        match parse(input) {
            ParsedCommand::PartialCommand { partial } => match self.best_match(&partial) {
                Some(entry) => match &entry.kind {
                    CatalogKind::Builtin => {
                        let text = format!("/{} ", entry.name);
                        let caret = text.len();
                        SlashAction::Insert { text, caret }
                    }
                    CatalogKind::Prompt(template) => {
                        if template.placeholders.is_empty() {
                            let text = format!("/{} ", entry.name);
                            let caret = text.len();
                            SlashAction::Insert { text, caret }
                        } else {
                            let mut text = format!("/{}", entry.name);
                            let mut first_value_start = 0;
                            for (i, name) in template.placeholders.iter().enumerate() {
                                text.push(' ');
                                text.push_str(name);
                                text.push_str("=\"");
                                if i == 0 {
                                    first_value_start = text.len();
                                }
                                text.push('"');
                            }
                            SlashAction::Insert { text, caret: first_value_start }
                        }
                    }
                },
                None => SlashAction::Error(format!("no command matches /{partial}")),
            },
            ParsedCommand::Complete { command, .. } | ParsedCommand::CompletingArgs { command, .. } => {
                match self.find(&command) {
                    Some(_) => SlashAction::Close,
                    None => SlashAction::Error(format!("unknown command /{command}")),
                }
            }
            ParsedCommand::NotCommand => SlashAction::Close,
        }
    }

    /// Enter: submit a built-in, or expand+submit a prompt whose
    /// placeholders are all assigned (`NAME="value"` args); otherwise falls
    /// back to the same behavior as Tab.
    pub fn on_enter(&self, input: &str) -> SlashAction {
        let parsed = parse(input);
        match &parsed {
            ParsedCommand::PartialCommand { partial } => match self.best_match(partial) {
                Some(entry) if matches!(entry.kind, CatalogKind::Builtin) && partial == &entry.name => {
                    SlashAction::SubmitCommand { command: entry.name.clone(), args: vec![] }
                }
                _ => self.on_tab(input),
            },
            ParsedCommand::Complete { command, args } => match self.find(command) {
                Some(entry) => match &entry.kind {
                    CatalogKind::Builtin => SlashAction::SubmitCommand { command: command.clone(), args: args.clone() },
                    CatalogKind::Prompt(template) => self.try_expand(entry, template, args),
                },
                None => SlashAction::Error(format!("unknown command /{command}")),
            },
            ParsedCommand::CompletingArgs { .. } => self.on_tab(input),
            ParsedCommand::NotCommand => SlashAction::Close,
        }
    }

    fn try_expand(&self, entry: &CatalogEntry, template: &PromptTemplate, args: &[String]) -> SlashAction {
        let mut assignments = Vec::new();
        for arg in args {
            if let Some((name, value)) = arg.split_once('=') {
                assignments.push((name.to_string(), value.trim_matches('"').to_string()));
            }
        }
        match template.expand(&assignments) {
            Some(text) => SlashAction::SubmitPrompt { text },
            None => {
                let _ = &entry.name;
                self.on_tab(&format!("/{} ", entry.name))
            }
        }
    }

    pub fn on_esc(&self) -> SlashAction {
        SlashAction::Close
    }
}
