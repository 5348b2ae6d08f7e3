// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Diff-aware terminal UI (§4.7): viewport, composer, plan section,
//! approval queue, slash/file-search/session-picker/help overlays, and the
//! `App` that wires them to the Submission/Event Queues.

mod app;
mod approval;
mod composer;
mod file_search;
mod help;
mod layout;
mod plan;
mod render;
mod session_picker;
mod slash_overlay;
mod viewport;

pub use app::{App, AppOptions};
pub use approval::{ApprovalQueue, ApprovalRequest};
pub use composer::{Composer, SubmitOutcome, MAX_LINES};
pub use file_search::{collect_files, fuzzy_files, FileSearch};
pub use help::help_lines;
pub use layout::AppLayout;
pub use plan::PlanSection;
pub use render::{format_tool_block, TuiEventRenderer};
pub use session_picker::SessionPicker;
pub use slash_overlay::SlashOverlay;
pub use viewport::{DiffAwareViewport, ViewportSync};
