// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod apply_patch;
mod command;
mod file_read;
mod search;
mod update_plan;

pub use apply_patch::ApplyPatchHandler;
pub use command::CommandHandler;
pub use file_read::FileReadHandler;
pub use search::SearchHandler;
pub use update_plan::UpdatePlanHandler;
