// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Static help overlay text (§4.7).

pub fn help_lines() -> Vec<&'static str> {
    vec![
        "Enter       submit (queues if a turn is running)",
        "Alt+Enter   insert a newline",
        "Up/Down     browse prompt history (single-line only)",
        "@           fuzzy file search",
        "/           slash command popup",
        "Ctrl+C      interrupt the running turn",
        "y / n       approve / deny a pending tool call",
        "PageUp/Down, Home/End   scroll the conversation",
        "Esc         close any open overlay",
        "Ctrl+Q      quit",
    ]
}
