// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::Path;

use echo_types::InputMessage;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

/// Reads an attachment file into an [`InputMessage`] (§4.5: "Attachments ...
/// textual file contents prefixed with `Attachment <path>:`; images are
/// threaded as references, never as binary blobs").
///
/// Text attachments carry the file's contents as `text`, already prefixed.
/// Image attachments carry only the path as a reference; `is_image` signals
/// the engine to thread it as a content-part reference rather than reading
/// bytes into the prompt.
pub fn read_attachment(path: &Path) -> anyhow::Result<InputMessage> {
    let is_image = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false);

    let path_str = path.display().to_string();

    if is_image {
        return Ok(InputMessage {
            text: format!("Attachment {path_str}: (image)"),
            attachment_path: Some(path_str),
            is_image: true,
        });
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("reading attachment {path_str}: {e}"))?;

    Ok(InputMessage {
        text: format!("Attachment {path_str}:\n{contents}"),
        attachment_path: Some(path_str),
        is_image: false,
    })
}
