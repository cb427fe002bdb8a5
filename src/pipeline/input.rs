//! Input validation: turn a [`GenerationRequest`] into model-ready material.
//!
//! Everything a user can send is checked here, before any network call:
//! user id format, size limits, and the real type of uploaded bytes. The
//! declared `Content-Type` of an upload is only a hint; magic bytes decide.

use crate::config::StudyConfig;
use crate::error::StudyError;
use crate::task::TaskKind;
use tracing::debug;

/// A file uploaded with a request.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub bytes: Vec<u8>,
    /// Content type declared by the client, if any.
    pub content_type: Option<String>,
    pub filename: Option<String>,
}

/// One generation request. Created per call; never persisted.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub user_id: String,
    pub task_kind: TaskKind,
    pub source_text: String,
    pub source_file: Option<SourceFile>,
    pub title: Option<String>,
}

impl GenerationRequest {
    pub fn text(user_id: impl Into<String>, task_kind: TaskKind, text: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            task_kind,
            source_text: text.into(),
            source_file: None,
            title: None,
        }
    }

    pub fn file(user_id: impl Into<String>, task_kind: TaskKind, file: SourceFile) -> Self {
        Self {
            user_id: user_id.into(),
            task_kind,
            source_text: String::new(),
            source_file: Some(file),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// A validated upload.
#[derive(Debug, Clone)]
pub struct PreparedFile {
    pub bytes: Vec<u8>,
    /// Sniffed content type, e.g. `application/pdf`.
    pub content_type: String,
    /// False for text uploads, whose content is inlined into the prompt.
    pub send_to_model: bool,
}

/// A request that passed validation.
#[derive(Debug, Clone)]
pub struct PreparedInput {
    pub user_id: String,
    pub task_kind: TaskKind,
    pub title: String,
    /// Text for the prompt; for binary uploads, the student's note (may be empty).
    pub text: String,
    pub file: Option<PreparedFile>,
}

/// Validate a request against the configured limits.
pub fn prepare(request: GenerationRequest, config: &StudyConfig) -> Result<PreparedInput, StudyError> {
    validate_user_id(&request.user_id)?;

    let GenerationRequest {
        user_id,
        task_kind,
        source_text,
        source_file,
        title,
    } = request;

    if task_kind.requires_file() && source_file.is_none() {
        return Err(StudyError::InvalidInput(format!(
            "task '{task_kind}' needs an uploaded PDF or image"
        )));
    }

    let title = title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| task_kind.default_title().to_string());

    let (text, file) = match source_file {
        None => {
            if source_text.trim().is_empty() {
                return Err(StudyError::InvalidInput(
                    "provide source text or upload a file".into(),
                ));
            }
            (source_text, None)
        }
        Some(file) => prepare_file(file, source_text, config)?,
    };

    if text.len() > config.max_text_bytes {
        return Err(StudyError::InputTooLarge {
            what: "text",
            size: text.len(),
            limit: config.max_text_bytes,
        });
    }

    Ok(PreparedInput {
        user_id,
        task_kind,
        title,
        text,
        file,
    })
}

fn prepare_file(
    file: SourceFile,
    source_text: String,
    config: &StudyConfig,
) -> Result<(String, Option<PreparedFile>), StudyError> {
    if file.bytes.is_empty() {
        return Err(StudyError::InvalidInput("uploaded file is empty".into()));
    }
    if file.bytes.len() > config.max_file_bytes {
        return Err(StudyError::InputTooLarge {
            what: "file",
            size: file.bytes.len(),
            limit: config.max_file_bytes,
        });
    }

    let content_type = sniff_content_type(&file.bytes, file.content_type.as_deref(), file.filename.as_deref())?;
    debug!(
        "Upload {:?}: {} bytes, sniffed as {}",
        file.filename,
        file.bytes.len(),
        content_type
    );

    if content_type == TEXT_PLAIN {
        // Checked by the sniffer.
        let body = String::from_utf8_lossy(&file.bytes).into_owned();
        let text = [body.trim(), source_text.trim()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("\n\n");
        if text.is_empty() {
            return Err(StudyError::InvalidInput("uploaded text file is blank".into()));
        }
        return Ok((
            text,
            Some(PreparedFile {
                bytes: file.bytes,
                content_type,
                send_to_model: false,
            }),
        ));
    }

    Ok((
        source_text,
        Some(PreparedFile {
            bytes: file.bytes,
            content_type,
            send_to_model: true,
        }),
    ))
}

const TEXT_PLAIN: &str = "text/plain";

/// Determine the real content type of an upload from its magic bytes.
///
/// PDFs and PNG/JPEG/GIF/WebP images are accepted as binary attachments. A
/// file declared as `text/*` (or named `.txt`/`.md`) is accepted when it is
/// valid UTF-8.
pub fn sniff_content_type(
    bytes: &[u8],
    declared: Option<&str>,
    filename: Option<&str>,
) -> Result<String, StudyError> {
    if bytes.starts_with(b"%PDF") {
        return Ok("application/pdf".to_string());
    }

    if let Ok(format) = image::guess_format(bytes) {
        use image::ImageFormat;
        if matches!(
            format,
            ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif | ImageFormat::WebP
        ) {
            return Ok(format.to_mime_type().to_string());
        }
    }

    let declared_text = declared.is_some_and(|ct| ct.trim().starts_with("text/"));
    let named_text = filename.is_some_and(|name| {
        let lower = name.to_ascii_lowercase();
        lower.ends_with(".txt") || lower.ends_with(".md")
    });
    if (declared_text || named_text) && std::str::from_utf8(bytes).is_ok() {
        return Ok(TEXT_PLAIN.to_string());
    }

    Err(StudyError::UnsupportedFileType {
        content_type: declared
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or("application/octet-stream")
            .to_string(),
    })
}

/// File extension used when storing an upload of this type.
pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "application/pdf" => "pdf",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        TEXT_PLAIN => "txt",
        _ => "bin",
    }
}

/// User ids double as storage keys: 1–128 characters of `[A-Za-z0-9_-]`.
pub fn validate_user_id(user_id: &str) -> Result<(), StudyError> {
    let ok = !user_id.is_empty()
        && user_id.len() <= 128
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(StudyError::InvalidInput(format!(
            "invalid user id '{user_id}': use 1-128 letters, digits, '_' or '-'"
        )))
    }
}
