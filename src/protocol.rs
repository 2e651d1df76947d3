//! Message envelope types for worker communication.
//!
//! Both directions use a closed, internally tagged representation: the
//! `command` tag selects the variant, and each variant carries its own
//! fields. Messages derive `Serialize`/`Deserialize` so the boundary stays
//! serializable even though the default transport is an in-process channel.
//!
//! Large binary payloads are plain `Vec<u8>` fields. Building a command
//! moves the buffer into the message, so ownership transfers to the worker
//! side by construction; there is no copy and no way for the caller to read
//! the buffer afterwards.

use serde::{Deserialize, Serialize};

/// Raw pixel buffer handed to the worker (`add_page`, `build_from_images`).
///
/// The layer does not interpret the pixel data; width and height travel
/// alongside the bytes so the worker can reassemble the image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Rendered page returned by `render_page`, reassembled from the raw reply
/// fields (bytes + dimensions + dpi).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub dpi: u16,
}

/// Error descriptor carried by a failed reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error code, usually one of [`codes`].
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Worker-specific context, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }
}

/// Outbound command envelope.
///
/// Every command carries the correlation `id` issued for it; the worker must
/// echo that id in its terminal reply. Page indices are zero-based on the
/// wire (the typed builders on `WorkerChannel` convert from 1-based).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WorkerCommand {
    OpenDocument {
        id: u64,
        buffer: Vec<u8>,
    },
    PageCount {
        id: u64,
    },
    DocumentMetadata {
        id: u64,
        markup: bool,
    },
    PageText {
        id: u64,
        page: u32,
    },
    RenderPage {
        id: u64,
        page: u32,
    },
    Slice {
        id: u64,
        from: u32,
        to: u32,
    },
    StartMultipage {
        id: u64,
        slice_count: u32,
        defer_init: bool,
        grayscale: bool,
    },
    AddPage {
        id: u64,
        image: RawImage,
    },
    EndMultipage {
        id: u64,
    },
    BuildFromImages {
        id: u64,
        images: Vec<RawImage>,
        slice_count: u32,
        defer_init: bool,
        grayscale: bool,
    },
}

impl WorkerCommand {
    /// Correlation id carried by this command.
    pub fn id(&self) -> u64 {
        match self {
            Self::OpenDocument { id, .. }
            | Self::PageCount { id }
            | Self::DocumentMetadata { id, .. }
            | Self::PageText { id, .. }
            | Self::RenderPage { id, .. }
            | Self::Slice { id, .. }
            | Self::StartMultipage { id, .. }
            | Self::AddPage { id, .. }
            | Self::EndMultipage { id }
            | Self::BuildFromImages { id, .. } => *id,
        }
    }

    /// Wire tag, for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenDocument { .. } => "open_document",
            Self::PageCount { .. } => "page_count",
            Self::DocumentMetadata { .. } => "document_metadata",
            Self::PageText { .. } => "page_text",
            Self::RenderPage { .. } => "render_page",
            Self::Slice { .. } => "slice",
            Self::StartMultipage { .. } => "start_multipage",
            Self::AddPage { .. } => "add_page",
            Self::EndMultipage { .. } => "end_multipage",
            Self::BuildFromImages { .. } => "build_from_images",
        }
    }
}

/// Inbound message envelope.
///
/// Terminal replies reuse their command's tag and echo its `id`. `Process`
/// is out-of-band and carries no id; `Error` routes to the same pending-call
/// slot a success reply would have used. Unknown tags deserialize to
/// [`WorkerReply::Unknown`], which the dispatcher logs and ignores.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WorkerReply {
    OpenDocument {
        id: u64,
    },
    PageCount {
        id: u64,
        page_count: u32,
    },
    DocumentMetadata {
        id: u64,
        text: String,
    },
    PageText {
        id: u64,
        text: String,
    },
    RenderPage {
        id: u64,
        buffer: Vec<u8>,
        width: u32,
        height: u32,
        dpi: u16,
    },
    Slice {
        id: u64,
        buffer: Vec<u8>,
    },
    StartMultipage {
        id: u64,
    },
    AddPage {
        id: u64,
    },
    EndMultipage {
        id: u64,
        buffer: Vec<u8>,
    },
    BuildFromImages {
        id: u64,
        buffer: Vec<u8>,
    },
    /// Progress notice for a long-running command. Out-of-band: no id.
    Process {
        percent: u8,
    },
    /// Failure reply for the call identified by `id`.
    Error {
        #[serde(default)]
        id: Option<u64>,
        error: ErrorInfo,
    },
    /// Fallback for tags this version does not know.
    #[serde(other)]
    Unknown,
}

impl WorkerReply {
    /// Correlation id carried by this message, if any.
    pub fn id(&self) -> Option<u64> {
        match self {
            Self::OpenDocument { id }
            | Self::PageCount { id, .. }
            | Self::DocumentMetadata { id, .. }
            | Self::PageText { id, .. }
            | Self::RenderPage { id, .. }
            | Self::Slice { id, .. }
            | Self::StartMultipage { id }
            | Self::AddPage { id }
            | Self::EndMultipage { id, .. }
            | Self::BuildFromImages { id, .. } => Some(*id),
            Self::Error { id, .. } => *id,
            Self::Process { .. } | Self::Unknown => None,
        }
    }
}

/// Reply payload after reconstruction, as delivered to a pending call.
///
/// The dispatcher rebuilds each terminal reply into one of these shapes
/// (e.g. `render_page` raw fields become a [`PageImage`]); the typed call
/// builders then extract the variant they expect.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyValue {
    /// Void reply (`open_document`, `start_multipage`, `add_page`).
    Done,
    PageCount(u32),
    Text(String),
    Buffer(Vec<u8>),
    Image(PageImage),
}

/// Error codes the layer classifies into typed [`CallError`] variants.
///
/// Workers are free to send other codes; those surface as
/// `CallError::Remote`.
///
/// [`CallError`]: crate::error::CallError
pub mod codes {
    pub const DOCUMENT_PARSE_FAILED: &str = "DOCUMENT_PARSE_FAILED";
    pub const PAGE_OUT_OF_RANGE: &str = "PAGE_OUT_OF_RANGE";
    pub const SEQUENCE_VIOLATION: &str = "SEQUENCE_VIOLATION";
}
