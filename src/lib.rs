//! # docworker
//!
//! Asynchronous channel and request/response correlation for a
//! document-processing worker.
//!
//! The controller side issues typed calls; the worker runs on its own task
//! and talks back only through discrete messages. Each call carries a
//! unique id, so replies can arrive in any order and calls pipeline freely.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                     Controller (any task)                      │
//! │  ┌──────────────────────────────────────────────────────────┐  │
//! │  │                 WorkerChannel (adapter)                  │  │
//! │  │  - one typed async operation per remote command          │  │
//! │  │  - CallRegistry: id -> pending completion                │  │
//! │  │  - dispatch task demultiplexes replies by command tag    │  │
//! │  └──────────────────────────────────────────────────────────┘  │
//! │            commands │ ▲ replies + progress notices             │
//! └─────────────────────┼─┼────────────────────────────────────────┘
//!                       ▼ │
//! ┌────────────────────────────────────────────────────────────────┐
//! │        CommandProcessor (long-lived worker task, opaque)       │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use docworker::WorkerChannel;
//!
//! let channel = WorkerChannel::spawn(|| MyProcessor::new());
//! channel.open_document(bytes).await?;   // bytes moves to the worker
//! let pages = channel.page_count().await?;
//! let image = channel.render_page(1).await?;
//! ```
//!
//! Large buffers are moved into messages, never copied: once a call is
//! issued the caller no longer owns the bytes. `reset()` replaces the
//! worker and abandons every pending call; wrap calls in your own timeout
//! if you need bounded latency.

pub mod channel;
pub mod config;
pub mod correlate;
pub mod error;
pub mod processor;
pub mod protocol;
pub mod url;

pub use channel::WorkerChannel;
pub use config::{ChannelConfig, ConfigError};
pub use correlate::{CallRegistry, Completion};
pub use error::{CallError, CallResult};
pub use processor::{CommandProcessor, ReplySink};
pub use protocol::{codes, ErrorInfo, PageImage, RawImage, ReplyValue, WorkerCommand, WorkerReply};
pub use url::{buffer_url, BufferUrl, BufferUrlError};
