//! Channel adapter: typed calls in, demultiplexed replies out.
//!
//! [`WorkerChannel`] owns the message channel to a worker task, exposes one
//! typed async operation per remote command, and runs a dispatch task that
//! routes every inbound message to the pending call it completes, or to
//! the progress observer for out-of-band notices.
//!
//! # Error taxonomy
//!
//! - **Call errors** reject exactly one pending call and surface as
//!   [`CallError`] through that call's future.
//! - **Channel faults** (worker gone, queue closed) are logged and reject
//!   nothing; the affected calls never settle and recovery requires
//!   [`WorkerChannel::reset`].
//! - **Protocol noise** (orphaned replies, unroutable errors, unknown tags)
//!   is logged and otherwise ignored.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::ChannelConfig;
use crate::correlate::CallRegistry;
use crate::error::{CallError, CallResult};
use crate::processor::{spawn_worker_task, CommandProcessor, ProcessorFactory, ReplySink};
use crate::protocol::{PageImage, RawImage, ReplyValue, WorkerCommand, WorkerReply};

type ProgressObserver = Arc<dyn Fn(u8) + Send + Sync>;
type ProgressSlot = parking_lot::Mutex<Option<ProgressObserver>>;

/// Asynchronous channel to a single long-lived worker.
///
/// Every operation returns immediately with a `'static` future that
/// completes when the matching reply arrives; calls may be pipelined freely
/// because each carries its own id. No cross-call ordering is guaranteed;
/// stateful sequences (`start_multipage` / `add_page` / `end_multipage`)
/// must be awaited step by step by the caller.
///
/// Must be created inside a tokio runtime.
pub struct WorkerChannel {
    outbound: mpsc::Sender<WorkerCommand>,
    registry: Arc<Mutex<CallRegistry>>,
    progress: Arc<ProgressSlot>,
    factory: Arc<ProcessorFactory>,
    config: ChannelConfig,
    worker_task: JoinHandle<()>,
    dispatch_task: JoinHandle<()>,
}

impl WorkerChannel {
    /// Spawn a worker from `factory` and connect a channel to it.
    ///
    /// The factory is kept: [`reset`](Self::reset) calls it again to build
    /// the replacement worker.
    pub fn spawn<F, P>(factory: F) -> Self
    where
        F: Fn() -> P + Send + Sync + 'static,
        P: CommandProcessor,
    {
        Self::spawn_with_config(factory, ChannelConfig::default())
    }

    /// Spawn with an explicit [`ChannelConfig`].
    pub fn spawn_with_config<F, P>(factory: F, config: ChannelConfig) -> Self
    where
        F: Fn() -> P + Send + Sync + 'static,
        P: CommandProcessor,
    {
        let factory: Arc<ProcessorFactory> =
            Arc::new(move || Box::new(factory()) as Box<dyn CommandProcessor>);
        let progress = Arc::new(ProgressSlot::default());
        Self::build(factory, progress, config)
    }

    fn build(factory: Arc<ProcessorFactory>, progress: Arc<ProgressSlot>, config: ChannelConfig) -> Self {
        // mpsc::channel panics on zero capacity
        let capacity = config.queue_capacity.max(1);
        let (outbound, command_rx) = mpsc::channel(capacity);
        let (reply_tx, reply_rx) = mpsc::channel(capacity);
        let registry = Arc::new(Mutex::new(CallRegistry::new()));

        let worker_task = spawn_worker_task((factory)(), command_rx, ReplySink::new(reply_tx));
        let dispatch_task = spawn_dispatch_task(
            reply_rx,
            Arc::clone(&registry),
            Arc::clone(&progress),
            config.label.clone(),
        );

        tracing::debug!(label = config.label.as_deref().unwrap_or("-"), "worker channel spawned");

        Self {
            outbound,
            registry,
            progress,
            factory,
            config,
            worker_task,
            dispatch_task,
        }
    }

    /// Discard the channel and its registry and spawn a fresh worker.
    ///
    /// Calls pending at this moment are abandoned: their futures never
    /// settle, neither resolved nor rejected. Callers that need bounded
    /// latency must wrap calls in their own timeout. The progress observer
    /// survives the reset.
    pub fn reset(&mut self) {
        self.worker_task.abort();
        self.dispatch_task.abort();
        tracing::debug!(
            label = self.config.label.as_deref().unwrap_or("-"),
            "worker channel reset; pending calls abandoned"
        );
        *self = Self::build(
            Arc::clone(&self.factory),
            Arc::clone(&self.progress),
            self.config.clone(),
        );
    }

    /// Register the observer invoked for each progress notice.
    pub fn set_progress_observer<F>(&self, observer: F)
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        *self.progress.lock() = Some(Arc::new(observer));
    }

    pub fn clear_progress_observer(&self) {
        *self.progress.lock() = None;
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Load document bytes into the worker. Consumes the buffer: ownership
    /// transfers to the worker side.
    pub fn open_document(&self, buffer: Vec<u8>) -> impl Future<Output = CallResult<()>> + Send + 'static {
        let call = self.call(move |id| WorkerCommand::OpenDocument { id, buffer });
        async move { expect_done(call.await?) }
    }

    /// Number of pages in the open document.
    pub fn page_count(&self) -> impl Future<Output = CallResult<u32>> + Send + 'static {
        let call = self.call(|id| WorkerCommand::PageCount { id });
        async move { expect_page_count(call.await?) }
    }

    /// Document metadata, as markup or plain text.
    pub fn document_metadata(&self, markup: bool) -> impl Future<Output = CallResult<String>> + Send + 'static {
        let call = self.call(move |id| WorkerCommand::DocumentMetadata { id, markup });
        async move { expect_text(call.await?) }
    }

    /// Text layer of one page. `page` is 1-based; the wire index is
    /// zero-based, and the layer does not pre-validate the range (the
    /// worker rejects out-of-range pages).
    pub fn page_text(&self, page: u32) -> impl Future<Output = CallResult<String>> + Send + 'static {
        let call = self.call(move |id| WorkerCommand::PageText {
            id,
            page: page.saturating_sub(1),
        });
        async move { expect_text(call.await?) }
    }

    /// Render one page to pixels. `page` is 1-based, as in
    /// [`page_text`](Self::page_text).
    pub fn render_page(&self, page: u32) -> impl Future<Output = CallResult<PageImage>> + Send + 'static {
        let call = self.call(move |id| WorkerCommand::RenderPage {
            id,
            page: page.saturating_sub(1),
        });
        async move { expect_image(call.await?) }
    }

    /// Extract the 0-based page range `from..=to` into a new document.
    pub fn slice(&self, from: u32, to: u32) -> impl Future<Output = CallResult<Vec<u8>>> + Send + 'static {
        let call = self.call(move |id| WorkerCommand::Slice { id, from, to });
        async move { expect_buffer(call.await?) }
    }

    /// Open a multipage assembly session on the worker.
    pub fn start_multipage(
        &self,
        slice_count: u32,
        defer_init: bool,
        grayscale: bool,
    ) -> impl Future<Output = CallResult<()>> + Send + 'static {
        let call = self.call(move |id| WorkerCommand::StartMultipage {
            id,
            slice_count,
            defer_init,
            grayscale,
        });
        async move { expect_done(call.await?) }
    }

    /// Append one image to the open multipage session. Consumes the image;
    /// its pixel buffer transfers to the worker side.
    pub fn add_page(&self, image: RawImage) -> impl Future<Output = CallResult<()>> + Send + 'static {
        let call = self.call(move |id| WorkerCommand::AddPage { id, image });
        async move { expect_done(call.await?) }
    }

    /// Finish the multipage session and return the assembled document.
    pub fn end_multipage(&self) -> impl Future<Output = CallResult<Vec<u8>>> + Send + 'static {
        let call = self.call(|id| WorkerCommand::EndMultipage { id });
        async move { expect_buffer(call.await?) }
    }

    /// Build a document from a batch of images in one call. Consumes the
    /// images; every pixel buffer transfers to the worker side.
    pub fn build_from_images(
        &self,
        images: Vec<RawImage>,
        slice_count: u32,
        defer_init: bool,
        grayscale: bool,
    ) -> impl Future<Output = CallResult<Vec<u8>>> + Send + 'static {
        let call = self.call(move |id| WorkerCommand::BuildFromImages {
            id,
            images,
            slice_count,
            defer_init,
            grayscale,
        });
        async move { expect_buffer(call.await?) }
    }

    /// Issue a completion, send the command built around its id, and return
    /// a future for the correlated reply.
    ///
    /// The future owns clones of the registry and sender rather than
    /// borrowing the channel, so callers can hold it across
    /// [`reset`](Self::reset).
    fn call<B>(&self, build: B) -> impl Future<Output = CallResult<ReplyValue>> + Send + 'static
    where
        B: FnOnce(u64) -> WorkerCommand + Send + 'static,
    {
        let registry = Arc::clone(&self.registry);
        let outbound = self.outbound.clone();

        async move {
            let (tx, rx) = oneshot::channel();
            let id = registry.lock().await.issue(tx);
            let command = build(id);
            tracing::trace!(id, command = command.name(), "issuing call");

            if outbound.send(command).await.is_err() {
                // Channel fault, not a call error: diagnostic only, and the
                // call joins the abandoned set until reset() replaces the
                // channel.
                tracing::error!(id, "worker channel unavailable; call abandoned");
                return std::future::pending().await;
            }

            match rx.await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(error)) => Err(CallError::from(error)),
                // Completion sender dropped without settling: the registry
                // was discarded by reset(). Abandonment policy: never
                // settle.
                Err(_) => std::future::pending().await,
            }
        }
    }
}

impl Drop for WorkerChannel {
    fn drop(&mut self) {
        self.worker_task.abort();
        self.dispatch_task.abort();
    }
}

fn spawn_dispatch_task(
    mut replies: mpsc::Receiver<WorkerReply>,
    registry: Arc<Mutex<CallRegistry>>,
    progress: Arc<ProgressSlot>,
    label: Option<String>,
) -> JoinHandle<()> {
    let span = tracing::debug_span!("worker_channel", label = label.as_deref().unwrap_or("-"));
    tokio::spawn(
        async move {
            while let Some(message) = replies.recv().await {
                dispatch(message, &registry, &progress).await;
            }
            tracing::debug!("reply stream ended; dispatch task exiting");
        }
        .instrument(span),
    )
}

/// Route one inbound message: progress notices to the observer, everything
/// else through the registry to the pending call it completes.
async fn dispatch(message: WorkerReply, registry: &Mutex<CallRegistry>, progress: &ProgressSlot) {
    let (id, outcome) = match message {
        WorkerReply::Process { percent } => {
            // the slot lock must not be held while the observer runs
            let observer = progress.lock().clone();
            match observer {
                Some(observer) => observer(percent),
                None => tracing::trace!(percent, "progress notice with no observer"),
            }
            return;
        }
        WorkerReply::Unknown => {
            tracing::warn!("unexpected message from worker ignored");
            return;
        }
        WorkerReply::Error { id, error } => (id, Err(error)),
        WorkerReply::OpenDocument { id }
        | WorkerReply::StartMultipage { id }
        | WorkerReply::AddPage { id } => (Some(id), Ok(ReplyValue::Done)),
        WorkerReply::PageCount { id, page_count } => (Some(id), Ok(ReplyValue::PageCount(page_count))),
        WorkerReply::DocumentMetadata { id, text } | WorkerReply::PageText { id, text } => {
            (Some(id), Ok(ReplyValue::Text(text)))
        }
        WorkerReply::RenderPage {
            id,
            buffer,
            width,
            height,
            dpi,
        } => (
            Some(id),
            Ok(ReplyValue::Image(PageImage {
                pixels: buffer,
                width,
                height,
                dpi,
            })),
        ),
        WorkerReply::Slice { id, buffer }
        | WorkerReply::EndMultipage { id, buffer }
        | WorkerReply::BuildFromImages { id, buffer } => (Some(id), Ok(ReplyValue::Buffer(buffer))),
    };

    match registry.lock().await.fetch(id) {
        // send fails only if the caller dropped its future; nothing to do
        Some(completion) => {
            let _ = completion.send(outcome);
        }
        None => match &outcome {
            Err(error) => {
                tracing::error!(?id, code = %error.code, "unroutable worker error dropped")
            }
            Ok(_) => tracing::warn!(?id, "orphaned reply ignored"),
        },
    }
}

fn expect_done(value: ReplyValue) -> CallResult<()> {
    match value {
        ReplyValue::Done => Ok(()),
        _ => Err(CallError::UnexpectedReply),
    }
}

fn expect_page_count(value: ReplyValue) -> CallResult<u32> {
    match value {
        ReplyValue::PageCount(count) => Ok(count),
        _ => Err(CallError::UnexpectedReply),
    }
}

fn expect_text(value: ReplyValue) -> CallResult<String> {
    match value {
        ReplyValue::Text(text) => Ok(text),
        _ => Err(CallError::UnexpectedReply),
    }
}

fn expect_buffer(value: ReplyValue) -> CallResult<Vec<u8>> {
    match value {
        ReplyValue::Buffer(buffer) => Ok(buffer),
        _ => Err(CallError::UnexpectedReply),
    }
}

fn expect_image(value: ReplyValue) -> CallResult<PageImage> {
    match value {
        ReplyValue::Image(image) => Ok(image),
        _ => Err(CallError::UnexpectedReply),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_matches_shape() {
        assert!(expect_done(ReplyValue::Done).is_ok());
        assert_eq!(expect_page_count(ReplyValue::PageCount(4)).unwrap(), 4);
        assert_eq!(expect_text(ReplyValue::Text("t".into())).unwrap(), "t");
        assert_eq!(expect_buffer(ReplyValue::Buffer(vec![1])).unwrap(), vec![1]);
    }

    #[test]
    fn test_extraction_rejects_wrong_shape() {
        assert!(matches!(
            expect_done(ReplyValue::PageCount(1)),
            Err(CallError::UnexpectedReply)
        ));
        assert!(matches!(
            expect_image(ReplyValue::Buffer(vec![])),
            Err(CallError::UnexpectedReply)
        ));
    }

    #[tokio::test]
    async fn test_orphaned_reply_leaves_registry_untouched() {
        let registry = Mutex::new(CallRegistry::new());
        let progress = ProgressSlot::default();

        dispatch(
            WorkerReply::PageCount {
                id: 41,
                page_count: 1,
            },
            &registry,
            &progress,
        )
        .await;

        assert!(registry.lock().await.is_empty());
    }
}
