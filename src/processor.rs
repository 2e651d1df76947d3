//! The worker-side collaborator boundary.
//!
//! The channel adapter treats the worker as an opaque command processor: for
//! every accepted command it eventually sends exactly one terminal reply
//! carrying the command's id, and may send any number of progress notices
//! before that. This module defines the trait for that black box and the
//! task loop that feeds it.

use async_trait::async_trait;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::protocol::{WorkerCommand, WorkerReply};

/// Sender half handed to the worker-side processor.
///
/// Cloneable, so a processor may stash it and reply later or from spawned
/// tasks; replies do not have to come back in command order.
#[derive(Clone)]
pub struct ReplySink {
    tx: mpsc::Sender<WorkerReply>,
}

impl ReplySink {
    pub(crate) fn new(tx: mpsc::Sender<WorkerReply>) -> Self {
        Self { tx }
    }

    /// Send a message back to the controller side.
    ///
    /// A closed channel (controller reset or dropped) is not an error for
    /// the worker; the message is discarded.
    pub async fn send(&self, reply: WorkerReply) {
        if self.tx.send(reply).await.is_err() {
            tracing::debug!("reply discarded: controller channel closed");
        }
    }

    /// Emit an out-of-band progress notice for a long-running command.
    pub async fn progress(&self, percent: u8) {
        self.send(WorkerReply::Process { percent }).await;
    }
}

/// The opaque worker-side command processor.
///
/// Contract: for every command received, send exactly one terminal reply
/// through the sink, echoing the command's id ([`WorkerCommand::id`]);
/// progress notices may precede it. The layer does not pre-validate command
/// order; a processor that requires sequencing (multipage assembly)
/// reports violations as `Error` replies.
#[async_trait]
pub trait CommandProcessor: Send + 'static {
    async fn process(&mut self, command: WorkerCommand, replies: &ReplySink);
}

/// Factory recreating the worker-side processor; `reset()` calls it to
/// spawn a replacement worker.
pub type ProcessorFactory = dyn Fn() -> Box<dyn CommandProcessor> + Send + Sync;

/// Run `processor` on its own task until the command channel closes.
pub(crate) fn spawn_worker_task(
    mut processor: Box<dyn CommandProcessor>,
    mut commands: mpsc::Receiver<WorkerCommand>,
    replies: ReplySink,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(command) = commands.recv().await {
            processor.process(command, &replies).await;
        }
        tracing::debug!("command stream ended; worker task exiting");
    })
}
