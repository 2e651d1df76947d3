//! End-to-end document operations against a scripted worker.
//!
//! The fake worker's "document format" is form-feed separated UTF-8 page
//! text, enough to exercise every operation without any real codec.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use docworker::{
    buffer_url, codes, CallError, CommandProcessor, ErrorInfo, RawImage, ReplySink, WorkerChannel,
    WorkerCommand, WorkerReply,
};

const PAGE_BREAK: u8 = 0x0c;

#[derive(Default)]
struct FakeDocumentWorker {
    pages: Option<Vec<String>>,
    session: Option<Vec<RawImage>>,
}

impl FakeDocumentWorker {
    fn parse(buffer: &[u8]) -> Option<Vec<String>> {
        let text = String::from_utf8(buffer.to_vec()).ok()?;
        if text.is_empty() {
            return None;
        }
        Some(text.split('\x0c').map(str::to_string).collect())
    }

    fn encode(pages: &[String]) -> Vec<u8> {
        pages.join("\x0c").into_bytes()
    }

    async fn assemble(images: &[RawImage], replies: &ReplySink) -> Vec<u8> {
        let mut buffer = Vec::new();
        for (index, image) in images.iter().enumerate() {
            buffer.extend_from_slice(&image.pixels);
            buffer.push(PAGE_BREAK);
            replies.progress(((index + 1) * 100 / images.len()) as u8).await;
        }
        buffer
    }

    async fn handle(&mut self, command: WorkerCommand, replies: &ReplySink) -> WorkerReply {
        match command {
            WorkerCommand::OpenDocument { id, buffer } => match Self::parse(&buffer) {
                Some(pages) => {
                    self.pages = Some(pages);
                    WorkerReply::OpenDocument { id }
                }
                None => fail(id, codes::DOCUMENT_PARSE_FAILED, "buffer is not a page stream"),
            },
            WorkerCommand::PageCount { id } => match &self.pages {
                Some(pages) => WorkerReply::PageCount {
                    id,
                    page_count: pages.len() as u32,
                },
                None => fail(id, "NO_DOCUMENT", "no document open"),
            },
            WorkerCommand::DocumentMetadata { id, markup } => match &self.pages {
                Some(pages) => {
                    let text = if markup {
                        format!("<meta pages=\"{}\"/>", pages.len())
                    } else {
                        format!("{} pages", pages.len())
                    };
                    WorkerReply::DocumentMetadata { id, text }
                }
                None => fail(id, "NO_DOCUMENT", "no document open"),
            },
            WorkerCommand::PageText { id, page } => {
                match self.pages.as_ref().and_then(|p| p.get(page as usize)) {
                    Some(text) => WorkerReply::PageText {
                        id,
                        text: text.clone(),
                    },
                    None => fail(id, codes::PAGE_OUT_OF_RANGE, format!("page index {page}")),
                }
            }
            WorkerCommand::RenderPage { id, page } => {
                let in_range = self
                    .pages
                    .as_ref()
                    .is_some_and(|p| (page as usize) < p.len());
                if in_range {
                    let (width, height) = (16u32, 16u32);
                    WorkerReply::RenderPage {
                        id,
                        buffer: vec![0xff; (width * height * 4) as usize],
                        width,
                        height,
                        dpi: 300,
                    }
                } else {
                    fail(id, codes::PAGE_OUT_OF_RANGE, format!("page index {page}"))
                }
            }
            WorkerCommand::Slice { id, from, to } => match &self.pages {
                Some(pages) if from <= to && (to as usize) < pages.len() => WorkerReply::Slice {
                    id,
                    buffer: Self::encode(&pages[from as usize..=to as usize]),
                },
                _ => fail(id, codes::PAGE_OUT_OF_RANGE, format!("range {from}..={to}")),
            },
            WorkerCommand::StartMultipage { id, .. } => {
                if self.session.is_some() {
                    fail(id, codes::SEQUENCE_VIOLATION, "session already open")
                } else {
                    self.session = Some(Vec::new());
                    WorkerReply::StartMultipage { id }
                }
            }
            WorkerCommand::AddPage { id, image } => match &mut self.session {
                Some(images) => {
                    images.push(image);
                    WorkerReply::AddPage { id }
                }
                None => fail(id, codes::SEQUENCE_VIOLATION, "no open session"),
            },
            WorkerCommand::EndMultipage { id } => match self.session.take() {
                Some(images) if !images.is_empty() => WorkerReply::EndMultipage {
                    id,
                    buffer: Self::assemble(&images, replies).await,
                },
                _ => fail(id, codes::SEQUENCE_VIOLATION, "no pages added"),
            },
            WorkerCommand::BuildFromImages { id, images, .. } => {
                if images.is_empty() {
                    fail(id, codes::SEQUENCE_VIOLATION, "image batch is empty")
                } else {
                    WorkerReply::BuildFromImages {
                        id,
                        buffer: Self::assemble(&images, replies).await,
                    }
                }
            }
        }
    }
}

#[async_trait]
impl CommandProcessor for FakeDocumentWorker {
    async fn process(&mut self, command: WorkerCommand, replies: &ReplySink) {
        let reply = self.handle(command, replies).await;
        replies.send(reply).await;
    }
}

fn fail(id: u64, code: &str, message: impl Into<String>) -> WorkerReply {
    WorkerReply::Error {
        id: Some(id),
        error: ErrorInfo::new(code, message),
    }
}

fn doc(pages: &[&str]) -> Vec<u8> {
    pages.join("\x0c").into_bytes()
}

fn image() -> RawImage {
    RawImage {
        pixels: vec![9; 16],
        width: 2,
        height: 2,
    }
}

#[tokio::test]
async fn test_open_then_page_count() {
    let channel = WorkerChannel::spawn(FakeDocumentWorker::default);

    channel.open_document(doc(&["alpha", "beta"])).await.unwrap();
    assert_eq!(channel.page_count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_open_rejects_unparseable_buffer() {
    let channel = WorkerChannel::spawn(FakeDocumentWorker::default);

    let err = channel.open_document(Vec::new()).await.unwrap_err();
    assert!(matches!(err, CallError::DocumentParse(_)));
}

#[tokio::test]
async fn test_page_text_is_one_based() {
    let channel = WorkerChannel::spawn(FakeDocumentWorker::default);
    channel.open_document(doc(&["alpha", "beta"])).await.unwrap();

    assert_eq!(channel.page_text(2).await.unwrap(), "beta");
    assert!(matches!(
        channel.page_text(9).await,
        Err(CallError::PageOutOfRange(_))
    ));
}

#[tokio::test]
async fn test_render_page_in_and_out_of_range() {
    let channel = WorkerChannel::spawn(FakeDocumentWorker::default);
    channel.open_document(doc(&["alpha", "beta"])).await.unwrap();

    let page = channel.render_page(1).await.unwrap();
    assert!(page.width > 0 && page.height > 0 && page.dpi > 0);
    assert_eq!(page.pixels.len(), (page.width * page.height * 4) as usize);

    assert!(matches!(
        channel.render_page(3).await,
        Err(CallError::PageOutOfRange(_))
    ));
}

#[tokio::test]
async fn test_metadata_markup_and_plain() {
    let channel = WorkerChannel::spawn(FakeDocumentWorker::default);
    channel.open_document(doc(&["alpha", "beta"])).await.unwrap();

    assert!(channel.document_metadata(true).await.unwrap().contains("<meta"));
    assert_eq!(channel.document_metadata(false).await.unwrap(), "2 pages");
}

#[tokio::test]
async fn test_slice_yields_openable_document() {
    let channel = WorkerChannel::spawn(FakeDocumentWorker::default);
    channel
        .open_document(doc(&["alpha", "beta", "gamma"]))
        .await
        .unwrap();

    let buffer = channel.slice(0, 1).await.unwrap();
    assert!(!buffer.is_empty());

    let second = WorkerChannel::spawn(FakeDocumentWorker::default);
    second.open_document(buffer).await.unwrap();
    assert_eq!(second.page_count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_multipage_assembly_sequence() {
    let channel = WorkerChannel::spawn(FakeDocumentWorker::default);

    channel.start_multipage(3, false, false).await.unwrap();
    for _ in 0..3 {
        channel.add_page(image()).await.unwrap();
    }
    let buffer = channel.end_multipage().await.unwrap();
    assert!(!buffer.is_empty());
}

#[tokio::test]
async fn test_multipage_sequence_violations() {
    let channel = WorkerChannel::spawn(FakeDocumentWorker::default);

    assert!(matches!(
        channel.add_page(image()).await,
        Err(CallError::SequenceViolation(_))
    ));

    channel.start_multipage(1, false, false).await.unwrap();
    assert!(matches!(
        channel.end_multipage().await,
        Err(CallError::SequenceViolation(_))
    ));
}

#[tokio::test]
async fn test_build_from_images_reports_progress() {
    let channel = WorkerChannel::spawn(FakeDocumentWorker::default);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    channel.set_progress_observer(move |percent| sink.lock().push(percent));

    let images = vec![image(), image(), image(), image()];
    let buffer = channel.build_from_images(images, 1, false, false).await.unwrap();

    assert!(!buffer.is_empty());
    assert_eq!(*seen.lock(), vec![25, 50, 75, 100]);
}

#[tokio::test]
async fn test_buffer_url_for_built_document() {
    let channel = WorkerChannel::spawn(FakeDocumentWorker::default);

    channel.start_multipage(1, false, false).await.unwrap();
    channel.add_page(image()).await.unwrap();
    let buffer = channel.end_multipage().await.unwrap();

    let handle = buffer_url(&buffer).unwrap();
    assert!(handle.as_str().starts_with("file://"));
    assert_eq!(
        std::fs::read(handle.url().to_file_path().unwrap()).unwrap(),
        buffer
    );
}
