//! Pipeline tests driven through the public API with in-memory doubles.
//!
//! `FakePages` stands in for pdfium and `RecordingBackend` for the
//! chat-completions endpoint, so these run without a pdfium library or a
//! network connection.

use invoice2md::pipeline::llm::{ContentPart, MessageContent};
use invoice2md::{
    run_pipeline, ChatBackend, ChatCompletion, ChatCompletionRequest, ChunkSeparator,
    ConversionConfig, ConversionProgressCallback, OcrError, PageImage, PageSource,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test doubles ─────────────────────────────────────────────────────────────

/// A document of `total` pages; optionally fails to render one page.
struct FakePages {
    total: usize,
    fail_on: Option<usize>,
    rendered: AtomicUsize,
}

impl FakePages {
    fn new(total: usize) -> Self {
        Self {
            total,
            fail_on: None,
            rendered: AtomicUsize::new(0),
        }
    }

    fn failing_at(total: usize, page_num: usize) -> Self {
        Self {
            fail_on: Some(page_num),
            ..Self::new(total)
        }
    }
}

impl PageSource for FakePages {
    fn page_count(&self) -> usize {
        self.total
    }

    async fn render_page(&self, index: usize) -> Result<PageImage, OcrError> {
        let page_num = index + 1;
        if self.fail_on == Some(page_num) {
            return Err(OcrError::RasterisationFailed {
                page: page_num,
                detail: "corrupt content stream".into(),
            });
        }
        self.rendered.fetch_add(1, Ordering::SeqCst);
        Ok(PageImage::new(page_num, format!("data:image/png;base64,P{page_num}")))
    }
}

/// Records each request's page URIs and answers with a scripted reply.
#[derive(Default)]
struct RecordingBackend {
    calls: Mutex<Vec<Vec<String>>>,
    replies: Mutex<Vec<Result<ChatCompletion, OcrError>>>,
}

impl RecordingBackend {
    /// Replies are consumed in order; once exhausted, each call echoes its pages.
    fn with_replies(replies: Vec<Result<ChatCompletion, OcrError>>) -> Self {
        let mut replies = replies;
        replies.reverse();
        Self {
            calls: Mutex::new(Vec::new()),
            replies: Mutex::new(replies),
        }
    }

    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

fn image_urls(request: &ChatCompletionRequest) -> Vec<String> {
    request
        .messages
        .iter()
        .filter_map(|m| match &m.content {
            MessageContent::Parts(parts) => Some(parts),
            MessageContent::Text(_) => None,
        })
        .flatten()
        .filter_map(|part| match part {
            ContentPart::ImageUrl { image_url } => Some(image_url.url.clone()),
            ContentPart::Text { .. } => None,
        })
        .collect()
}

impl ChatBackend for RecordingBackend {
    async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletion, OcrError> {
        let urls = image_urls(request);
        let echo = urls
            .iter()
            .map(|u| u.trim_start_matches("data:image/png;base64,"))
            .collect::<Vec<_>>()
            .join(",");
        self.calls.lock().unwrap().push(urls);

        match self.replies.lock().unwrap().pop() {
            Some(reply) => reply,
            None => Ok(ChatCompletion::text(echo)),
        }
    }
}

fn config() -> ConversionConfig {
    ConversionConfig::builder()
        .api_base("https://llm.example.com/v1")
        .api_key("sk-test")
        .model("vision-test")
        .build()
        .unwrap()
}

fn uri(page_num: usize) -> String {
    format!("data:image/png;base64,P{page_num}")
}

// ── Batching ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn calls_equal_ceiling_of_pages_over_five() {
    for total in 0..=16 {
        let pages = FakePages::new(total);
        let backend = RecordingBackend::default();
        let output = run_pipeline(&pages, &backend, &config()).await.unwrap();

        let expected = total.div_ceil(5);
        assert_eq!(backend.calls().len(), expected, "pages={total}");
        assert_eq!(output.chunks.len(), expected, "pages={total}");
        assert_eq!(output.stats.total_batches, expected);
        assert_eq!(output.stats.total_pages, total);
    }
}

#[tokio::test]
async fn seven_pages_make_two_calls_in_order() {
    let pages = FakePages::new(7);
    let backend = RecordingBackend::default();
    let output = run_pipeline(&pages, &backend, &config()).await.unwrap();

    assert_eq!(
        backend.calls(),
        vec![(1..=5).map(uri).collect::<Vec<_>>(), (6..=7).map(uri).collect()]
    );
    assert_eq!(output.markdown, "P1,P2,P3,P4,P5\n\n---\n\nP6,P7");
    assert_eq!(
        output
            .chunks
            .iter()
            .map(|c| (c.batch_num, c.first_page, c.last_page))
            .collect::<Vec<_>>(),
        vec![(1, 1, 5), (2, 6, 7)]
    );
}

#[tokio::test]
async fn zero_pages_make_no_calls_and_empty_output() {
    let pages = FakePages::new(0);
    let backend = RecordingBackend::default();
    let output = run_pipeline(&pages, &backend, &config()).await.unwrap();

    assert!(backend.calls().is_empty());
    assert_eq!(output.markdown, "");
    assert!(output.chunks.is_empty());
}

#[tokio::test]
async fn custom_batch_size_respected() {
    let config = ConversionConfig::builder()
        .api_key("sk-test")
        .batch_size(3)
        .build()
        .unwrap();
    let pages = FakePages::new(7);
    let backend = RecordingBackend::default();
    run_pipeline(&pages, &backend, &config).await.unwrap();

    let sizes: Vec<usize> = backend.calls().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![3, 3, 1]);
}

#[tokio::test]
async fn page_order_is_preserved_across_chunks() {
    let pages = FakePages::new(23);
    let backend = RecordingBackend::default();
    let output = run_pipeline(&pages, &backend, &config()).await.unwrap();

    let flattened: Vec<String> = backend.calls().into_iter().flatten().collect();
    assert_eq!(flattened, (1..=23).map(uri).collect::<Vec<_>>());

    let firsts: Vec<usize> = output.chunks.iter().map(|c| c.first_page).collect();
    assert_eq!(firsts, vec![1, 6, 11, 16, 21]);
}

// ── Request contract ─────────────────────────────────────────────────────────

struct CapturingBackend {
    requests: Mutex<Vec<ChatCompletionRequest>>,
}

impl ChatBackend for CapturingBackend {
    async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletion, OcrError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(ChatCompletion::text("ok"))
    }
}

#[tokio::test]
async fn every_request_uses_fixed_parameters() {
    let backend = CapturingBackend {
        requests: Mutex::new(Vec::new()),
    };
    run_pipeline(&FakePages::new(6), &backend, &config())
        .await
        .unwrap();

    let requests = backend.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    for request in requests.iter() {
        assert_eq!(request.model, "vision-test");
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.max_tokens, 8000);
        assert_eq!(
            request.messages[0].content,
            MessageContent::Text(invoice2md::prompts::SYSTEM_PROMPT.into())
        );
    }
}

// ── Normalisation and joining ────────────────────────────────────────────────

#[tokio::test]
async fn fenced_replies_are_stripped_and_plain_replies_untouched() {
    let plain = "| Item | Qty |\n|---|---|\n| Widget | 2 |  \n";
    let backend = RecordingBackend::with_replies(vec![
        Ok(ChatCompletion::text("```markdown\n# Invoice INV-001\n```")),
        Ok(ChatCompletion::text(plain)),
    ]);
    let output = run_pipeline(&FakePages::new(6), &backend, &config())
        .await
        .unwrap();

    assert_eq!(output.chunks[0].markdown, "# Invoice INV-001");
    assert_eq!(output.chunks[1].markdown, plain);
    assert_eq!(
        output.markdown,
        format!("# Invoice INV-001\n\n---\n\n{plain}")
    );
}

#[tokio::test]
async fn separator_only_between_chunks() {
    let pages = FakePages::new(15);
    let backend = RecordingBackend::default();
    let output = run_pipeline(&pages, &backend, &config()).await.unwrap();

    assert_eq!(output.markdown.matches("\n\n---\n\n").count(), 2);
    assert!(!output.markdown.starts_with('\n'));
    assert!(!output.markdown.ends_with('\n'));
}

#[tokio::test]
async fn comment_separator_applied() {
    let config = ConversionConfig::builder()
        .api_key("sk-test")
        .separator(ChunkSeparator::Comment)
        .build()
        .unwrap();
    let output = run_pipeline(&FakePages::new(6), &RecordingBackend::default(), &config)
        .await
        .unwrap();
    assert_eq!(output.markdown, "P1,P2,P3,P4,P5\n\n<!-- batch 2 -->\n\nP6");
}

#[tokio::test]
async fn token_usage_summed() {
    let backend = RecordingBackend::with_replies(vec![
        Ok(ChatCompletion {
            content: "a".into(),
            prompt_tokens: 1000,
            completion_tokens: 200,
        }),
        Ok(ChatCompletion {
            content: "b".into(),
            prompt_tokens: 400,
            completion_tokens: 50,
        }),
    ]);
    let output = run_pipeline(&FakePages::new(7), &backend, &config())
        .await
        .unwrap();
    assert_eq!(output.stats.total_input_tokens, 1400);
    assert_eq!(output.stats.total_output_tokens, 250);
}

// ── Failure semantics ────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_credentials_fail_before_any_work() {
    let cases = [
        (
            ConversionConfig::builder().build().unwrap(),
            "missing key",
        ),
        (
            ConversionConfig::builder()
                .api_key("sk-test")
                .api_base("   ")
                .build()
                .unwrap(),
            "missing endpoint",
        ),
    ];

    for (config, label) in cases {
        let pages = FakePages::new(7);
        let backend = RecordingBackend::default();
        let err = run_pipeline(&pages, &backend, &config).await.unwrap_err();

        assert!(err.is_configuration(), "{label}: got {err:?}");
        assert_eq!(pages.rendered.load(Ordering::SeqCst), 0, "{label}");
        assert!(backend.calls().is_empty(), "{label}");
    }
}

#[tokio::test]
async fn render_failure_aborts_after_earlier_batches() {
    let pages = FakePages::failing_at(12, 7);
    let backend = RecordingBackend::default();
    let err = run_pipeline(&pages, &backend, &config()).await.unwrap_err();

    assert!(
        matches!(err, OcrError::RasterisationFailed { page: 7, .. }),
        "got {err:?}"
    );
    assert_eq!(backend.calls().len(), 1, "only pages 1-5 were sent");
    assert_eq!(pages.rendered.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn remote_failure_aborts_remaining_batches() {
    let backend = RecordingBackend::with_replies(vec![
        Ok(ChatCompletion::text("first")),
        Err(OcrError::AuthError {
            url: "https://llm.example.com/v1/chat/completions".into(),
            status: 401,
            detail: "invalid api key".into(),
        }),
    ]);
    let pages = FakePages::new(15);
    let err = run_pipeline(&pages, &backend, &config()).await.unwrap_err();

    assert!(matches!(err, OcrError::AuthError { status: 401, .. }), "got {err:?}");
    assert_eq!(backend.calls().len(), 2);
    assert_eq!(pages.rendered.load(Ordering::SeqCst), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pipeline_runs_on_spawned_task() {
    let handle = tokio::spawn(async {
        let pages = FakePages::new(7);
        let backend = RecordingBackend::default();
        let output = run_pipeline(&pages, &backend, &config()).await?;
        Ok::<_, OcrError>((output.stats.total_batches, backend.calls().len()))
    });
    assert_eq!(handle.await.unwrap().unwrap(), (2, 2));
}

// ── Progress events ──────────────────────────────────────────────────────────

#[derive(Default)]
struct EventLog {
    events: Mutex<Vec<String>>,
    seen_batches: Mutex<HashSet<usize>>,
}

impl ConversionProgressCallback for EventLog {
    fn on_conversion_start(&self, total_pages: usize, total_batches: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("start {total_pages}/{total_batches}"));
    }

    fn on_batch_start(&self, batch_num: usize, first_page: usize, last_page: usize) {
        self.seen_batches.lock().unwrap().insert(batch_num);
        self.events
            .lock()
            .unwrap()
            .push(format!("batch {batch_num} {first_page}-{last_page}"));
    }

    fn on_conversion_failed(&self, _error: &str) {
        self.events.lock().unwrap().push("failed".into());
    }

    fn on_conversion_complete(&self, total_batches: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {total_batches}"));
    }
}

#[tokio::test]
async fn progress_events_follow_batches() {
    let log = Arc::new(EventLog::default());
    let config = ConversionConfig::builder()
        .api_key("sk-test")
        .progress_callback(log.clone())
        .build()
        .unwrap();

    run_pipeline(&FakePages::new(7), &RecordingBackend::default(), &config)
        .await
        .unwrap();

    assert_eq!(
        *log.events.lock().unwrap(),
        vec!["start 7/2", "batch 1 1-5", "batch 2 6-7", "done 2"]
    );
}

#[tokio::test]
async fn progress_reports_failure_once() {
    let log = Arc::new(EventLog::default());
    let config = ConversionConfig::builder()
        .api_key("sk-test")
        .progress_callback(log.clone())
        .build()
        .unwrap();

    let _ = run_pipeline(&FakePages::failing_at(3, 2), &RecordingBackend::default(), &config)
        .await
        .unwrap_err();

    assert_eq!(*log.events.lock().unwrap(), vec!["start 3/1", "failed"]);
    assert!(log.seen_batches.lock().unwrap().is_empty());
}
