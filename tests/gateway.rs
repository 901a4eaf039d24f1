//! Inference gateway tests.
//!
//! The model is replaced by an in-process fake, and the HTTP client is
//! pointed at a throwaway TCP server on localhost. No network access needed.

use async_trait::async_trait;
use edgequake_invoice::pipeline::llm::{extract_invoice, IMAGE_MIME};
use edgequake_invoice::{
    process, process_sync, process_to_xlsx, ExtractError, ExtractionConfig, InferenceRequest,
    InvoiceError, ModelReply, NormalizeError, OpenAiCompatibleVision, UploadedFile,
    ValidationError, VisionModel,
};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

const VALID_REPLY: &str = r#"{
    "invoice_number": "FV/12/2025",
    "issue_date": "15.01.2025",
    "seller_name": "Hurtownia Budowlana Sp. z o.o.",
    "seller_nip": "PL 123-456-78-90",
    "buyer_name": "Jan Kowalski",
    "items": [
        {"description": "Cement 25kg", "quantity": 10, "unit_price_net": 22.5,
         "vat_rate": 23, "total_gross": 276.75, "category": "Materiały"},
        {"description": "Transport", "unit_price_net": 100,
         "vat_rate": 8, "total_gross": 108, "category": null}
    ],
    "total_net_sum": 325,
    "total_gross_sum": 384.75,
    "currency": "PLN"
}"#;

// ── Fake model ──────────────────────────────────────────────────────────────

enum Behaviour {
    Reply(String),
    Fail(fn() -> ExtractError),
    Hang(Duration),
}

struct FakeModel {
    behaviour: Behaviour,
    calls: AtomicUsize,
    last_request: Mutex<Option<InferenceRequest>>,
}

impl FakeModel {
    fn replying(content: &str) -> Self {
        Self::new(Behaviour::Reply(content.to_string()))
    }

    fn new(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_request(&self) -> InferenceRequest {
        self.last_request
            .lock()
            .unwrap()
            .clone()
            .expect("model was called")
    }
}

#[async_trait]
impl VisionModel for FakeModel {
    fn name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, request: &InferenceRequest) -> Result<ModelReply, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        match &self.behaviour {
            Behaviour::Reply(content) => Ok(ModelReply::new(content.as_str())),
            Behaviour::Fail(make) => Err(make()),
            Behaviour::Hang(d) => {
                tokio::time::sleep(*d).await;
                Ok(ModelReply::new(VALID_REPLY))
            }
        }
    }
}

fn init_logs() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn images(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("cGFnZS0{i}")).collect()
}

fn schema_field(err: ExtractError) -> (String, ValidationError) {
    match err {
        ExtractError::SchemaViolation(e) => (e.field, e.reason),
        other => panic!("expected SchemaViolation, got {other:?}"),
    }
}

// ── Gateway behaviour ───────────────────────────────────────────────────────

#[tokio::test]
async fn valid_reply_becomes_normalised_document() {
    init_logs();
    let model = FakeModel::replying(VALID_REPLY);
    let doc = extract_invoice(&model, images(1), &ExtractionConfig::default())
        .await
        .unwrap();

    assert_eq!(doc.invoice_number(), "FV/12/2025");
    assert_eq!(doc.issue_date().to_string(), "2025-01-15");
    assert_eq!(doc.seller_nip(), "1234567890");
    assert_eq!(doc.items().len(), 2);
    assert_eq!(doc.items()[1].quantity(), 1.0);
    assert_eq!(doc.items()[1].category(), None);
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn request_carries_instruction_then_images_in_order() {
    let model = FakeModel::replying(VALID_REPLY);
    let config = ExtractionConfig::default();
    extract_invoice(&model, images(3), &config).await.unwrap();

    let req = model.last_request();
    assert_eq!(req.instruction, config.prompt());
    assert_eq!(req.images, images(3));
    assert_eq!(req.temperature, config.temperature);
    assert_eq!(req.max_tokens, config.max_tokens);

    let body = req.to_chat_completion_body("grok-test");
    let content = body["messages"][0]["content"].as_array().unwrap();
    assert_eq!(content.len(), 4);
    assert_eq!(content[0]["type"], "text");
    for (i, part) in content[1..].iter().enumerate() {
        assert_eq!(part["type"], "image_url");
        assert_eq!(
            part["image_url"]["url"],
            format!("data:{IMAGE_MIME};base64,cGFnZS0{i}")
        );
    }
}

#[tokio::test]
async fn empty_payload_list_is_rejected_without_a_call() {
    let model = FakeModel::replying(VALID_REPLY);
    let err = extract_invoice(&model, Vec::new(), &ExtractionConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::EmptyInput));
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn fenced_json_is_malformed_and_kept_verbatim() {
    let reply = format!("```json\n{VALID_REPLY}\n```");
    let model = FakeModel::replying(&reply);
    let err = extract_invoice(&model, images(1), &ExtractionConfig::default())
        .await
        .unwrap_err();
    match err {
        ExtractError::MalformedResponse { reply: kept, .. } => assert_eq!(kept, reply),
        other => panic!("expected MalformedResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn prose_reply_is_malformed() {
    let model = FakeModel::replying("Sorry, I cannot read this invoice.");
    let err = extract_invoice(&model, images(1), &ExtractionConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::MalformedResponse { .. }));
}

#[tokio::test]
async fn schema_violations_name_the_field() {
    let mut reply: Value = serde_json::from_str(VALID_REPLY).unwrap();
    reply["items"][1]["vat_rate"] = Value::from(123);
    let model = FakeModel::replying(&reply.to_string());
    let err = extract_invoice(&model, images(1), &ExtractionConfig::default())
        .await
        .unwrap_err();
    let (field, reason) = schema_field(err);
    assert_eq!(field, "items[1].vat_rate");
    assert!(matches!(reason, ValidationError::OutOfRange { .. }));

    let mut reply: Value = serde_json::from_str(VALID_REPLY).unwrap();
    reply["seller_nip"] = Value::from("123-456");
    let model = FakeModel::replying(&reply.to_string());
    let err = extract_invoice(&model, images(1), &ExtractionConfig::default())
        .await
        .unwrap_err();
    let (field, reason) = schema_field(err);
    assert_eq!(field, "seller_nip");
    assert_eq!(reason, ValidationError::InvalidTaxId { digits: 6 });
}

#[tokio::test]
async fn empty_items_is_a_schema_violation() {
    let mut reply: Value = serde_json::from_str(VALID_REPLY).unwrap();
    reply["items"] = Value::Array(Vec::new());
    let model = FakeModel::replying(&reply.to_string());
    let err = extract_invoice(&model, images(1), &ExtractionConfig::default())
        .await
        .unwrap_err();
    let (field, reason) = schema_field(err);
    assert_eq!(field, "items");
    assert_eq!(reason, ValidationError::EmptyItems);
}

#[tokio::test]
async fn json_array_reply_is_wrong_type() {
    let model = FakeModel::replying("[1, 2, 3]");
    let err = extract_invoice(&model, images(1), &ExtractionConfig::default())
        .await
        .unwrap_err();
    let (field, reason) = schema_field(err);
    assert_eq!(field, "response");
    assert!(matches!(reason, ValidationError::WrongType(_)));
}

#[tokio::test]
async fn model_errors_pass_through_unchanged() {
    let model = FakeModel::new(Behaviour::Fail(|| ExtractError::RateLimited {
        provider: "fake".into(),
        retry_after_secs: Some(7),
    }));
    let err = extract_invoice(&model, images(1), &ExtractionConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExtractError::RateLimited {
            retry_after_secs: Some(7),
            ..
        }
    ));
    assert_eq!(model.calls(), 1, "no retry");

    let model = FakeModel::new(Behaviour::Fail(|| ExtractError::AuthFailed {
        provider: "fake".into(),
        detail: "bad key".into(),
    }));
    let err = extract_invoice(&model, images(1), &ExtractionConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::AuthFailed { .. }));
}

#[tokio::test]
async fn slow_model_times_out() {
    init_logs();
    let model = FakeModel::new(Behaviour::Hang(Duration::from_secs(30)));
    let config = ExtractionConfig::builder()
        .api_timeout_secs(1)
        .build()
        .unwrap();
    let err = extract_invoice(&model, images(1), &config)
        .await
        .unwrap_err();
    match err {
        ExtractError::Timeout { elapsed_ms } => assert!(elapsed_ms >= 1000),
        other => panic!("expected Timeout, got {other:?}"),
    }
}

// ── OpenAI-compatible client against a local server ─────────────────────────

/// Serve one HTTP request with a canned response. The handle yields the
/// request head and body.
async fn serve_once(
    status_line: &'static str,
    headers: &'static str,
    body: String,
) -> (String, JoinHandle<(String, String)>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}/v1", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut reader = BufReader::new(stream);

        let mut request_head = String::new();
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            if line == "\r\n" || line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap();
                }
            }
            request_head.push_str(&line);
        }
        let mut request_body = vec![0u8; content_length];
        reader.read_exact(&mut request_body).await.unwrap();

        let response = format!(
            "{status_line}\r\nContent-Type: application/json\r\n{headers}\
             Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let mut stream = reader.into_inner();
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();

        (request_head, String::from_utf8(request_body).unwrap())
    });

    (base_url, handle)
}

fn request() -> InferenceRequest {
    edgequake_invoice::pipeline::llm::build_request(images(2), &ExtractionConfig::default())
        .unwrap()
}

#[tokio::test]
async fn http_client_posts_chat_completion_and_reads_reply() {
    init_logs();
    let body = serde_json::json!({
        "choices": [{"message": {"role": "assistant", "content": VALID_REPLY}}],
        "usage": {"prompt_tokens": 1500, "completion_tokens": 240}
    })
    .to_string();
    let (base_url, server) = serve_once("HTTP/1.1 200 OK", "", body).await;

    let model = OpenAiCompatibleVision::xai("xai-test-key").with_base_url(format!("{base_url}/"));
    let reply = model.complete(&request()).await.unwrap();
    assert_eq!(reply.content, VALID_REPLY);
    assert_eq!(reply.input_tokens, 1500);
    assert_eq!(reply.output_tokens, 240);

    let (head, sent) = server.await.unwrap();
    assert!(head.starts_with("POST /v1/chat/completions "), "{head}");
    assert!(head
        .to_ascii_lowercase()
        .contains("authorization: bearer xai-test-key"));

    let sent: Value = serde_json::from_str(&sent).unwrap();
    assert_eq!(sent["model"], "grok-2-vision-1212");
    assert_eq!(sent["messages"][0]["content"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn http_429_is_rate_limited_with_retry_after() {
    let (base_url, server) = serve_once(
        "HTTP/1.1 429 Too Many Requests",
        "Retry-After: 12\r\n",
        r#"{"error":"slow down"}"#.to_string(),
    )
    .await;

    let model = OpenAiCompatibleVision::xai("k").with_base_url(base_url);
    let err = model.complete(&request()).await.unwrap_err();
    match err {
        ExtractError::RateLimited {
            provider,
            retry_after_secs,
        } => {
            assert_eq!(provider, "xai");
            assert_eq!(retry_after_secs, Some(12));
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn http_401_is_auth_failure() {
    let (base_url, server) = serve_once(
        "HTTP/1.1 401 Unauthorized",
        "",
        r#"{"error":"invalid api key"}"#.to_string(),
    )
    .await;

    let model = OpenAiCompatibleVision::xai("wrong").with_base_url(base_url);
    let err = model.complete(&request()).await.unwrap_err();
    match err {
        ExtractError::AuthFailed { detail, .. } => assert!(detail.contains("401"), "{detail}"),
        other => panic!("expected AuthFailed, got {other:?}"),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn http_500_is_transport_error() {
    let (base_url, server) = serve_once(
        "HTTP/1.1 500 Internal Server Error",
        "",
        r#"{"error":"boom"}"#.to_string(),
    )
    .await;

    let model = OpenAiCompatibleVision::xai("k").with_base_url(base_url);
    let err = model.complete(&request()).await.unwrap_err();
    assert!(matches!(err, ExtractError::Transport { .. }), "{err:?}");
    server.await.unwrap();
}

#[tokio::test]
async fn refused_connection_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let model = OpenAiCompatibleVision::xai("k").with_base_url(format!("http://{addr}/v1"));
    let err = model.complete(&request()).await.unwrap_err();
    assert!(matches!(err, ExtractError::Transport { .. }), "{err:?}");
}

// ── End-to-end entry points ─────────────────────────────────────────────────

fn png_upload() -> UploadedFile {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        640,
        480,
        image::Rgb([240, 240, 240]),
    ));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    UploadedFile::new(buf.into_inner()).with_name("paragon.png")
}

#[tokio::test]
async fn process_normalises_then_extracts() {
    let model = FakeModel::replying(VALID_REPLY);
    let doc = process(&png_upload(), None, &model, &ExtractionConfig::default())
        .await
        .unwrap();
    assert_eq!(doc.seller_nip(), "1234567890");
    assert_eq!(model.last_request().images.len(), 1);
}

#[tokio::test]
async fn process_stops_before_the_model_on_bad_input() {
    let model = FakeModel::replying(VALID_REPLY);
    let file = UploadedFile::new(b"just some notes".to_vec());
    let err = process(&file, None, &model, &ExtractionConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        InvoiceError::Normalize(NormalizeError::UnsupportedFormat { .. })
    ));
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn process_to_xlsx_writes_the_workbook() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("faktura.xlsx");
    let model = FakeModel::replying(VALID_REPLY);

    let doc = process_to_xlsx(&png_upload(), None, &model, &ExtractionConfig::default(), &out)
        .await
        .unwrap();
    assert_eq!(doc.items().len(), 2);
    assert!(std::fs::metadata(&out).unwrap().len() > 0);
}

#[test]
fn process_sync_outside_a_runtime() {
    let model = FakeModel::replying(VALID_REPLY);
    let doc = process_sync(&png_upload(), None, &model, &ExtractionConfig::default()).unwrap();
    assert_eq!(doc.invoice_number(), "FV/12/2025");
}
