use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use insigma_adapters::{
    ChatOutput, ChatRequest, Credentials, EmbeddingInputType, InsigmaLlmAdapter,
    InsigmaRerankAdapter, InsigmaTextEmbeddingAdapter, InvokeErrorKind, LargeLanguageModel,
    PromptMessage, PromptRole, RerankModel, RerankRequest, TextEmbeddingModel,
};
use serde_json::{Value, json};

#[derive(Debug, Clone)]
struct MockResponse {
    status_code: u16,
    body: String,
}

impl MockResponse {
    fn json(body: Value) -> Self {
        Self {
            status_code: 200,
            body: body.to_string(),
        }
    }

    fn status(status_code: u16, body: &str) -> Self {
        Self {
            status_code,
            body: body.to_string(),
        }
    }
}

struct MockServer {
    addr: std::net::SocketAddr,
    captured_requests: Arc<Mutex<Vec<String>>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl MockServer {
    fn start(responses: Vec<MockResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
        let addr = listener.local_addr().expect("listener addr");

        let queue = Arc::new(Mutex::new(VecDeque::from(responses)));
        let captured_requests = Arc::new(Mutex::new(Vec::new()));

        let queue_clone = Arc::clone(&queue);
        let captured_clone = Arc::clone(&captured_requests);

        let handle = thread::spawn(move || {
            loop {
                let next_response = {
                    let mut queue = queue_clone.lock().expect("queue lock");
                    queue.pop_front()
                };

                let Some(response) = next_response else {
                    break;
                };

                let (mut stream, _) = listener.accept().expect("accept connection");
                stream
                    .set_read_timeout(Some(Duration::from_secs(3)))
                    .expect("set stream timeout");

                let request = read_http_request_with_body(&mut stream);
                captured_clone.lock().expect("capture lock").push(request);

                let response_text = build_http_response(response.status_code, &response.body);
                stream
                    .write_all(response_text.as_bytes())
                    .expect("write response");
                stream.flush().expect("flush response");
            }
        });

        Self {
            addr,
            captured_requests,
            handle: Some(handle),
        }
    }

    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn captured_request_paths(&self) -> Vec<String> {
        self.captured_requests
            .lock()
            .expect("capture lock")
            .iter()
            .map(|raw_request| {
                let request_line = raw_request.lines().next().unwrap_or_default();
                request_line
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or_default()
                    .to_string()
            })
            .collect()
    }

    fn captured_bodies(&self) -> Vec<Value> {
        self.captured_requests
            .lock()
            .expect("capture lock")
            .iter()
            .map(|raw_request| {
                let (_, body) = raw_request
                    .split_once("\r\n\r\n")
                    .expect("request has a header terminator");
                serde_json::from_str(body).expect("request body should be json")
            })
            .collect()
    }

    fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().expect("join mock server");
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn credentials(endpoint_url: String) -> Credentials {
    Credentials::from_pairs([
        ("endpoint_url", json!(endpoint_url)),
        ("api_key", json!("sk-integration")),
    ])
}

#[tokio::test]
async fn test_all_suffix_variants_reach_the_same_provider_routes() {
    let variants = ["", "/", "/v1", "/v1/", "/v1-openai", "/v1-openai/", "/openai-v1", "/openai-v1/"];
    let mut server = MockServer::start(
        variants
            .iter()
            .flat_map(|_| {
                [
                    MockResponse::json(json!({ "results": [] })),
                    MockResponse::json(json!({
                        "data": [{ "index": 0, "embedding": [0.5] }],
                        "usage": { "prompt_tokens": 1, "total_tokens": 1 }
                    })),
                ]
            })
            .collect(),
    );
    let rerank = InsigmaRerankAdapter::new().expect("create rerank adapter");
    let embedding = InsigmaTextEmbeddingAdapter::new().expect("create embedding adapter");

    for suffix in variants {
        let credentials = credentials(format!("{}{suffix}", server.url()));
        rerank
            .invoke(
                "bge-reranker",
                &credentials,
                &RerankRequest::new("q", vec!["doc".to_string()]),
            )
            .await
            .expect("rerank should succeed");
        embedding
            .invoke(
                "bge-m3",
                &credentials,
                &["doc".to_string()],
                None,
                EmbeddingInputType::Document,
            )
            .await
            .expect("embedding should succeed");
    }

    server.shutdown();
    let paths = server.captured_request_paths();
    assert_eq!(paths.len(), variants.len() * 2);
    for pair in paths.chunks(2) {
        assert_eq!(pair, ["/v1/rerank", "/v1/embeddings"]);
    }
}

#[tokio::test]
async fn test_rerank_scenario_filters_by_threshold() {
    let mut server = MockServer::start(vec![MockResponse::json(json!({
        "results": [
            { "index": 1, "relevance_score": 0.92 },
            { "index": 0, "relevance_score": 0.3 }
        ]
    }))]);
    let adapter = InsigmaRerankAdapter::new().expect("create rerank adapter");

    let result = adapter
        .invoke(
            "bge-reranker",
            &credentials(format!("{}/v1-openai/", server.url())),
            &RerankRequest::new("query", vec!["A".to_string(), "B".to_string()])
                .with_score_threshold(0.5),
        )
        .await
        .expect("rerank should succeed");

    assert_eq!(result.docs.len(), 1);
    assert_eq!(result.docs[0].index, 1);
    assert_eq!(result.docs[0].text, "B");
    assert_eq!(result.docs[0].score, 0.92);

    server.shutdown();
    assert_eq!(server.captured_bodies()[0]["top_n"], json!(3));
}

#[tokio::test]
async fn test_rerank_server_error_and_embedding_auth_error_map_differently() {
    let mut server = MockServer::start(vec![
        MockResponse::status(503, r#"{"error":"overloaded"}"#),
        MockResponse::status(401, r#"{"error":"bad key"}"#),
    ]);
    let credentials = credentials(server.url());

    let rerank_error = InsigmaRerankAdapter::new()
        .expect("create rerank adapter")
        .invoke(
            "bge-reranker",
            &credentials,
            &RerankRequest::new("q", vec!["doc".to_string()]),
        )
        .await
        .expect_err("503 should fail");
    let embedding_error = InsigmaTextEmbeddingAdapter::new()
        .expect("create embedding adapter")
        .invoke(
            "bge-m3",
            &credentials,
            &["doc".to_string()],
            None,
            EmbeddingInputType::Document,
        )
        .await
        .expect_err("401 should fail");

    assert_eq!(rerank_error.kind(), InvokeErrorKind::ServerUnavailable);
    assert_eq!(embedding_error.kind(), InvokeErrorKind::Unauthorized);
    server.shutdown();
}

#[tokio::test]
async fn test_llm_chat_round_trip_and_validation() {
    let mut server = MockServer::start(vec![
        MockResponse::json(json!({
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "北京" },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 9, "completion_tokens": 1, "total_tokens": 10 }
        })),
        MockResponse::status(200, "ok"),
    ]);
    let adapter = InsigmaLlmAdapter::new().expect("create llm adapter");
    let credentials = credentials(format!("{}/v1", server.url()));

    let mut request = ChatRequest::new(vec![PromptMessage::new(
        PromptRole::User,
        "中国的首都是哪里？",
    )]);
    request
        .model_parameters
        .insert("enable_thinking".to_string(), json!(false));

    let output = adapter
        .invoke("qwen3", &credentials, request)
        .await
        .expect("chat should succeed");
    let ChatOutput::Complete(result) = output else {
        panic!("expected a complete response");
    };
    assert_eq!(result.content, "北京");
    assert_eq!(result.usage.total_tokens, 10);

    adapter
        .validate_credentials("qwen3", &credentials)
        .await
        .expect("validation should pass");

    server.shutdown();
    assert_eq!(
        server.captured_request_paths(),
        vec!["/v1/chat/completions", "/v1/chat/completions"]
    );
    let bodies = server.captured_bodies();
    assert_eq!(
        bodies[0]["chat_template_kwargs"],
        json!({ "enable_thinking": false })
    );
    assert!(bodies[0].get("enable_thinking").is_none());
    assert_eq!(bodies[1]["max_tokens"], json!(70));
}

fn read_http_request_with_body(stream: &mut std::net::TcpStream) -> String {
    let mut request = Vec::new();
    let mut chunk = [0_u8; 1024];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(bytes_read) => {
                request.extend_from_slice(&chunk[..bytes_read]);

                if let Some(header_end) =
                    request.windows(4).position(|window| window == b"\r\n\r\n")
                {
                    let headers = String::from_utf8_lossy(&request[..header_end]).to_string();
                    let content_length = headers
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            if name.eq_ignore_ascii_case("content-length") {
                                value.trim().parse::<usize>().ok()
                            } else {
                                None
                            }
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }
            Err(error)
                if error.kind() == std::io::ErrorKind::WouldBlock
                    || error.kind() == std::io::ErrorKind::TimedOut =>
            {
                break;
            }
            Err(error) => panic!("failed reading request: {error}"),
        }
    }

    String::from_utf8_lossy(&request).to_string()
}

fn build_http_response(status_code: u16, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_code,
        status_reason(status_code),
        body.len(),
        body
    )
}

fn status_reason(status_code: u16) -> &'static str {
    match status_code {
        200 => "OK",
        401 => "Unauthorized",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
