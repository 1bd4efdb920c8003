use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use stream_api::{
    AutomationApiClient, ChatRequest, CommitBody, CommitPayload, StreamApiConfig, StreamApiError,
    StreamFrame,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration};

fn allow_local_integration() -> bool {
    std::env::var("STREAM_API_ALLOW_LOCAL_INTEGRATION")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

#[derive(Clone)]
struct ResponseChunk {
    delay_ms: u64,
    bytes: Vec<u8>,
}

#[derive(Clone)]
struct ScriptedResponse {
    status: u16,
    content_type: &'static str,
    chunks: Vec<ResponseChunk>,
}

struct ScriptedServer {
    base_url: String,
    request_count: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl ScriptedServer {
    async fn new(scripts: Vec<ScriptedResponse>) -> Self {
        let scripts = Arc::new(scripts);
        let request_count = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("local TCP listener should bind");
        let addr = listener
            .local_addr()
            .expect("resolved local listener address");
        let base_url = format!("http://{addr}");

        let handle = tokio::spawn({
            let scripts = Arc::clone(&scripts);
            let request_count = Arc::clone(&request_count);
            let requests = Arc::clone(&requests);

            async move {
                loop {
                    let (socket, _) = match listener.accept().await {
                        Ok(pair) => pair,
                        Err(_) => break,
                    };
                    let scripts = Arc::clone(&scripts);
                    let request_count = Arc::clone(&request_count);
                    let requests = Arc::clone(&requests);
                    tokio::spawn(async move {
                        serve_one(socket, scripts, request_count, requests).await;
                    });
                }
            }
        });

        Self {
            base_url,
            request_count,
            requests,
            handle,
        }
    }

    fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Acquire)
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("request log").clone()
    }

    fn shutdown(&self) {
        self.handle.abort();
    }
}

fn response_ndjson(lines: &[&str]) -> ScriptedResponse {
    let mut body = String::new();
    for line in lines {
        body.push_str(line);
        body.push('\n');
    }
    ScriptedResponse {
        status: 200,
        content_type: "application/x-ndjson",
        chunks: vec![ResponseChunk {
            delay_ms: 0,
            bytes: body.into_bytes(),
        }],
    }
}

fn response_json(status: u16, body: &str) -> ScriptedResponse {
    ScriptedResponse {
        status,
        content_type: "application/json",
        chunks: vec![ResponseChunk {
            delay_ms: 0,
            bytes: body.as_bytes().to_vec(),
        }],
    }
}

fn client_for(server: &ScriptedServer) -> AutomationApiClient {
    let config = StreamApiConfig::new(&server.base_url)
        .with_access_token("tok")
        .with_busy_retry(3, Duration::from_millis(10));
    AutomationApiClient::new(config).expect("client")
}

#[tokio::test]
async fn integration_chat_stream_decodes_frames() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_ndjson(&[
        r#"{"ping":true}"#,
        r#"{"id":"m1","type":"ai","data":{"content":"Hel"}}"#,
        r#"{"id":"m1","type":"ai","data":{"content":"lo"}}"#,
    ])])
    .await;
    let client = client_for(&server);

    let mut frames = Vec::new();
    client
        .stream_frames(
            &ChatRequest::new("auto-1", "hi", "default"),
            None,
            |frame| frames.push(frame),
        )
        .await
        .expect("stream should succeed");

    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0], StreamFrame::Ping);

    let requests = server.requests();
    assert!(requests[0].starts_with("POST /api/automations/chat"));
    assert!(requests[0].contains("authorization: Bearer tok"));
    assert!(requests[0].contains(r#""automationId":"auto-1""#));

    server.shutdown();
}

#[tokio::test]
async fn integration_error_frame_fails_stream() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_ndjson(&[
        r#"{"id":"m1","type":"ai","data":{"content":"partial"}}"#,
        r#"{"type":"error","data":{"content":"model unavailable"}}"#,
    ])])
    .await;
    let client = client_for(&server);

    let error = client
        .stream_frames(&ChatRequest::new("auto-1", "hi", "default"), None, |_| {})
        .await
        .expect_err("error frame should fail the stream");

    assert!(matches!(error, StreamApiError::StreamFailed { ref message } if message == "model unavailable"));
    server.shutdown();
}

#[tokio::test]
async fn integration_busy_chat_is_polled_then_opens() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![
        response_json(429, r#"{"error":"busy"}"#),
        response_json(429, r#"{"error":"busy"}"#),
        response_ndjson(&[r#"{"ping":true}"#]),
    ])
    .await;
    let client = client_for(&server);

    let mut frames = Vec::new();
    timeout(
        Duration::from_secs(5),
        client.stream_frames(&ChatRequest::new("a", "hi", "m"), None, |frame| {
            frames.push(frame)
        }),
    )
    .await
    .expect("busy polling should be bounded")
    .expect("third attempt should open the stream");

    assert_eq!(server.request_count(), 3);
    assert_eq!(frames, vec![StreamFrame::Ping]);
    server.shutdown();
}

#[tokio::test]
async fn integration_busy_chat_gives_up_after_limit() {
    if !allow_local_integration() {
        return;
    }

    let busy = response_json(429, r#"{"error":"busy"}"#);
    let server = ScriptedServer::new(vec![busy.clone(), busy.clone(), busy]).await;
    let client = client_for(&server);

    let error = client
        .open_chat_stream(&ChatRequest::new("a", "hi", "m"), None)
        .await
        .expect_err("busy limit should surface");

    assert!(matches!(error, StreamApiError::ServerBusy { attempts: 3 }));
    assert_eq!(server.request_count(), 3);
    server.shutdown();
}

#[tokio::test]
async fn integration_bad_request_and_quota_are_terminal() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![
        response_json(400, r#"{"error":"message too long"}"#),
        response_json(403, r#"{"error":"limit reached","plan":"free"}"#),
    ])
    .await;
    let client = client_for(&server);
    let request = ChatRequest::new("a", "hi", "m");

    let bad = client
        .open_chat_stream(&request, None)
        .await
        .expect_err("400 is terminal");
    assert!(matches!(bad, StreamApiError::BadRequest { ref message } if message == "message too long"));

    let quota = client
        .open_chat_stream(&request, None)
        .await
        .expect_err("403 is terminal");
    let StreamApiError::QuotaExceeded { payload, .. } = quota else {
        panic!("expected quota error");
    };
    assert_eq!(payload["plan"], "free");
    assert_eq!(server.request_count(), 2);
    server.shutdown();
}

#[tokio::test]
async fn integration_cancellation_during_stream() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![ScriptedResponse {
        status: 200,
        content_type: "application/x-ndjson",
        chunks: vec![
            ResponseChunk {
                delay_ms: 0,
                bytes: b"{\"ping\":true}\n".to_vec(),
            },
            ResponseChunk {
                delay_ms: 300,
                bytes: b"{\"ping\":true}\n".to_vec(),
            },
        ],
    }])
    .await;
    let client = Arc::new(client_for(&server));

    let cancellation = Arc::new(AtomicBool::new(false));
    let stream_task = tokio::spawn({
        let client = Arc::clone(&client);
        let cancellation = Arc::clone(&cancellation);
        async move {
            client
                .stream_frames(&ChatRequest::new("a", "hi", "m"), Some(&cancellation), |_| {})
                .await
        }
    });

    sleep(Duration::from_millis(120)).await;
    cancellation.store(true, Ordering::Release);

    let result = timeout(Duration::from_secs(5), stream_task)
        .await
        .expect("stream task should resolve")
        .expect("join handle should resolve")
        .expect_err("cancellation should abort stream");

    assert!(result.is_cancelled());
    server.shutdown();
}

#[tokio::test]
async fn integration_commit_reports_version_and_rejections() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![
        response_json(200, r#"{"success":true,"version":7}"#),
        response_json(200, r#"{"error":"version conflict"}"#),
        response_json(503, r#"{"error":{"message":"overloaded"}}"#),
    ])
    .await;
    let client = client_for(&server);
    let payload = CommitPayload {
        automation_id: "auto-1".to_owned(),
        body: CommitBody::Code("main();".to_owned()),
        dependencies: Vec::new(),
        environment_variables: Vec::new(),
        change_description: "AI update".to_owned(),
    };

    let receipt = client.commit(&payload).await.expect("first commit succeeds");
    assert_eq!(receipt.version, Some(7));

    let rejected = client.commit(&payload).await.expect_err("explicit error body");
    assert!(matches!(rejected, StreamApiError::CommitRejected { .. }));
    assert!(!rejected.is_retryable());

    let unavailable = client.commit(&payload).await.expect_err("503");
    assert!(unavailable.is_retryable());

    assert!(server.requests()[0].starts_with("POST /api/automations/auto-1/commit"));
    server.shutdown();
}

#[tokio::test]
async fn integration_workspace_variables_accept_list_body() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_json(
        200,
        r#"[{"name":"API_KEY","value":"secret"},{"name":"REGION","value":{"dev":"eu"}}]"#,
    )])
    .await;
    let client = client_for(&server);

    let variables = client
        .fetch_workspace_variables()
        .await
        .expect("variables fetch");

    assert_eq!(variables.len(), 2);
    assert_eq!(variables[0].name, "API_KEY");
    assert!(server.requests()[0].starts_with("GET /api/workspace/variables"));
    server.shutdown();
}

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        403 => "Forbidden",
        429 => "Too Many Requests",
        503 => "Service Unavailable",
        _ => "Error",
    }
}

async fn serve_one(
    mut socket: TcpStream,
    scripts: Arc<Vec<ScriptedResponse>>,
    request_count: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
) {
    let Ok(request) = read_request(&mut socket).await else {
        return;
    };
    requests.lock().expect("request log").push(request);

    let index = request_count.fetch_add(1, Ordering::AcqRel);
    let response = scripts
        .get(index)
        .cloned()
        .unwrap_or_else(|| response_json(500, r#"{"error":"unexpected request"}"#));

    let headers = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
        response.status,
        status_reason(response.status),
        response.content_type,
    );
    if socket.write_all(headers.as_bytes()).await.is_err() {
        return;
    }

    for chunk in response.chunks {
        if chunk.delay_ms > 0 {
            sleep(Duration::from_millis(chunk.delay_ms)).await;
        }
        let prefix = format!("{:X}\r\n", chunk.bytes.len());
        if socket.write_all(prefix.as_bytes()).await.is_err() {
            return;
        }
        if socket.write_all(&chunk.bytes).await.is_err() {
            return;
        }
        if socket.write_all(b"\r\n").await.is_err() {
            return;
        }
    }

    let _ = socket.write_all(b"0\r\n\r\n").await;
    let _ = socket.shutdown().await;
}

/// Reads the request head and a `content-length` body, returned as text.
async fn read_request(socket: &mut TcpStream) -> std::io::Result<String> {
    let mut request = Vec::new();
    let mut buffer = [0_u8; 2048];

    let head_end = loop {
        let n = socket.read(&mut buffer).await?;
        if n == 0 {
            return Ok(String::from_utf8_lossy(&request).into_owned());
        }
        request.extend_from_slice(&buffer[..n]);
        if let Some(position) = request.windows(4).position(|window| window == b"\r\n\r\n") {
            break position + 4;
        }
    };

    let head = String::from_utf8_lossy(&request[..head_end]).to_ascii_lowercase();
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while request.len() < head_end + content_length {
        let n = socket.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        request.extend_from_slice(&buffer[..n]);
    }

    Ok(String::from_utf8_lossy(&request).into_owned())
}
