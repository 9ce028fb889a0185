//! Wire-level tests against an in-process stand-in for the generation server

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

use vidbench::bench::{EngineJobRunner, JobRunner};
use vidbench::client::EngineClient;
use vidbench::config::{BenchmarkMode, SuiteConfig};
use vidbench::error::{retry_async, RetryConfig};
use vidbench::workflow::{GraphTemplate, JobParams, WorkflowGraph};
use vidbench::VidBenchError;

/// Read one HTTP request (headers plus Content-Length body)
async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .filter_map(|l| l.split_once(':'))
                .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await.unwrap();
    stream.shutdown().await.ok();
}

async fn listen() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    (listener, url)
}

fn t2v_graph() -> WorkflowGraph {
    let config = SuiteConfig::default();
    GraphTemplate::from_suite(&config)
        .build(JobParams {
            mode: BenchmarkMode::TextToVideo,
            frames: 121,
            steps: 8,
            seed: 42,
            asset: None,
        })
        .unwrap()
}

#[tokio::test]
async fn test_liveness_probe() {
    let (listener, url) = listen().await;
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = read_request(&mut stream).await;
        respond(&mut stream, "200 OK", r#"{"system":{},"devices":[]}"#).await;
        request
    });

    let client = EngineClient::new(&url).unwrap();
    client.check_liveness().await.unwrap();
    let request = server.await.unwrap();
    assert!(request.starts_with("GET /system_stats"));
}

#[tokio::test]
async fn test_liveness_retried_until_server_ready() {
    let (listener, url) = listen().await;
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        respond(&mut stream, "503 Service Unavailable", "").await;

        let (mut stream, _) = listener.accept().await.unwrap();
        let request = read_request(&mut stream).await;
        respond(&mut stream, "200 OK", r#"{"system":{},"devices":[]}"#).await;
        request
    });

    let client = EngineClient::new(&url).unwrap();
    let retry = RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(10),
        backoff_multiplier: 2.0,
        max_delay: Duration::from_millis(50),
    };
    retry_async(|| client.check_liveness(), retry).await.unwrap();
    assert!(server.await.unwrap().starts_with("GET /system_stats"));
}

#[tokio::test]
async fn test_submission_rejected_carries_body() {
    let (listener, url) = listen().await;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        respond(
            &mut stream,
            "400 Bad Request",
            r#"{"error":"Cannot find node class LTXVImgToVideo"}"#,
        )
        .await;
    });

    let client = EngineClient::new(&url).unwrap();
    let err = client.submit(&t2v_graph()).await.unwrap_err();
    match err {
        VidBenchError::SubmissionRejected(msg) => {
            assert!(msg.contains("400"));
            assert!(msg.contains("LTXVImgToVideo"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_job_runs_to_completion_over_event_stream() {
    let (listener, url) = listen().await;
    let seen_client_id = Arc::new(Mutex::new(None::<String>));
    let ws_query = Arc::new(Mutex::new(None::<String>));

    let server = {
        let seen_client_id = seen_client_id.clone();
        let ws_query = ws_query.clone();
        tokio::spawn(async move {
            // Submission
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await;
            let body = request.split("\r\n\r\n").nth(1).unwrap_or_default();
            let json: serde_json::Value = serde_json::from_str(body).unwrap();
            assert_eq!(json["prompt"]["1"]["class_type"], "CheckpointLoaderSimple");
            *seen_client_id.lock().unwrap() = json["client_id"].as_str().map(str::to_string);
            respond(&mut stream, "200 OK", r#"{"prompt_id":"job-1","number":0}"#).await;

            // Event stream
            let (stream, _) = listener.accept().await.unwrap();
            let query = ws_query.clone();
            let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                *query.lock().unwrap() = req.uri().query().map(str::to_string);
                Ok(resp)
            };
            let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
                .await
                .unwrap();

            let frames = [
                r#"{"type":"status","data":{"status":{"exec_info":{"queue_remaining":1}}}}"#,
                r#"{"type":"executing","data":{"node":null,"prompt_id":"job-1"}}"#,
                r#"{"type":"execution_start","data":{"prompt_id":"job-1"}}"#,
                r#"{"type":"executing","data":{"node":"1","prompt_id":"job-1"}}"#,
                r#"{"type":"executing","data":{"node":"10","prompt_id":"job-1"}}"#,
            ];
            for frame in frames {
                ws.send(Message::Text(frame.to_string())).await.unwrap();
            }
            ws.send(Message::Binary(vec![0, 1, 2, 3])).await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            ws.send(Message::Text(
                r#"{"type":"executing","data":{"node":null,"prompt_id":"job-1"}}"#.to_string(),
            ))
            .await
            .unwrap();

            // Drain until the client closes
            while let Some(Ok(_)) = ws.next().await {}
        })
    };

    let runner = EngineJobRunner::new(EngineClient::new(&url).unwrap(), Duration::from_secs(10));
    let elapsed = runner.run_job(&t2v_graph()).await.unwrap();
    server.await.unwrap();

    assert!(elapsed >= Duration::from_millis(50));
    let client_id = seen_client_id.lock().unwrap().clone().unwrap();
    assert_eq!(
        ws_query.lock().unwrap().clone(),
        Some(format!("clientId={}", client_id))
    );
}

#[tokio::test]
async fn test_job_error_event_fails_run() {
    let (listener, url) = listen().await;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        respond(&mut stream, "200 OK", r#"{"prompt_id":"job-2"}"#).await;

        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::Text(
            r#"{"type":"executing","data":{"node":"10"}}"#.to_string(),
        ))
        .await
        .unwrap();
        ws.send(Message::Text(
            r#"{"type":"execution_error","data":{"exception_message":"CUDA out of memory"}}"#
                .to_string(),
        ))
        .await
        .unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let runner = EngineJobRunner::new(EngineClient::new(&url).unwrap(), Duration::from_secs(10));
    let err = runner.run_job(&t2v_graph()).await.unwrap_err();
    assert!(matches!(err, VidBenchError::ExecutionFailed(ref m) if m == "CUDA out of memory"));
}

#[tokio::test]
async fn test_silent_job_times_out() {
    let (listener, url) = listen().await;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        respond(&mut stream, "200 OK", r#"{"prompt_id":"job-3"}"#).await;

        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::Text(
            r#"{"type":"executing","data":{"node":"10"}}"#.to_string(),
        ))
        .await
        .unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let runner = EngineJobRunner::new(EngineClient::new(&url).unwrap(), Duration::from_millis(200));
    let err = runner.run_job(&t2v_graph()).await.unwrap_err();
    assert!(matches!(err, VidBenchError::Timeout(_)));
}

#[tokio::test]
async fn test_unanswered_submission_times_out() {
    let (listener, url) = listen().await;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        // Hold the connection open without ever answering
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(stream);
    });

    let runner = EngineJobRunner::new(EngineClient::new(&url).unwrap(), Duration::from_millis(200));
    let outcome = tokio::time::timeout(Duration::from_secs(5), runner.run_job(&t2v_graph()))
        .await
        .expect("runner must give up on its own");
    assert!(matches!(outcome, Err(VidBenchError::Timeout(d)) if d == Duration::from_millis(200)));
}
