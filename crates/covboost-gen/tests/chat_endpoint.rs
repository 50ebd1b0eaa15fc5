//! Exercises the client against a one-shot local HTTP server.

use std::path::PathBuf;

use covboost_core::{extract_code_block, FileCoverage, GenerationRequest, TestGenerator};
use covboost_gen::{GenConfig, GenError, ModelsClient};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve one request with `status` and `body`; yields the raw request text.
async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/chat/completions", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }

        let response = format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&buf).into_owned()
    });

    (url, handle)
}

fn request() -> GenerationRequest {
    GenerationRequest {
        target_path: PathBuf::from("/repo/src/lib.rs"),
        content: "pub fn one() -> u8 { 1 }\n".to_string(),
        coverage: FileCoverage {
            lines_covered: 0,
            lines_total: 1,
            ..Default::default()
        },
        coverage_percent: 0.0,
        siblings: vec![],
        model_id: "gpt-4o-mini".to_string(),
    }
}

#[tokio::test]
async fn generates_from_chat_completion() {
    let (url, server) = serve_once(
        "200 OK",
        r#"{"id":"c1","model":"gpt-4o-mini","choices":[{"index":0,"message":{"role":"assistant","content":"```rust\n#[test]\nfn test_one() {\n    assert_eq!(one(), 1);\n}\n```"},"finish_reason":"stop"}]}"#,
    )
    .await;

    let client = ModelsClient::new(GenConfig::new(&url, "gpt-4o-mini").with_token("t0k3n")).unwrap();
    let raw = client.generate(&request()).await.expect("generate");
    assert_eq!(
        extract_code_block(&raw),
        "#[test]\nfn test_one() {\n    assert_eq!(one(), 1);\n}"
    );

    let sent = server.await.unwrap();
    assert!(sent.starts_with("POST /chat/completions"));
    assert!(sent.to_ascii_lowercase().contains("authorization: bearer t0k3n"));
    assert!(sent.contains("\"model\":\"gpt-4o-mini\""));
    assert!(sent.contains("\"temperature\":0.7"));
}

#[tokio::test]
async fn api_error_status_is_reported() {
    let (url, server) = serve_once("429 Too Many Requests", r#"{"error":"rate limited"}"#).await;

    let client = ModelsClient::new(GenConfig::new(&url, "gpt-4o-mini").with_token("t")).unwrap();
    let err = client.chat_completion(vec![]).await.unwrap_err();
    match err {
        GenError::Api { status, body } => {
            assert_eq!(status, 429);
            assert!(body.contains("rate limited"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn empty_choices_become_external_call_error() {
    let (url, server) = serve_once("200 OK", r#"{"choices":[]}"#).await;

    let client = ModelsClient::new(GenConfig::new(&url, "gpt-4o-mini").with_token("t")).unwrap();
    let err = client.generate(&request()).await.unwrap_err();
    assert!(matches!(
        err,
        covboost_core::CovboostError::ExternalCall { .. }
    ));
    assert!(err.to_string().contains("empty response"));
    server.await.unwrap();
}
