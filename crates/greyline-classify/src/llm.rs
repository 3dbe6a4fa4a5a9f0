//! LLM-backed classifier.
//!
//! Sends the health report to an OpenAI-compatible `/chat/completions`
//! endpoint and expects a JSON verdict `{"severity": ..., "reason": ...}`
//! back as the assistant message.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use greyline_core::{Classification, HealthReport, Severity};

use crate::{ClassificationError, Classifier, ClassifyFuture};

const SYSTEM_PROMPT: &str = "You are an expert AIOps analysis engine. Respond in JSON.";

/// Connection settings for the completion endpoint.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub model: String,
    /// API root, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

pub struct LlmClassifier {
    http: reqwest::Client,
    settings: LlmSettings,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Verdict {
    severity: String,
    #[serde(default)]
    reason: Option<String>,
}

impl LlmClassifier {
    pub fn new(settings: LlmSettings) -> Result<Self, ClassificationError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!("greyline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClassificationError::Transport(e.to_string()))?;
        Ok(Self { http, settings })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    async fn request(&self, report: &HealthReport) -> Result<Classification, ClassificationError> {
        let body = json!({
            "model": self.settings.model,
            "temperature": 0.1,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": build_prompt(report) },
            ],
        });

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = response.status();
        if let Some(err) = status_error(status) {
            return Err(err);
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ClassificationError::Timeout(self.settings.timeout)
            } else {
                ClassificationError::MalformedResponse(e.to_string())
            }
        })?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                ClassificationError::MalformedResponse("response has no message content".into())
            })?;

        let classification = parse_verdict(&content)?;
        debug!(
            node_id = %report.node_id,
            severity = %classification.severity,
            "llm analysis complete"
        );
        Ok(classification)
    }

    fn map_transport(&self, e: reqwest::Error) -> ClassificationError {
        if e.is_timeout() {
            ClassificationError::Timeout(self.settings.timeout)
        } else {
            ClassificationError::Transport(e.to_string())
        }
    }
}

impl Classifier for LlmClassifier {
    fn classify<'a>(&'a self, report: &'a HealthReport) -> ClassifyFuture<'a> {
        Box::pin(self.request(report))
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

/// Map a non-success HTTP status to its failure kind.
fn status_error(status: StatusCode) -> Option<ClassificationError> {
    match status {
        s if s.is_success() => None,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Some(ClassificationError::AuthFailure(format!("HTTP {status}")))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            Some(ClassificationError::RateLimited(format!("HTTP {status}")))
        }
        _ => Some(ClassificationError::Transport(format!("HTTP {status}"))),
    }
}

/// Parse the assistant's JSON verdict, tolerating a markdown code fence.
fn parse_verdict(content: &str) -> Result<Classification, ClassificationError> {
    let trimmed = content.trim();
    let json_text = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let verdict: Verdict = serde_json::from_str(json_text)
        .map_err(|e| ClassificationError::MalformedResponse(format!("{e}: {trimmed}")))?;
    let severity: Severity = verdict
        .severity
        .parse()
        .map_err(|e| ClassificationError::MalformedResponse(format!("{e}")))?;

    Ok(Classification::new(
        severity,
        verdict
            .reason
            .unwrap_or_else(|| "no reason provided".to_string()),
    ))
}

/// Build the analysis prompt for one report.
pub fn build_prompt(report: &HealthReport) -> String {
    let metrics = serde_json::to_string_pretty(report).unwrap_or_default();
    format!(
        r#"You are an expert AIOps agent responsible for maintaining a distributed storage cluster.
Analyze the following health metrics from node '{node_id}'.

Node health metrics:
```json
{metrics}
```

Severity levels:
- "none": all metrics are normal.
- "warning": early signs of trouble, node still operational.
    - latency_p99_ms between 150ms and 400ms
    - a small number of disk_io_errors (1-10)
    - checksum_mismatch_rate low but non-zero (< 0.01)
- "critical": imminent risk of failure, node needs replacement.
    - any smart_warnings > 0
    - disk_io_errors > 10
    - latency_p99_ms > 400ms
    - checksum_mismatch_rate >= 0.01

Respond with a JSON object ONLY, with two keys:
1. "severity": one of "none", "warning", "critical".
2. "reason": a brief technical explanation.
"#,
        node_id = report.node_id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a local port and return the base URL.
    async fn serve_once(status_line: &'static str, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_request(&mut stream).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\n\
                 content-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
        });

        format!("http://{addr}/v1")
    }

    /// Consume headers and body so the client sees a clean exchange.
    async fn read_request(stream: &mut tokio::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let content_length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + content_length {
                    return;
                }
            }
        }
    }

    fn classifier(base_url: String, timeout: Duration) -> LlmClassifier {
        LlmClassifier::new(LlmSettings {
            model: "test-model".into(),
            base_url,
            api_key: "sk-test".into(),
            timeout,
        })
        .unwrap()
    }

    fn completion(content: &str) -> String {
        json!({ "choices": [ { "message": { "role": "assistant", "content": content } } ] })
            .to_string()
    }

    #[test]
    fn prompt_embeds_report() {
        let mut report = HealthReport::healthy("node-7");
        report.latency_p99_ms = 321;
        let prompt = build_prompt(&report);
        assert!(prompt.contains("node 'node-7'"));
        assert!(prompt.contains("\"latency_p99_ms\": 321"));
        assert!(prompt.contains("JSON object ONLY"));
    }

    #[test]
    fn parse_plain_verdict() {
        let c = parse_verdict(r#"{"severity": "critical", "reason": "smart warnings"}"#).unwrap();
        assert_eq!(c, Classification::critical("smart warnings"));
    }

    #[test]
    fn parse_fenced_verdict() {
        let c = parse_verdict("```json\n{\"severity\": \"Warning\", \"reason\": \"latency\"}\n```")
            .unwrap();
        assert_eq!(c.severity, Severity::Warning);
    }

    #[test]
    fn parse_verdict_without_reason() {
        let c = parse_verdict(r#"{"severity": "none"}"#).unwrap();
        assert_eq!(c.severity, Severity::None);
        assert_eq!(c.reason, "no reason provided");
    }

    #[test]
    fn parse_rejects_prose_and_unknown_severity() {
        assert!(matches!(
            parse_verdict("the node looks fine"),
            Err(ClassificationError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_verdict(r#"{"severity": "meh"}"#),
            Err(ClassificationError::MalformedResponse(_))
        ));
    }

    #[test]
    fn status_mapping() {
        assert!(status_error(StatusCode::OK).is_none());
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED),
            Some(ClassificationError::AuthFailure(_))
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN),
            Some(ClassificationError::AuthFailure(_))
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS),
            Some(ClassificationError::RateLimited(_))
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY),
            Some(ClassificationError::Transport(_))
        ));
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let c = classifier("http://localhost:1/v1/".into(), Duration::from_secs(1));
        assert_eq!(c.endpoint(), "http://localhost:1/v1/chat/completions");
    }

    #[tokio::test]
    async fn classify_parses_completion() {
        let base = serve_once(
            "200 OK",
            completion(r#"{"severity":"warning","reason":"p99 latency 250ms"}"#),
        )
        .await;
        let c = classifier(base, Duration::from_secs(5));

        let result = c.classify(&HealthReport::healthy("node-1")).await.unwrap();
        assert_eq!(result, Classification::warning("p99 latency 250ms"));
    }

    #[tokio::test]
    async fn classify_maps_rate_limit() {
        let base = serve_once("429 Too Many Requests", "{}".to_string()).await;
        let c = classifier(base, Duration::from_secs(5));

        let err = c
            .classify(&HealthReport::healthy("node-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClassificationError::RateLimited(_)));
    }

    #[tokio::test]
    async fn classify_rejects_non_json_content() {
        let base = serve_once("200 OK", completion("I think it is fine.")).await;
        let c = classifier(base, Duration::from_secs(5));

        let err = c
            .classify(&HealthReport::healthy("node-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClassificationError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn classify_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // Accept and hold the connection without answering.
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let c = classifier(format!("http://{addr}/v1"), Duration::from_millis(100));
        let err = c
            .classify(&HealthReport::healthy("node-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClassificationError::Timeout(_)));
    }

    #[tokio::test]
    async fn classify_reports_connection_failure() {
        let c = classifier("http://127.0.0.1:1/v1".into(), Duration::from_secs(1));
        let err = c
            .classify(&HealthReport::healthy("node-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClassificationError::Transport(_)));
    }
}
