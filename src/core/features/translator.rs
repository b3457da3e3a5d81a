//! Translation service gateway
//!
//! The only boundary to the remote translation capability. A gateway call
//! either yields a `Translation` or a classified `TranslateError`; it never
//! retries and never touches session state.

pub mod types;

use async_trait::async_trait;
use std::time::Duration;

use crate::shared::error::{AppError, AppResult};
use crate::shared::settings::TranslatorSettings;
use crate::shared::types::{Language, Translation};
pub use types::{classify_status, TranslateError, TranslateResult, TranslationRequest};

#[async_trait]
pub trait TranslationGateway: Send + Sync {
    async fn translate(&self, request: &TranslationRequest) -> TranslateResult;
}

/// Gateway backed by the public Google Translate `translate_a/single` endpoint.
///
/// Requests `dt=t` (translation segments) and `dt=rm` (romanization).
pub struct GoogleTranslateGateway {
    http: reqwest::Client,
    endpoint: String,
}

impl GoogleTranslateGateway {
    pub fn new(settings: &TranslatorSettings) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| AppError::System(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(http, settings.endpoint.clone()))
    }

    pub(crate) fn with_client(http: reqwest::Client, endpoint: String) -> Self {
        Self { http, endpoint }
    }

    fn request_url(&self, request: &TranslationRequest) -> String {
        format!(
            "{}?client=gtx&sl={}&tl={}&dt=t&dt=rm&q={}",
            self.endpoint,
            request.source().code(),
            request.target().code(),
            urlencoding::encode(request.text())
        )
    }
}

#[async_trait]
impl TranslationGateway for GoogleTranslateGateway {
    async fn translate(&self, request: &TranslationRequest) -> TranslateResult {
        let url = self.request_url(request);
        tracing::debug!(
            source = %request.source(),
            target = %request.target(),
            chars = request.text().chars().count(),
            "sending translation request"
        );

        let response = self.http.get(&url).send().await.map_err(|e| {
            tracing::warn!(error = %e, "translation request failed");
            TranslateError::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, "translation service returned error status");
            return Err(classify_status(
                status.as_u16(),
                format!("Translation API error: {}", status),
            ));
        }

        let json: serde_json::Value = response.json().await.map_err(|e| {
            tracing::warn!(error = %e, "failed to decode translation response");
            TranslateError::Unavailable(format!("Failed to parse translation API response: {}", e))
        })?;

        parse_response(&json, request.source())
    }
}

/// Extract the translation and romanization from a `translate_a/single` body.
///
/// Translation segments sit at `[0][*][0]` and are concatenated; the
/// romanization of the source text sits at `[0][*][3]`. Romanization is kept
/// only when the source language calls for it.
pub fn parse_response(json: &serde_json::Value, source: Language) -> TranslateResult {
    let segments = json.get(0).and_then(|v| v.as_array()).ok_or_else(|| {
        TranslateError::Unavailable("Invalid response format: missing segments".to_string())
    })?;

    let mut translated_text = String::new();
    let mut romanization: Option<String> = None;

    for segment in segments {
        if let Some(text) = segment.get(0).and_then(|v| v.as_str()) {
            translated_text.push_str(text);
        }
        if let Some(rom) = segment.get(3).and_then(|v| v.as_str()) {
            if !rom.is_empty() {
                romanization = Some(rom.to_string());
            }
        }
    }

    if translated_text.trim().is_empty() {
        return Err(TranslateError::Rejected(
            "Empty translation received".to_string(),
        ));
    }

    Ok(Translation {
        translated_text,
        romanization: romanization.filter(|_| source.requires_romanization()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn joins_segments_and_reads_romanization() {
        let body = json!([
            [
                ["Hello. ", "こんにちは。", null, null, 10],
                ["How are you?", "お元気ですか？", null, null, 10],
                [null, null, null, "Kon'nichiwa. O genkidesuka?"]
            ],
            null,
            "ja"
        ]);

        let translation = parse_response(&body, Language::Ja).unwrap();
        assert_eq!(translation.translated_text, "Hello. How are you?");
        assert_eq!(
            translation.romanization.as_deref(),
            Some("Kon'nichiwa. O genkidesuka?")
        );
    }

    #[test]
    fn romanization_dropped_for_english_source() {
        let body = json!([[["こんにちは", "Hello", null, null, 1], [null, null, "Kon'nichiwa", null]]]);
        let translation = parse_response(&body, Language::En).unwrap();
        assert_eq!(translation.translated_text, "こんにちは");
        assert_eq!(translation.romanization, None);
    }

    #[test]
    fn malformed_body_is_unavailable() {
        let err = parse_response(&json!({"error": "nope"}), Language::En).unwrap_err();
        assert!(matches!(err, TranslateError::Unavailable(_)));
    }

    #[test]
    fn empty_translation_is_rejected() {
        let err = parse_response(&json!([[["", "???", null, null]]]), Language::En).unwrap_err();
        assert!(matches!(err, TranslateError::Rejected(_)));
    }

    /// Loopback gateway that ignores any proxy configured in the environment
    fn local_gateway(endpoint: String) -> GoogleTranslateGateway {
        let http = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        GoogleTranslateGateway::with_client(http, endpoint)
    }

    /// Serve exactly one HTTP response on a loopback port and return its URL.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let mut read = 0;
            while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf[read..]).await.unwrap();
                if n == 0 {
                    break;
                }
                read += n;
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{}/translate_a/single", addr)
    }

    fn hello_request() -> TranslationRequest {
        TranslationRequest::new("Hello", Language::En, Language::Ja).unwrap()
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_network_error() {
        // Nothing listens on a freshly released loopback port
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let gateway = local_gateway(format!("http://{}/translate_a/single", addr));

        let err = gateway.translate(&hello_request()).await.unwrap_err();
        assert!(matches!(err, TranslateError::Network(_)), "got {:?}", err);
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn service_error_status_is_unavailable() {
        let endpoint = serve_once("503 Service Unavailable", "").await;
        let gateway = local_gateway(endpoint);

        let err = gateway.translate(&hello_request()).await.unwrap_err();
        assert!(matches!(err, TranslateError::Unavailable(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn client_error_status_is_rejected() {
        let endpoint = serve_once("429 Too Many Requests", "").await;
        let gateway = local_gateway(endpoint);

        let err = gateway.translate(&hello_request()).await.unwrap_err();
        assert!(matches!(err, TranslateError::Rejected(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn successful_response_is_parsed() {
        let endpoint = serve_once("200 OK", r#"[[["こんにちは","Hello",null,null,1]],null,"en"]"#).await;
        let gateway = local_gateway(endpoint);

        let translation = gateway.translate(&hello_request()).await.unwrap();
        assert_eq!(translation.translated_text, "こんにちは");
        assert_eq!(translation.romanization, None);
    }

    #[test]
    fn url_encodes_text_and_languages() {
        let gateway = GoogleTranslateGateway::new(&TranslatorSettings::default()).unwrap();
        let request = TranslationRequest::new("a & b", Language::En, Language::Ja).unwrap();
        let url = gateway.request_url(&request);
        assert!(url.contains("sl=en&tl=ja"));
        assert!(url.contains("dt=rm"));
        assert!(url.ends_with("q=a%20%26%20b"));
    }
}
