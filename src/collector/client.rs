//! HTTP implementation of the collector port.
//!
//! Uploads clips as multipart form data and fetches the clip collection as JSON.

use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;

use super::{AudioRecord, Collector, CollectorError, UploadPayload};
use crate::config::ServerConfig;

/// Collector reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCollector {
    client: reqwest::Client,
    upload_url: Url,
    list_url: Url,
}

impl HttpCollector {
    /// Creates a client for the configured collector endpoints.
    ///
    /// # Errors
    /// - If the base URL or a path does not form a valid URL
    /// - If the HTTP client cannot be built
    pub fn new(server: &ServerConfig) -> Result<Self, CollectorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(server.timeout_secs))
            .build()
            .map_err(|e| CollectorError::Build(e.to_string()))?;

        Ok(Self {
            client,
            upload_url: endpoint(&server.base_url, &server.upload_path)?,
            list_url: endpoint(&server.base_url, &server.list_path)?,
        })
    }

    pub fn upload_url(&self) -> &Url {
        &self.upload_url
    }

    pub fn list_url(&self) -> &Url {
        &self.list_url
    }
}

/// Joins a base origin and an endpoint path, tolerating missing or doubled slashes.
pub(crate) fn endpoint(base_url: &str, path: &str) -> Result<Url, CollectorError> {
    let joined = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| CollectorError::Build(format!("invalid URL '{joined}': {e}")))
}

#[async_trait]
impl Collector for HttpCollector {
    async fn upload(&self, payload: &UploadPayload) -> Result<(), CollectorError> {
        let audio_part = reqwest::multipart::Part::bytes(payload.audio.clone())
            .file_name(payload.file_name)
            .mime_str(payload.mime)
            .map_err(|e| CollectorError::Build(format!("audio part: {e}")))?;

        let form = reqwest::multipart::Form::new()
            .text("title", payload.title.clone())
            .part("audio", audio_part);

        tracing::debug!(
            "Collector upload:\n  URL: {}\n  Method: POST\n  Content-Type: multipart/form-data\n  Fields: title={:?}, audio={} ({} bytes, {})",
            self.upload_url,
            payload.title,
            payload.file_name,
            payload.audio.len(),
            payload.mime
        );

        let response = self
            .client
            .post(self.upload_url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| map_send_error(e, &self.upload_url))?;

        check_status(response).await?;
        tracing::info!("Uploaded clip '{}' ({} bytes)", payload.title, payload.audio.len());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<AudioRecord>, CollectorError> {
        tracing::debug!("Collector list: GET {}", self.list_url);

        let response = self
            .client
            .get(self.list_url.clone())
            .send()
            .await
            .map_err(|e| map_send_error(e, &self.list_url))?;

        let response = check_status(response).await?;
        let records: Vec<AudioRecord> = response
            .json()
            .await
            .map_err(|e| CollectorError::Decode(e.to_string()))?;

        tracing::debug!("Collector returned {} clips", records.len());
        Ok(records)
    }
}

fn map_send_error(e: reqwest::Error, url: &Url) -> CollectorError {
    if e.is_connect() {
        CollectorError::Connect(url.to_string())
    } else if e.is_timeout() {
        CollectorError::Timeout
    } else if e.is_builder() {
        CollectorError::Build(e.to_string())
    } else {
        CollectorError::Network(e.to_string())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CollectorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    tracing::warn!("Collector answered {}: {}", status, error_body);

    let message = match status.as_u16() {
        401 | 403 => "The collector refused the request. Check that the base URL points at an open endpoint.".to_string(),
        404 => "Collector endpoint not found. Check server.upload_path and server.list_path in the config.".to_string(),
        413 => "The clip is too large for the collector.".to_string(),
        429 => "Too many requests to the collector. Please wait and try again.".to_string(),
        500 | 502 | 503 | 504 => "The collector is experiencing issues. Please try again later.".to_string(),
        _ => format!("Collector error (status {status}): {error_body}"),
    };

    Err(CollectorError::Status {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{body_string_contains, header_regex, method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    fn server_config(base_url: &str) -> ServerConfig {
        ServerConfig {
            base_url: base_url.to_string(),
            timeout_secs: 5,
            ..ServerConfig::default()
        }
    }

    fn payload(title: &str) -> UploadPayload {
        UploadPayload {
            title: title.to_string(),
            audio: b"RIFF....WAVE".to_vec(),
            file_name: "recording.webm",
            mime: "audio/webm",
        }
    }

    #[test]
    fn endpoint_joins_slashes() {
        assert_eq!(
            endpoint("http://localhost:5000/", "/api/audio").unwrap().as_str(),
            "http://localhost:5000/api/audio"
        );
        assert_eq!(
            endpoint("http://localhost:5000", "/").unwrap().as_str(),
            "http://localhost:5000/"
        );
        assert!(endpoint("nope", "/").is_err());
    }

    #[tokio::test]
    async fn upload_sends_title_and_audio_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/audio"))
            .and(header_regex("content-type", "^multipart/form-data"))
            .and(body_string_contains("name=\"title\""))
            .and(body_string_contains("demo clip"))
            .and(body_string_contains("name=\"audio\"; filename=\"recording.webm\""))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = server_config(&server.uri());
        config.upload_path = "/api/audio".to_string();
        let collector = HttpCollector::new(&config).unwrap();

        collector.upload(&payload("demo clip")).await.unwrap();
    }

    #[tokio::test]
    async fn upload_maps_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let collector = HttpCollector::new(&server_config(&server.uri())).unwrap();
        let err = collector.upload(&payload("x")).await.unwrap_err();

        match err {
            CollectorError::Status { status, message } => {
                assert_eq!(status, 503);
                assert!(message.contains("try again later"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn upload_to_closed_port_is_a_connect_error() {
        let collector = HttpCollector::new(&server_config("http://127.0.0.1:9")).unwrap();
        let err = collector.upload(&payload("x")).await.unwrap_err();
        assert!(matches!(err, CollectorError::Connect(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn list_parses_records() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"_id": "a", "title": "first", "filePath": "uploads/a.webm"},
                {"_id": "b", "title": "second", "url": "https://cdn.example.com/b.webm"}
            ])))
            .mount(&server)
            .await;

        let collector = HttpCollector::new(&server_config(&server.uri())).unwrap();
        let records = collector.list().await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "first");
        assert_eq!(records[1].url.as_deref(), Some("https://cdn.example.com/b.webm"));
    }

    #[tokio::test]
    async fn list_rejects_non_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let collector = HttpCollector::new(&server_config(&server.uri())).unwrap();
        assert!(matches!(
            collector.list().await,
            Err(CollectorError::Decode(_))
        ));
    }

    /// Minimal in-memory collector: POST stores the multipart title, GET lists them.
    struct FakeStore {
        titles: Arc<Mutex<Vec<String>>>,
    }

    impl Respond for FakeStore {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let mut titles = self.titles.lock().unwrap();
            if request.method.as_str() == "POST" {
                let body = String::from_utf8_lossy(&request.body);
                let marker = "name=\"title\"\r\n\r\n";
                let Some(start) = body.find(marker).map(|i| i + marker.len()) else {
                    return ResponseTemplate::new(400);
                };
                let end = body[start..].find("\r\n").map(|i| start + i).unwrap_or(body.len());
                titles.push(body[start..end].to_string());
                return ResponseTemplate::new(201);
            }

            let records: Vec<_> = titles
                .iter()
                .enumerate()
                .map(|(i, t)| serde_json::json!({"_id": i.to_string(), "title": t, "filePath": format!("uploads/{i}.webm")}))
                .collect();
            ResponseTemplate::new(200).set_body_json(records)
        }
    }

    #[tokio::test]
    async fn uploaded_clip_appears_in_next_listing() {
        let server = MockServer::start().await;
        Mock::given(path("/"))
            .respond_with(FakeStore {
                titles: Arc::new(Mutex::new(Vec::new())),
            })
            .mount(&server)
            .await;

        let collector = HttpCollector::new(&server_config(&server.uri())).unwrap();
        assert!(collector.list().await.unwrap().is_empty());

        collector.upload(&payload("X")).await.unwrap();

        let records = collector.list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "X");
    }
}
