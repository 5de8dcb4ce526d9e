// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! HTTP binding of the `UploadPort`.
//!
//! Every command is a form POST to `<server><endpoint>?version=1&command=N`
//! with the payload in the `results` field.

use crate::config::ServerConfig;
use crate::domain::errors::Result;
use crate::ports::upload_port::{UploadPort, UploadRequest, UploadResponse};
use log::debug;
use reqwest::blocking::Client;
use std::time::Duration;

const PROTOCOL_VERSION: &str = "1";

pub struct HttpUploadAdapter {
    client: Client,
    base_url: String,
    client_name: Option<String>,
    auth_token: Option<String>,
}

impl HttpUploadAdapter {
    pub fn new(server: &ServerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(server.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: server.url.trim_end_matches('/').to_string(),
            client_name: server.client.clone(),
            auth_token: server.auth_token.clone(),
        })
    }
}

impl UploadPort for HttpUploadAdapter {
    fn post(&self, request: &UploadRequest) -> Result<UploadResponse> {
        let url = format!("{}{}", self.base_url, request.command.endpoint());
        let mut query = vec![
            ("version", PROTOCOL_VERSION.to_string()),
            ("command", request.command.code().to_string()),
        ];
        if let Some(client) = &self.client_name {
            query.push(("client", client.clone()));
        }
        debug!("POST {} command {}", url, request.command);

        let mut builder = self
            .client
            .post(&url)
            .query(&query)
            .form(&[("results", request.payload.as_str())]);
        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send()?;
        let status = response.status();
        let reason = status.canonical_reason().unwrap_or("").to_string();
        let body = response.text()?;
        Ok(UploadResponse {
            status: status.as_u16(),
            reason,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::MoverError;
    use crate::ports::upload_port::UploadCommand;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_posts_form_to_command_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/submitCSVFileUpload.htm"))
            .and(query_param("version", "1"))
            .and(query_param("command", "12"))
            .and(query_param("client", "acme"))
            .and(header("authorization", "Bearer s3cret"))
            .and(body_string_contains("results="))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"message":"ok","rowsUploaded":2,"success":true}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut config = ServerConfig::new(format!("{}/", server.uri()));
        config.client = Some("acme".into());
        config.auth_token = Some("s3cret".into());
        let response = tokio::task::spawn_blocking(move || {
            let adapter = HttpUploadAdapter::new(&config)?;
            adapter.post(&UploadRequest {
                command: UploadCommand::CustomerCsv,
                payload: "%7B%7D".into(),
            })
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(response.status, 200);
        assert!(response.body.contains("rowsUploaded"));
    }

    #[tokio::test]
    async fn test_error_status_is_a_response_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload.htm"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let config = ServerConfig::new(server.uri());
        let response = tokio::task::spawn_blocking(move || {
            HttpUploadAdapter::new(&config)?.post(&UploadRequest {
                command: UploadCommand::QuerySummary,
                payload: "{}".into(),
            })
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(response.status, 503);
        assert_eq!(response.reason, "Service Unavailable");
        assert_eq!(response.body, "busy");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let mut config = ServerConfig::new("http://127.0.0.1:9");
        config.timeout_secs = 2;
        let result = tokio::task::spawn_blocking(move || {
            HttpUploadAdapter::new(&config)?.post(&UploadRequest {
                command: UploadCommand::QueryResult,
                payload: String::new(),
            })
        })
        .await
        .unwrap();
        assert!(matches!(result, Err(MoverError::TransportError(_))));
    }
}
