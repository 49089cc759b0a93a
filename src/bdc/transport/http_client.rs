// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

use super::{HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::bdc::config::TransportConfig;
use crate::sdk::error::TransportError;
use crate::sdk::value::DynamicValue;

/// reqwest-backed transport resolving paths against a base URL
pub struct ReqwestTransport {
    client: Client,
    base_url: Url,
}

impl ReqwestTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let base = config.base_url.as_deref().ok_or_else(|| {
            TransportError::InvalidRequest("transport.base_url is not configured".to_string())
        })?;

        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        headers.insert("X-Api-Version", header_value(&config.api_version)?);
        for (name, value) in &config.headers {
            headers.insert(header_name(name)?, header_value(value)?);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: normalize_base(base)?,
        })
    }

    fn url_for(&self, path: &str) -> Result<Url, TransportError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }
}

/// Make sure the base ends in `/` so joins keep any path prefix
fn normalize_base(base: &str) -> Result<Url, TransportError> {
    if base.ends_with('/') {
        Ok(Url::parse(base)?)
    } else {
        Ok(Url::parse(&format!("{}/", base))?)
    }
}

fn header_name(name: &str) -> Result<HeaderName, TransportError> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| TransportError::InvalidRequest(format!("header name '{}': {}", name, e)))
}

fn header_value(value: &str) -> Result<HeaderValue, TransportError> {
    HeaderValue::from_str(value)
        .map_err(|e| TransportError::InvalidRequest(format!("header value '{}': {}", value, e)))
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn parse_body(text: String) -> DynamicValue {
    if text.trim().is_empty() {
        return DynamicValue::Null;
    }
    DynamicValue::from_json_str(&text).unwrap_or(DynamicValue::String(text))
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = self.url_for(&request.path)?;
        log::debug!("{} {}", request.method, url);

        let mut builder = self.client.request(method(request.method), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(header_name(name)?, header_value(value)?);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let headers: BTreeMap<String, String> = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(HttpResponse {
            status: status.as_u16(),
            headers,
            body: parse_body(text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method as http_method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport_for(server: &MockServer) -> ReqwestTransport {
        let config = TransportConfig {
            base_url: Some(format!("{}/api", server.uri())),
            ..TransportConfig::default()
        };
        ReqwestTransport::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_get_returns_json_body() {
        let server = MockServer::start().await;
        Mock::given(http_method("GET"))
            .and(path("/api/ping"))
            .and(query_param("verbose", "1"))
            .and(header("X-Api-Version", "2021-10-19"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"pong": true})))
            .mount(&server)
            .await;

        let mut request = HttpRequest::get("/ping");
        request.query.insert("verbose".to_string(), "1".to_string());
        let response = transport_for(&server).send(request).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, DynamicValue::from(json!({"pong": true})));
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let server = MockServer::start().await;
        Mock::given(http_method("POST"))
            .and(path("/api/events"))
            .and(body_json(json!({"name": "start"})))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let request = HttpRequest::post("events", DynamicValue::from(json!({"name": "start"})));
        let response = transport_for(&server).send(request).await.unwrap();

        assert_eq!(response.status, 204);
        assert!(response.body.is_null());
    }

    #[tokio::test]
    async fn test_error_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(http_method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = transport_for(&server)
            .send(HttpRequest::get("/ping"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, TransportError::Status { status: 503, ref body } if body == "maintenance")
        );
    }

    #[test]
    fn test_missing_base_url() {
        assert!(matches!(
            ReqwestTransport::new(&TransportConfig::default()),
            Err(TransportError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_parse_body() {
        assert!(parse_body(String::new()).is_null());
        assert_eq!(parse_body("plain".to_string()), DynamicValue::from("plain"));
        assert_eq!(parse_body("[1]".to_string()), DynamicValue::from(json!([1])));
    }
}
