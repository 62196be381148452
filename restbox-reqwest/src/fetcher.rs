use async_trait::async_trait;
use restbox_core::{FetchOutcome, Fetcher, Method, RequestData};
use serde_json::Value;
use tracing::{debug, warn};

/// Fetcher sending requests through a [`reqwest::Client`].
///
/// Outcomes map as follows:
///
/// - a send error (connect, timeout, redirect loop) is [`FetchOutcome::Failed`],
/// - an error while reading the body is [`FetchOutcome::Failed`],
/// - a body that is not JSON is [`FetchOutcome::JsonParseError`],
/// - anything else is [`FetchOutcome::Response`], whatever the status.
#[derive(Debug, Clone, Default)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl ReqwestFetcher {
    /// Creates a fetcher using `client`. Request urls must be absolute.
    pub fn new(client: reqwest::Client) -> Self {
        ReqwestFetcher {
            client,
            base_url: None,
        }
    }

    /// Prefixes every request url with `base_url`.
    pub fn with_base_url(self, base_url: impl Into<String>) -> Self {
        ReqwestFetcher {
            base_url: Some(base_url.into()),
            ..self
        }
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    fn url(&self, request: &RequestData) -> String {
        match &self.base_url {
            Some(base) => format!("{}{}", base.trim_end_matches('/'), request.url()),
            None => request.url().to_string(),
        }
    }
}

fn method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Put => reqwest::Method::PUT,
        Method::Post => reqwest::Method::POST,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, request: RequestData) -> FetchOutcome {
        let url = self.url(&request);
        let mut builder = self.client.request(method(request.method()), &url);
        if let Some(body) = request.json() {
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(%url, error = %err, "request failed");
                return FetchOutcome::failed(err);
            }
        };
        let status = response.status().as_u16();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(err) => {
                warn!(%url, status, error = %err, "reading response body failed");
                return FetchOutcome::failed(err);
            }
        };
        debug!(%url, status, bytes = body.len(), "response received");

        if body.iter().all(u8::is_ascii_whitespace) {
            return FetchOutcome::response(status, Value::Null);
        }
        match serde_json::from_slice::<Value>(&body) {
            Ok(data) => FetchOutcome::response(status, data),
            Err(err) => FetchOutcome::json_parse_error(err),
        }
    }
}
