use crate::{
    Result,
    config::REQUEST_TIMEOUT,
    error::Error,
};
use reqwest::{
    StatusCode,
    header,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{
    fmt,
    time::Duration,
};
use url::Url;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

/// One call against the remote service, independent of the HTTP stack.
///
/// Path segments are kept unencoded; the transport is responsible for
/// escaping them.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    fn new<S: Into<String>>(
        method: Method,
        segments: impl IntoIterator<Item = S>,
        body: Option<Value>,
    ) -> Self {
        Self {
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            body,
        }
    }

    pub fn get<S: Into<String>>(segments: impl IntoIterator<Item = S>) -> Self {
        Self::new(Method::Get, segments, None)
    }

    pub fn post<S: Into<String>>(segments: impl IntoIterator<Item = S>, body: Value) -> Self {
        Self::new(Method::Post, segments, Some(body))
    }

    pub fn put<S: Into<String>>(segments: impl IntoIterator<Item = S>, body: Value) -> Self {
        Self::new(Method::Put, segments, Some(body))
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// `/a/b` form, unencoded.
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}", self.method, self.path())?;
        for (i, (key, value)) in self.query.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{key}={value}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Boundary to the remote status / command service.
pub trait Transport: Send + Sync + 'static {
    fn base_url(&self) -> &str;

    fn send(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse>> + Send;
}

pub(crate) fn request_url<T: Transport>(transport: &T, request: &ApiRequest) -> String {
    format!("{}{}", transport.base_url(), request.path())
}

/// Sends `request` and decodes a 2xx JSON body.
pub async fn request_json<T: Transport, R: DeserializeOwned>(
    transport: &T,
    request: ApiRequest,
) -> Result<R> {
    let url = request_url(transport, &request);
    let response = transport.send(request).await?;
    ensure_success(&url, &response)?;
    decode(&url, &response)
}

/// Like [`request_json`] but maps a 404 to `None`.
pub async fn request_optional_json<T: Transport, R: DeserializeOwned>(
    transport: &T,
    request: ApiRequest,
) -> Result<Option<R>> {
    let url = request_url(transport, &request);
    let response = transport.send(request).await?;
    if response.status == StatusCode::NOT_FOUND.as_u16() {
        return Ok(None);
    }
    ensure_success(&url, &response)?;
    decode(&url, &response).map(Some)
}

fn ensure_success(url: &str, response: &ApiResponse) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }
    let body = String::from_utf8_lossy(&response.body).trim().to_string();
    let detail = if body.is_empty() {
        StatusCode::from_u16(response.status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or("<unavailable body>")
            .to_string()
    } else {
        body
    };
    Err(Error::Transport {
        url: url.to_string(),
        status: Some(response.status),
        detail,
    })
}

fn decode<R: DeserializeOwned>(url: &str, response: &ApiResponse) -> Result<R> {
    serde_json::from_slice(&response.body).map_err(|e| Error::malformed(url, e))
}

/// reqwest-backed transport used outside of tests.
#[derive(Clone)]
pub struct HttpTransport {
    base_url: String,
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| Error::Transport {
            url: base_url.clone(),
            status: None,
            detail: format!("invalid base url: {e}"),
        })?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport {
                url: base_url.clone(),
                status: None,
                detail: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { base_url, http })
    }

    fn url_for(&self, request: &ApiRequest) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| Error::Transport {
            url: self.base_url.clone(),
            status: None,
            detail: format!("invalid base url: {e}"),
        })?;
        url.path_segments_mut()
            .map_err(|_| Error::Transport {
                url: self.base_url.clone(),
                status: None,
                detail: "base url cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .extend(&request.segments);
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        Ok(url)
    }
}

impl Transport for HttpTransport {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let url = self.url_for(&request)?;
        let builder = match request.method {
            Method::Get => self.http.get(url.clone()),
            Method::Post => self.http.post(url.clone()),
            Method::Put => self.http.put(url.clone()),
        };
        let builder = builder.header(header::ACCEPT, "application/json");
        let builder = match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        };
        tracing::debug!("supra request {request}");
        let res = builder.send().await.map_err(|e| Error::Transport {
            url: url.to_string(),
            status: e.status().map(|s| s.as_u16()),
            detail: e.to_string(),
        })?;
        let status = res.status().as_u16();
        let body = res.bytes().await.map_err(|e| Error::Transport {
            url: url.to_string(),
            status: Some(status),
            detail: format!("failed to read response body: {e}"),
        })?;
        Ok(ApiResponse {
            status,
            body: body.to_vec(),
        })
    }
}

impl fmt::Display for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_url)
    }
}
