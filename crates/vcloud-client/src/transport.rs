//! HTTP transport
//!
//! [`TransportHelper`] turns a [`Request`] descriptor into a configured
//! `reqwest` request and decides which proxy, if any, to use. [`Transport`]
//! is the seam the client talks through; [`HttpTransport`] is the real one.

use crate::error::{ClientError, Result};
use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

/// Proxy variables in order of precedence
pub const PROXY_VARS: [&str; 4] = ["https_proxy", "HTTPS_PROXY", "http_proxy", "HTTP_PROXY"];

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Everything needed to issue one HTTP request
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub payload: Option<serde_json::Value>,
    pub cookies: Option<String>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            payload: None,
            cookies: None,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response as received, before any interpretation
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,

    /// Header names are lowercase
    pub headers: BTreeMap<String, String>,

    /// `Set-Cookie` name/value pairs joined with `; `
    pub cookies: Option<String>,

    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_cookies(mut self, cookies: impl Into<String>) -> Self {
        self.cookies = Some(cookies.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    async fn from_reqwest(response: reqwest::Response) -> Result<Self> {
        let status = response.status().as_u16();

        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_ascii_lowercase(),
                    String::from_utf8_lossy(value.as_bytes()).to_string(),
                )
            })
            .collect();

        let pairs: Vec<String> = response
            .cookies()
            .map(|cookie| format!("{}={}", cookie.name(), cookie.value()))
            .collect();
        let cookies = if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        };

        let body = response.text().await?;

        Ok(Self {
            status,
            headers,
            cookies,
            body,
        })
    }
}

/// Anything a proxy can be applied to
pub trait ProxyConfigurable: Sized {
    fn with_proxy(self, proxy: &str) -> Result<Self>;
}

impl ProxyConfigurable for reqwest::ClientBuilder {
    fn with_proxy(self, proxy: &str) -> Result<Self> {
        let proxy = reqwest::Proxy::all(proxy)
            .map_err(|e| ClientError::InvalidUrl(format!("proxy {}: {}", proxy, e)))?;
        Ok(self.proxy(proxy))
    }
}

/// Builds configured requests; performs no I/O itself
#[derive(Debug, Clone, Default)]
pub struct TransportHelper;

impl TransportHelper {
    pub fn new() -> Self {
        Self
    }

    /// Proxy from the environment, https tier before http tier
    pub fn proxy_from_env(&self) -> Option<String> {
        PROXY_VARS.iter().find_map(|var| {
            std::env::var(var)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        })
    }

    /// Apply the environment proxy to `builder`
    pub fn setup<B: ProxyConfigurable>(&self, builder: B) -> Result<B> {
        let proxy = self.proxy_from_env();
        self.apply_proxy(builder, proxy.as_deref())
    }

    /// Apply `proxy` to `builder`; `with_proxy` is not called without one
    pub fn apply_proxy<B: ProxyConfigurable>(&self, builder: B, proxy: Option<&str>) -> Result<B> {
        match proxy {
            Some(proxy) => {
                tracing::debug!("Using proxy {}", proxy);
                builder.with_proxy(proxy)
            }
            None => Ok(builder),
        }
    }

    /// Client builder with reqwest's own proxy detection switched off
    pub fn client_builder(&self) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .no_proxy()
            .timeout(DEFAULT_TIMEOUT)
    }

    /// Turn a request descriptor into a ready-to-send request
    pub fn build_request(
        &self,
        client: &reqwest::Client,
        request: &Request,
    ) -> Result<reqwest::Request> {
        let mut builder = client.request(request.method.clone(), &request.url);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(cookies) = &request.cookies {
            builder = builder.header(COOKIE, cookies.as_str());
        }

        if let Some(payload) = &request.payload {
            if request.header(CONTENT_TYPE.as_str()).is_none() {
                builder = builder.header(CONTENT_TYPE, "application/json");
            }
            builder = builder.body(serde_json::to_vec(payload)?);
        }

        Ok(builder.build()?)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: Request) -> Result<RawResponse>;
}

/// reqwest-backed transport
///
/// The proxy is resolved on every request; one client is kept per distinct
/// proxy value.
pub struct HttpTransport {
    helper: TransportHelper,
    clients: Mutex<HashMap<Option<String>, reqwest::Client>>,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            helper: TransportHelper::new(),
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn client_for(&self, proxy: Option<String>) -> Result<reqwest::Client> {
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(client) = clients.get(&proxy) {
            return Ok(client.clone());
        }

        let builder = self
            .helper
            .apply_proxy(self.helper.client_builder(), proxy.as_deref())?;
        let client = builder.build()?;
        clients.insert(proxy, client.clone());
        Ok(client)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: Request) -> Result<RawResponse> {
        let client = self.client_for(self.helper.proxy_from_env())?;
        let http_request = self.helper.build_request(&client, &request)?;

        tracing::debug!("{} {}", request.method, request.url);
        let response = client.execute(http_request).await?;
        let response = RawResponse::from_reqwest(response).await?;
        tracing::debug!("{} {} -> {}", request.method, request.url, response.status);

        Ok(response)
    }
}
