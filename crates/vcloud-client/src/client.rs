//! vCloud Director API client
//!
//! [`VCloudClient`] is the single gateway to the remote API. It owns the
//! session (token and cookie), retries transient failures, resolves links
//! and caches the org, vdc and catalogs it resolves.

use crate::cache::{CacheKey, EntityCache};
use crate::clock::{Clock, SystemClock};
use crate::control::Control;
use crate::entity::{Entity, Link, Task, media_type, rel};
use crate::error::{ClientError, Result};
use crate::session::{AUTH_HEADER, Session};
use crate::transport::{HttpTransport, RawResponse, Request, Transport};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use vcloud_config::Settings;

const VERSIONS_PATH: &str = "/api/versions";
const LOGIN_PATH: &str = "/api/sessions";
const INFO_PATH: &str = "/info";
const API_ACCEPT: &str = "application/*+json;version=5.1";

/// Which configured catalog to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogType {
    Vapp,
    Media,
}

impl CatalogType {
    fn cache_key(self) -> CacheKey {
        match self {
            CatalogType::Vapp => CacheKey::VappCatalog,
            CatalogType::Media => CacheKey::MediaCatalog,
        }
    }
}

impl fmt::Display for CatalogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogType::Vapp => write!(f, "vapp"),
            CatalogType::Media => write!(f, "media"),
        }
    }
}

/// What a call is aimed at
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// Path relative to the base URL
    Path(&'a str),
    /// Absolute reference returned by the API
    Href(&'a str),
}

impl<'a> From<&'a str> for Target<'a> {
    fn from(path: &'a str) -> Self {
        Target::Path(path)
    }
}

impl<'a> From<&'a String> for Target<'a> {
    fn from(path: &'a String) -> Self {
        Target::Path(path)
    }
}

impl<'a> From<&'a Link> for Target<'a> {
    fn from(link: &'a Link) -> Self {
        Target::Href(&link.href)
    }
}

impl<'a> From<&'a Entity> for Target<'a> {
    fn from(entity: &'a Entity) -> Self {
        Target::Href(&entity.href)
    }
}

impl<'a> From<&'a Task> for Target<'a> {
    fn from(task: &'a Task) -> Self {
        Target::Href(&task.href)
    }
}

/// Per-call request options
#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    pub payload: Option<serde_json::Value>,
    pub content_type: Option<String>,
    pub accept: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl InvokeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payload(mut self, payload: serde_json::Value, content_type: impl Into<String>) -> Self {
        self.payload = Some(payload);
        self.content_type = Some(content_type.into());
        self
    }

    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Successful response to [`VCloudClient::invoke`]
#[derive(Debug, Clone)]
pub struct Reply {
    url: String,
    raw: RawResponse,
}

impl Reply {
    fn from_raw(url: &str, raw: RawResponse) -> Result<Self> {
        if !raw.is_success() {
            return Err(ClientError::Http {
                status: raw.status,
                url: url.to_string(),
                body: raw.body,
            });
        }
        Ok(Self {
            url: url.to_string(),
            raw,
        })
    }

    pub fn status(&self) -> u16 {
        self.raw.status
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.raw.header(name)
    }

    pub fn cookies(&self) -> Option<&str> {
        self.raw.cookies.as_deref()
    }

    pub fn body(&self) -> &str {
        &self.raw.body
    }

    pub fn is_empty(&self) -> bool {
        self.raw.body.trim().is_empty()
    }

    pub fn entity(&self) -> Result<Entity> {
        self.parse()
    }

    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        if self.is_empty() {
            return Err(ClientError::UnexpectedResponse(format!(
                "empty response from {}",
                self.url
            )));
        }
        Ok(serde_json::from_str(&self.raw.body)?)
    }
}

pub struct VCloudClient {
    settings: Settings,
    base_url: Url,
    control: Control,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    session: Mutex<Option<Session>>,
    cache: EntityCache,
}

impl VCloudClient {
    /// Client over HTTP with the system clock; logs in on first use
    pub fn new(settings: &Settings) -> Result<Self> {
        Self::with_transport(
            settings,
            Arc::new(HttpTransport::new()),
            Arc::new(SystemClock),
        )
    }

    pub fn with_transport(
        settings: &Settings,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let base_url = Url::parse(&settings.url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", settings.url, e)))?;
        let control = Control::from_settings(&settings.control());
        tracing::debug!("Control settings for {}: {:?}", base_url, control);

        Ok(Self {
            settings: settings.clone(),
            base_url,
            control,
            transport,
            clock,
            session: Mutex::new(None),
            cache: EntityCache::new(),
        })
    }

    /// Client over HTTP with the session established up front
    pub async fn connect(settings: &Settings) -> Result<Self> {
        let client = Self::new(settings)?;
        client.session().await?;
        Ok(client)
    }

    pub fn control(&self) -> &Control {
        &self.control
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn org_name(&self) -> &str {
        &self.settings.entities.organization
    }

    pub fn vdc_name(&self) -> &str {
        &self.settings.entities.virtual_datacenter
    }

    pub fn vapp_catalog_name(&self) -> &str {
        &self.settings.entities.vapp_catalog
    }

    pub fn media_catalog_name(&self) -> &str {
        &self.settings.entities.media_catalog
    }

    pub fn media_storage_profile(&self) -> Option<&str> {
        self.settings.entities.media_storage_profile.as_deref()
    }

    pub fn catalog_name(&self, catalog_type: CatalogType) -> &str {
        match catalog_type {
            CatalogType::Vapp => self.vapp_catalog_name(),
            CatalogType::Media => self.media_catalog_name(),
        }
    }

    /// Issue an authenticated call
    pub async fn invoke<'a>(
        &self,
        method: Method,
        target: impl Into<Target<'a>>,
        options: InvokeOptions,
    ) -> Result<Reply> {
        let url = self.url_for(target.into())?;
        let session = self.session().await?;

        match self.send(&method, &url, &options, Some(&session)).await {
            Err(ClientError::Http { status: 401, .. }) => {
                tracing::warn!("Session rejected for {} {}, logging in again", method, url);
                let session = self.renew_session().await?;
                self.send(&method, &url, &options, Some(&session)).await
            }
            other => other,
        }
    }

    /// Fetch whatever `target` points at
    pub async fn resolve_link<'a>(&self, target: impl Into<Target<'a>>) -> Result<Entity> {
        self.invoke(Method::GET, target, InvokeOptions::new())
            .await?
            .entity()
    }

    /// Fresh copy of `entity`; the cache is left alone
    pub async fn reload(&self, entity: &Entity) -> Result<Entity> {
        self.resolve_link(entity).await
    }

    pub(crate) async fn reload_task(&self, task: &Task) -> Result<Task> {
        self.invoke(Method::GET, task, InvokeOptions::new())
            .await?
            .parse()
    }

    /// Look an entity up by id through the session's entity resolver
    pub async fn resolve_entity(&self, id: &str) -> Result<Entity> {
        let session = self.session().await?;
        let resolver = session
            .entity_resolver
            .ok_or_else(|| ClientError::not_found("Entity resolver", self.base_url.as_str()))?;

        let url = format!("{}/{}", resolver.href.trim_end_matches('/'), id);
        let reference = match self.resolve_link(&url).await {
            Err(ClientError::Http { status: 404, .. }) => {
                return Err(ClientError::not_found("Entity", id));
            }
            other => other?,
        };

        let alternate = reference
            .link_by_rel(rel::ALTERNATE)
            .ok_or_else(|| ClientError::not_found("Entity", id))?;
        self.resolve_link(alternate).await
    }

    pub async fn org(&self) -> Result<Entity> {
        let session = self.session().await?;
        if let Some(org) = self.cache.get(CacheKey::Org) {
            return Ok(org);
        }

        let org = self.resolve_link(&session.org_link).await?;
        self.cache.insert(CacheKey::Org, org.clone());
        Ok(org)
    }

    pub async fn vdc(&self) -> Result<Entity> {
        self.session().await?;
        if let Some(vdc) = self.cache.get(CacheKey::Vdc) {
            return Ok(vdc);
        }

        let org = self.org().await?;
        let link = org
            .vdc_link(self.vdc_name())
            .ok_or_else(|| ClientError::not_found("Virtual datacenter", self.vdc_name()))?;
        let vdc = self.resolve_link(link).await?;
        self.cache.insert(CacheKey::Vdc, vdc.clone());
        Ok(vdc)
    }

    pub async fn catalog(&self, catalog_type: CatalogType) -> Result<Entity> {
        self.session().await?;
        let key = catalog_type.cache_key();
        if let Some(catalog) = self.cache.get(key) {
            return Ok(catalog);
        }

        let name = self.catalog_name(catalog_type);
        let org = self.org().await?;
        let link = org
            .catalog_link(name)
            .ok_or_else(|| ClientError::not_found("Catalog", name))?;
        let catalog = self.resolve_link(link).await?;
        self.cache.insert(key, catalog.clone());
        Ok(catalog)
    }

    /// First catalog item called `name` whose entity has type `expected_type`
    pub async fn catalog_item(
        &self,
        catalog_type: CatalogType,
        name: &str,
        expected_type: &str,
    ) -> Result<Option<Entity>> {
        let catalog = self.catalog(catalog_type).await?;
        for reference in catalog.catalog_items(name) {
            let item = self.resolve_link(reference).await?;
            if item
                .entity
                .as_ref()
                .is_some_and(|entity| entity.is_type(expected_type))
            {
                return Ok(Some(item));
            }
        }
        tracing::debug!(
            "No {} item named {} of type {} in {} catalog",
            catalog_type,
            name,
            expected_type,
            self.catalog_name(catalog_type)
        );
        Ok(None)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Drop the current session; the next call logs in again
    pub async fn invalidate_session(&self) {
        self.session.lock().await.take();
    }

    /// Current session, logging in when there is none or it has expired
    pub async fn session(&self) -> Result<Session> {
        let mut current = self.session.lock().await;
        if let Some(session) = current.as_ref() {
            if !session.is_expired(self.clock.now(), self.control.cookie_timeout()) {
                return Ok(session.clone());
            }
            tracing::info!("Session cookie expired, logging in again");
        }

        let session = self.establish_session().await?;
        self.cache.clear();
        *current = Some(session.clone());
        Ok(session)
    }

    async fn renew_session(&self) -> Result<Session> {
        self.invalidate_session().await;
        self.session().await
    }

    async fn establish_session(&self) -> Result<Session> {
        self.login().await.map_err(|e| match e {
            ClientError::Authentication(_) => e,
            other => ClientError::Authentication(other.to_string()),
        })
    }

    /// Version discovery, login and info probe
    async fn login(&self) -> Result<Session> {
        let options = InvokeOptions::new();

        let versions_url = self.url_for(Target::Path(VERSIONS_PATH))?;
        let versions = self
            .send(&Method::GET, &versions_url, &options, None)
            .await?
            .entity()?;
        let login_url = self.url_for(Target::Href(versions.login_url().unwrap_or(LOGIN_PATH)))?;

        let principal = self.settings.login_principal();
        let credentials = STANDARD.encode(format!("{}:{}", principal, self.settings.password));
        let login_options =
            InvokeOptions::new().header("Authorization", format!("Basic {}", credentials));
        let reply = self
            .send(&Method::POST, &login_url, &login_options, None)
            .await?;

        let token = reply.header(AUTH_HEADER).map(str::to_string);
        let cookies = reply.cookies().map(str::to_string);
        if token.is_none() && cookies.is_none() {
            return Err(ClientError::Authentication(
                "login response carried neither token nor cookies".to_string(),
            ));
        }

        let session_entity = reply.entity()?;
        let org_link = session_entity
            .links
            .iter()
            .find(|l| l.is_type(media_type::ORG) && l.name.as_deref() == Some(self.org_name()))
            .or_else(|| session_entity.org_link())
            .cloned()
            .ok_or_else(|| {
                ClientError::Authentication(format!(
                    "session for {} does not link to an organization",
                    principal
                ))
            })?;

        let session = Session {
            token,
            cookies,
            org_link,
            entity_resolver: session_entity.entity_resolver_link().cloned(),
            established_at: self.clock.now(),
        };

        let info_url = self.url_for(Target::Path(INFO_PATH))?;
        let info = self
            .send(&Method::GET, &info_url, &options, Some(&session))
            .await?;
        tracing::debug!("Info probe answered {}", info.status());

        tracing::info!("Logged in to {} as {}", self.base_url, principal);
        Ok(session)
    }

    /// One call with the transient-failure retry policy applied
    async fn send(
        &self,
        method: &Method,
        url: &str,
        options: &InvokeOptions,
        session: Option<&Session>,
    ) -> Result<Reply> {
        let attempts = self.control.retry_max.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let request = self.build_request(method, url, options, session);
            let result = match self.transport.execute(request).await {
                Ok(raw) => Reply::from_raw(url, raw),
                Err(e) => Err(e),
            };

            match result {
                Err(e) if e.is_transient() && attempt < attempts => {
                    tracing::warn!(
                        "{} {} failed (attempt {}/{}): {}",
                        method,
                        url,
                        attempt,
                        attempts,
                        e
                    );
                    self.clock.sleep(self.control.retry_delay()).await;
                }
                Err(e) => {
                    tracing::debug!("{} {} failed: {}", method, url, e);
                    return Err(e);
                }
                Ok(reply) => return Ok(reply),
            }
        }
    }

    fn build_request(
        &self,
        method: &Method,
        url: &str,
        options: &InvokeOptions,
        session: Option<&Session>,
    ) -> Request {
        let mut request = Request::new(method.clone(), url);
        request.headers.push((
            "Accept".to_string(),
            options
                .accept
                .clone()
                .unwrap_or_else(|| API_ACCEPT.to_string()),
        ));
        if let Some(content_type) = &options.content_type {
            request
                .headers
                .push(("Content-Type".to_string(), content_type.clone()));
        }
        request.headers.extend(options.headers.iter().cloned());
        request.payload = options.payload.clone();

        if let Some(session) = session {
            request.headers.extend(session.auth_headers());
            request.cookies = session.cookies.clone();
        }
        request
    }

    fn url_for(&self, target: Target<'_>) -> Result<String> {
        let raw = match target {
            Target::Path(path) => path,
            Target::Href(href) => href,
        };
        self.base_url
            .join(raw)
            .map(String::from)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", raw, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use serde_json::json;
    use std::time::Duration;
    use vcloud_config::ControlSettings;

    #[test]
    fn test_reads_control_settings() {
        let (client, _, _) = fake_client(Some(ControlSettings {
            wait_max: Some(400),
            wait_delay: Some(10),
            retry_max: Some(5),
            retry_delay: Some(500),
            cookie_timeout: Some(1200),
        }));
        assert_eq!(client.control().wait_max, 400);
        assert_eq!(client.control().wait_delay, 10);
        assert_eq!(client.control().retry_max, 5);
        assert_eq!(client.control().retry_delay, 500);
        assert_eq!(client.control().cookie_timeout, 1200);
    }

    #[test]
    fn test_default_control_settings() {
        let (client, _, _) = fake_client(None);
        assert_eq!(*client.control(), Control::default());
    }

    #[test]
    fn test_reads_entity_names_from_settings() {
        let (client, _, _) = fake_client(None);
        assert_eq!(client.org_name(), ORG_NAME);
        assert_eq!(client.vdc_name(), VDC_NAME);
        assert_eq!(client.vapp_catalog_name(), VAPP_CATALOG_NAME);
        assert_eq!(client.media_catalog_name(), MEDIA_CATALOG_NAME);
    }

    #[tokio::test]
    async fn test_session_establishment_sequence() {
        let (client, transport, _) = fake_client(None);

        let reply = client
            .invoke(Method::GET, "/info", InvokeOptions::new())
            .await
            .unwrap();
        assert_eq!(reply.status(), 204);

        let requests = transport.requests();
        assert_eq!(requests.len(), 4);

        assert_eq!(requests[0].url, VERSIONS_URL);
        assert_eq!(requests[0].cookies, None);
        assert_eq!(requests[0].header(AUTH_HEADER), None);

        assert_eq!(requests[1].method, Method::POST);
        assert_eq!(requests[1].url, LOGIN_URL);
        assert_eq!(requests[1].cookies, None);
        let expected = format!("Basic {}", STANDARD.encode("admin@acme:secret"));
        assert_eq!(requests[1].header("Authorization"), Some(expected.as_str()));

        assert_eq!(requests[2].url, INFO_URL);
        assert_eq!(requests[2].cookies.as_deref(), Some(COOKIES));
        assert_eq!(requests[2].header(AUTH_HEADER), Some(TOKEN));

        assert_eq!(requests[3].url, INFO_URL);
        assert_eq!(requests[3].cookies.as_deref(), Some(COOKIES));
    }

    #[tokio::test]
    async fn test_login_failure_is_authentication_error() {
        let (client, transport, _) = fake_client(None);
        transport.reset(Method::POST, LOGIN_URL);
        transport.respond(Method::POST, LOGIN_URL, RawResponse::new(401, "bad credentials"));

        let err = client.org().await.unwrap_err();
        assert!(matches!(err, ClientError::Authentication(_)), "{:?}", err);
        assert_eq!(transport.count(&Method::GET, ORG_URL), 0);
    }

    #[tokio::test]
    async fn test_failed_info_probe_is_authentication_error() {
        let (client, transport, _) = fake_client(None);
        transport.reset(Method::GET, INFO_URL);
        transport.respond(Method::GET, INFO_URL, RawResponse::new(500, "down"));

        let err = client.session().await.unwrap_err();
        assert!(matches!(err, ClientError::Authentication(_)), "{:?}", err);
        assert_eq!(
            transport.count(&Method::GET, INFO_URL),
            Control::RETRY_MAX as usize
        );
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let (client, transport, clock) = fake_client(None);
        transport.reset(Method::GET, ORG_URL);
        transport.fail(Method::GET, ORG_URL, "connection reset by peer");
        transport.respond_json(Method::GET, ORG_URL, 200, json!({"href": ORG_URL, "name": ORG_NAME}));

        let org = client.resolve_link(ORG_URL).await.unwrap();

        assert_eq!(org.name.as_deref(), Some(ORG_NAME));
        assert_eq!(transport.count(&Method::GET, ORG_URL), 2);
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(Control::RETRY_DELAY)]);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let (client, transport, clock) = fake_client(Some(ControlSettings {
            retry_max: Some(2),
            retry_delay: Some(500),
            ..ControlSettings::default()
        }));
        transport.reset(Method::GET, ORG_URL);
        transport.respond(Method::GET, ORG_URL, RawResponse::new(503, "busy"));

        let err = client.resolve_link(ORG_URL).await.unwrap_err();

        assert!(matches!(err, ClientError::Http { status: 503, .. }), "{:?}", err);
        assert_eq!(transport.count(&Method::GET, ORG_URL), 2);
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(500)]);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let (client, transport, _) = fake_client(None);
        let url = format!("{}/api/vApp/vm-1", BASE_URL);
        transport.respond(Method::GET, &url, RawResponse::new(400, "bad request"));

        let err = client.resolve_link(&url).await.unwrap_err();

        assert!(matches!(err, ClientError::Http { status: 400, .. }));
        assert_eq!(transport.count(&Method::GET, &url), 1);
    }

    #[tokio::test]
    async fn test_expired_cookie_triggers_login() {
        let (client, transport, clock) = fake_client(None);

        client.org().await.unwrap();
        assert_eq!(transport.count(&Method::POST, LOGIN_URL), 1);

        clock.advance(Duration::from_secs(Control::COOKIE_TIMEOUT));
        client.org().await.unwrap();

        assert_eq!(transport.count(&Method::POST, LOGIN_URL), 2);
        // the cache does not outlive the session
        assert_eq!(transport.count(&Method::GET, ORG_URL), 2);
    }

    #[tokio::test]
    async fn test_unauthorized_triggers_login_and_repeat() {
        let (client, transport, _) = fake_client(None);
        client.session().await.unwrap();

        let url = format!("{}/api/vApp/vm-1", BASE_URL);
        transport.respond(Method::GET, &url, RawResponse::new(401, ""));
        transport.respond_json(Method::GET, &url, 200, json!({"href": url, "name": "vm-1"}));

        let vm = client.resolve_link(&url).await.unwrap();

        assert_eq!(vm.name.as_deref(), Some("vm-1"));
        assert_eq!(transport.count(&Method::POST, LOGIN_URL), 2);
        assert_eq!(transport.count(&Method::GET, &url), 2);
    }

    #[tokio::test]
    async fn test_org_reads_cache() {
        let (client, transport, _) = fake_client(None);

        let first = client.org().await.unwrap();
        let second = client.org().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(transport.count(&Method::GET, ORG_URL), 1);
        assert!(client.cache().contains(CacheKey::Org));
    }

    #[tokio::test]
    async fn test_org_resolved_again_after_clear() {
        let (client, transport, _) = fake_client(None);

        client.org().await.unwrap();
        client.clear_cache();
        client.org().await.unwrap();

        assert_eq!(transport.count(&Method::GET, ORG_URL), 2);
        assert_eq!(transport.count(&Method::POST, LOGIN_URL), 1);
    }

    #[tokio::test]
    async fn test_vdc_reads_cache_and_refetches_after_clear() {
        let (client, transport, _) = fake_client(None);

        let vdc = client.vdc().await.unwrap();
        client.vdc().await.unwrap();
        assert_eq!(vdc.href, VDC_URL);
        assert_eq!(transport.count(&Method::GET, VDC_URL), 1);

        client.clear_cache();
        client.vdc().await.unwrap();
        assert_eq!(transport.count(&Method::GET, VDC_URL), 2);
        assert_eq!(transport.count(&Method::GET, ORG_URL), 2);
    }

    #[tokio::test]
    async fn test_vdc_not_found_names_datacenter() {
        let transport = Arc::new(FakeTransport::new());
        transport.script_login();
        transport.script_org();
        let mut settings = settings();
        settings.entities.virtual_datacenter = "missing-vdc".to_string();
        let client = VCloudClient::with_transport(
            &settings,
            transport.clone(),
            Arc::new(crate::clock::ManualClock::new()),
        )
        .unwrap();

        let err = client.vdc().await.unwrap_err();

        assert!(matches!(err, ClientError::NotFound { .. }));
        assert!(err.to_string().contains("missing-vdc"));
        // not retried
        assert_eq!(transport.count(&Method::GET, ORG_URL), 1);
    }

    #[tokio::test]
    async fn test_catalog_item_returns_first_matching_type() {
        let (client, transport, _) = fake_client(None);
        let item1 = format!("{}/api/catalogItem/1", BASE_URL);
        let item2 = format!("{}/api/catalogItem/2", BASE_URL);
        transport.reset(Method::GET, MEDIA_CATALOG_URL);
        transport.respond_json(
            Method::GET,
            MEDIA_CATALOG_URL,
            200,
            json!({
                "href": MEDIA_CATALOG_URL,
                "catalogItems": [
                    {"href": item1, "name": "demo"},
                    {"href": item2, "name": "demo"}
                ]
            }),
        );
        transport.respond_json(
            Method::GET,
            &item1,
            200,
            json!({"href": item1, "name": "demo", "entity": {"href": "https://vcd.example.com/api/vAppTemplate/1", "type": media_type::VAPP_TEMPLATE}}),
        );
        transport.respond_json(
            Method::GET,
            &item2,
            200,
            json!({"href": item2, "name": "demo", "entity": {"href": "https://vcd.example.com/api/media/1", "type": media_type::MEDIA}}),
        );

        let item = client
            .catalog_item(CatalogType::Media, "demo", media_type::MEDIA)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(item.href, item2);
    }

    #[tokio::test]
    async fn test_catalog_item_absent() {
        let (client, _, _) = fake_client(None);
        let item = client
            .catalog_item(CatalogType::Vapp, "nothing", media_type::VAPP_TEMPLATE)
            .await
            .unwrap();
        assert!(item.is_none());
    }

    #[tokio::test]
    async fn test_catalog_not_found() {
        let mut settings = settings();
        settings.entities.media_catalog = "gone".to_string();
        let transport = Arc::new(FakeTransport::new());
        transport.script_login();
        transport.script_org();
        let client = VCloudClient::with_transport(
            &settings,
            transport,
            Arc::new(crate::clock::ManualClock::new()),
        )
        .unwrap();

        let err = client.catalog(CatalogType::Media).await.unwrap_err();
        assert!(err.to_string().contains("gone"));
    }

    #[tokio::test]
    async fn test_reload_follows_href_without_touching_cache() {
        let (client, transport, _) = fake_client(None);
        let url = format!("{}/api/disk/1", BASE_URL);
        transport.respond_json(Method::GET, &url, 200, json!({"href": url, "name": "disk-fresh"}));

        let stale = Entity {
            href: url.clone(),
            name: Some("disk-stale".to_string()),
            ..Entity::default()
        };
        let fresh = client.reload(&stale).await.unwrap();

        assert_eq!(fresh.name.as_deref(), Some("disk-fresh"));
        assert!(client.cache().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_entity_follows_alternate_link() {
        let (client, transport, _) = fake_client(None);
        let resolved = format!("{}urn:vcloud:disk:1", RESOLVER_URL);
        let disk = format!("{}/api/disk/1", BASE_URL);
        transport.respond_json(
            Method::GET,
            &resolved,
            200,
            json!({"href": resolved, "link": [{"rel": "alternate", "type": media_type::DISK, "href": disk}]}),
        );
        transport.respond_json(Method::GET, &disk, 200, json!({"href": disk, "id": "urn:vcloud:disk:1"}));

        let entity = client.resolve_entity("urn:vcloud:disk:1").await.unwrap();
        assert_eq!(entity.cid(), "urn:vcloud:disk:1");
    }

    #[tokio::test]
    async fn test_resolve_entity_missing() {
        let (client, _, _) = fake_client(None);
        let err = client.resolve_entity("urn:vcloud:disk:404").await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound { kind: "Entity", .. }));
    }

    #[tokio::test]
    async fn test_invoke_sends_payload_with_content_type() {
        let (client, transport, _) = fake_client(None);
        let url = format!("{}/api/vdc/1/disk", BASE_URL);
        transport.respond_json(Method::POST, &url, 201, json!({"href": "https://vcd.example.com/api/disk/9"}));

        let reply = client
            .invoke(
                Method::POST,
                &url,
                InvokeOptions::new().payload(json!({"name": "d"}), media_type::DISK_CREATE_PARAMS),
            )
            .await
            .unwrap();

        assert_eq!(reply.status(), 201);
        let sent = &transport.requests_to(&Method::POST, &url)[0];
        assert_eq!(sent.header("Content-Type"), Some(media_type::DISK_CREATE_PARAMS));
        assert_eq!(sent.payload, Some(json!({"name": "d"})));
    }

    #[tokio::test]
    async fn test_empty_reply_has_no_entity() {
        let (client, _, _) = fake_client(None);
        let reply = client
            .invoke(Method::GET, "/info", InvokeOptions::new())
            .await
            .unwrap();
        assert!(reply.is_empty());
        assert!(matches!(reply.entity(), Err(ClientError::UnexpectedResponse(_))));
    }
}
