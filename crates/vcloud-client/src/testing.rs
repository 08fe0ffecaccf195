//! Scripted transport and fixtures for exercising the client without a server
//!
//! Enabled for this crate's tests and through the `testing` feature.

use crate::client::VCloudClient;
use crate::clock::ManualClock;
use crate::entity::media_type;
use crate::error::{ClientError, Result};
use crate::session::AUTH_HEADER;
use crate::transport::{RawResponse, Request, Transport};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use vcloud_config::{ControlSettings, Entities, Settings};

pub const BASE_URL: &str = "https://vcd.example.com";
pub const ORG_NAME: &str = "acme";
pub const VDC_NAME: &str = "acme-vdc";
pub const VAPP_CATALOG_NAME: &str = "acme-vapps";
pub const MEDIA_CATALOG_NAME: &str = "acme-media";

pub const VERSIONS_URL: &str = "https://vcd.example.com/api/versions";
pub const LOGIN_URL: &str = "https://vcd.example.com/api/sessions";
pub const INFO_URL: &str = "https://vcd.example.com/info";
pub const ORG_URL: &str = "https://vcd.example.com/api/org/1";
pub const VDC_URL: &str = "https://vcd.example.com/api/vdc/1";
pub const VAPP_CATALOG_URL: &str = "https://vcd.example.com/api/catalog/vapps";
pub const MEDIA_CATALOG_URL: &str = "https://vcd.example.com/api/catalog/media";
pub const RESOLVER_URL: &str = "https://vcd.example.com/api/entity/";

pub const TOKEN: &str = "token-1";
pub const COOKIES: &str = "vcloud-token=token-1";

#[derive(Debug, Clone)]
enum Scripted {
    Response(RawResponse),
    Failure(String),
}

/// Transport answering from per-route queues
///
/// Each `(method, url)` route replays its responses in order and keeps
/// repeating the last one. Unrouted requests get a 404.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<Scripted>>>,
    requests: Mutex<Vec<Request>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, method: Method, url: &str, response: RawResponse) {
        self.push(method, url, Scripted::Response(response));
    }

    pub fn respond_json(&self, method: Method, url: &str, status: u16, body: serde_json::Value) {
        self.respond(method, url, RawResponse::new(status, body.to_string()));
    }

    /// Transport-level failure, as if the connection broke
    pub fn fail(&self, method: Method, url: &str, message: &str) {
        self.push(method, url, Scripted::Failure(message.to_string()));
    }

    /// Forget everything scripted for a route
    pub fn reset(&self, method: Method, url: &str) {
        self.routes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&(method, url.to_string()));
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn requests_to(&self, method: &Method, url: &str) -> Vec<Request> {
        self.requests()
            .into_iter()
            .filter(|r| &r.method == method && r.url == url)
            .collect()
    }

    pub fn count(&self, method: &Method, url: &str) -> usize {
        self.requests_to(method, url).len()
    }

    /// Versions, login and info probe
    pub fn script_login(&self) {
        self.respond_json(
            Method::GET,
            VERSIONS_URL,
            200,
            json!({"versionInfo": [{"version": "5.1", "loginUrl": LOGIN_URL}]}),
        );
        self.respond(
            Method::POST,
            LOGIN_URL,
            RawResponse::new(
                200,
                json!({
                    "href": format!("{}/api/session", BASE_URL),
                    "type": media_type::SESSION,
                    "link": [
                        {"rel": "down", "type": media_type::ORG, "name": ORG_NAME, "href": ORG_URL},
                        {"rel": "entityResolver", "type": media_type::ENTITY, "href": RESOLVER_URL}
                    ]
                })
                .to_string(),
            )
            .with_header(AUTH_HEADER, TOKEN)
            .with_cookies(COOKIES),
        );
        self.respond(Method::GET, INFO_URL, RawResponse::new(204, ""));
    }

    /// Org, vdc and both catalogs
    pub fn script_org(&self) {
        self.respond_json(
            Method::GET,
            ORG_URL,
            200,
            json!({
                "href": ORG_URL,
                "type": media_type::ORG,
                "name": ORG_NAME,
                "link": [
                    {"rel": "down", "type": media_type::VDC, "name": VDC_NAME, "href": VDC_URL},
                    {"rel": "down", "type": media_type::CATALOG, "name": VAPP_CATALOG_NAME, "href": VAPP_CATALOG_URL},
                    {"rel": "down", "type": media_type::CATALOG, "name": MEDIA_CATALOG_NAME, "href": MEDIA_CATALOG_URL}
                ]
            }),
        );
        self.respond_json(
            Method::GET,
            VDC_URL,
            200,
            json!({
                "href": VDC_URL,
                "type": media_type::VDC,
                "name": VDC_NAME,
                "link": [
                    {"rel": "add", "type": media_type::DISK_CREATE_PARAMS, "href": format!("{}/disk", VDC_URL)}
                ]
            }),
        );
        for url in [VAPP_CATALOG_URL, MEDIA_CATALOG_URL] {
            self.respond_json(
                Method::GET,
                url,
                200,
                json!({
                    "href": url,
                    "type": media_type::CATALOG,
                    "link": [
                        {"rel": "add", "type": media_type::CATALOG_ITEM, "href": format!("{}/catalogItems", url)}
                    ]
                }),
            );
        }
    }

    fn push(&self, method: Method, url: &str, scripted: Scripted) {
        self.routes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry((method, url.to_string()))
            .or_default()
            .push_back(scripted);
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn execute(&self, request: Request) -> Result<RawResponse> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        let next = routes
            .get_mut(&(request.method.clone(), request.url.clone()))
            .and_then(|queue| {
                if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                }
            });

        match next {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::Failure(message)) => Err(ClientError::Transport(message)),
            None => Ok(RawResponse::new(404, "")),
        }
    }
}

/// Settings pointing at [`BASE_URL`]
pub fn settings() -> Settings {
    settings_with_control(None)
}

pub fn settings_with_control(control: Option<ControlSettings>) -> Settings {
    Settings {
        url: BASE_URL.to_string(),
        user: format!("admin@{}", ORG_NAME),
        password: "secret".to_string(),
        entities: Entities {
            organization: ORG_NAME.to_string(),
            virtual_datacenter: VDC_NAME.to_string(),
            vapp_catalog: VAPP_CATALOG_NAME.to_string(),
            media_catalog: MEDIA_CATALOG_NAME.to_string(),
            media_storage_profile: None,
            control,
        },
    }
}

/// Client over a [`FakeTransport`] already scripted with login and org
pub fn fake_client(
    control: Option<ControlSettings>,
) -> (VCloudClient, Arc<FakeTransport>, Arc<ManualClock>) {
    let transport = Arc::new(FakeTransport::new());
    transport.script_login();
    transport.script_org();
    let clock = Arc::new(ManualClock::new());
    let client = match VCloudClient::with_transport(
        &settings_with_control(control),
        transport.clone(),
        clock.clone(),
    ) {
        Ok(client) => client,
        Err(e) => panic!("fixture settings rejected: {}", e),
    };
    (client, transport, clock)
}
