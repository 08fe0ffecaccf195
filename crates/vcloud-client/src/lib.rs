//! vCloud Director API client
//!
//! Everything the CPI says to vCloud goes through [`VCloudClient`]:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 VCloudClient                  │
//! │  session (token + cookie)   EntityCache       │
//! │  retry policy               task poller       │
//! └───────┬───────────────────────────┬──────────┘
//!         │ Transport                 │ Clock
//! ┌───────▼────────┐         ┌────────▼─────────┐
//! │ HttpTransport  │         │   SystemClock    │
//! │ (reqwest+proxy)│         │   ManualClock    │
//! └────────────────┘         └──────────────────┘
//! ```

pub mod cache;
pub mod client;
pub mod clock;
pub mod control;
pub mod entity;
pub mod error;
pub mod poller;
pub mod session;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-exports
pub use cache::{CacheKey, EntityCache};
pub use client::{CatalogType, InvokeOptions, Reply, Target, VCloudClient};
pub use clock::{Clock, ManualClock, SystemClock};
pub use control::Control;
pub use entity::{Entity, Link, Task, TaskStatus, media_type, rel};
pub use error::{ClientError, Result};
pub use reqwest::Method;
pub use session::Session;
pub use transport::{
    HttpTransport, ProxyConfigurable, RawResponse, Request, Transport, TransportHelper,
};
