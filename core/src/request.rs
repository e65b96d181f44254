//! Request builders for every mailcow endpoint the client uses.
//!
//! # Design
//! `Endpoints` holds the base URL and the fixed header set and carries no
//! mutable state. Each method produces a complete `HttpRequest` without
//! touching the network, so requests can be inspected, logged or executed
//! by any transport. Domain and mailbox creation apply the client-side
//! defaults here, so the request is the single source of truth for what
//! is sent.

use serde::Serialize;
use url::Url;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest};
use crate::types::{AliasSpec, DomainSpec, Edit, ForwardingHostSpec, Items, LogKind, MailboxSpec, SyncJobSpec};

const API_PREFIX: [&str; 2] = ["api", "v1"];
const API_KEY_HEADER: &str = "X-Api-Key";
const ALL: &str = "all";

#[derive(Debug, Clone)]
pub struct Endpoints {
    base_url: Url,
    headers: Vec<(String, String)>,
}

impl Endpoints {
    pub fn new(config: &ClientConfig) -> Self {
        let mut base_url = config.base_url().clone();
        base_url.set_query(None);
        base_url.set_fragment(None);
        Self {
            base_url,
            headers: vec![(API_KEY_HEADER.to_string(), config.keys().write.clone())],
        }
    }

    // -- mailboxes ----------------------------------------------------------

    /// One mailbox by address, or every mailbox when `user` is `None`.
    pub fn get_mailbox(&self, user: Option<&str>) -> HttpRequest {
        self.get(&["get", "mailbox", user.unwrap_or(ALL)])
    }

    pub fn add_mailbox(&self, spec: &MailboxSpec) -> Result<HttpRequest, ApiError> {
        self.post(&["add", "mailbox"], &spec.clone().with_defaults())
    }

    pub fn edit_mailbox<I: Serialize, A: Serialize>(
        &self,
        items: &[I],
        attr: &A,
    ) -> Result<HttpRequest, ApiError> {
        self.post(&["edit", "mailbox"], &Edit { items, attr })
    }

    pub fn delete_mailboxes<I: Serialize>(&self, items: &[I]) -> Result<HttpRequest, ApiError> {
        self.post(&["delete", "mailbox"], &Items { items })
    }

    // -- domains ------------------------------------------------------------

    pub fn get_domain(&self, domain: Option<&str>) -> HttpRequest {
        self.get(&["get", "domain", domain.unwrap_or(ALL)])
    }

    pub fn add_domain(&self, spec: &DomainSpec) -> Result<HttpRequest, ApiError> {
        self.post(&["add", "domain"], &spec.clone().with_defaults())
    }

    pub fn edit_domain<I: Serialize, A: Serialize>(
        &self,
        items: &[I],
        attr: &A,
    ) -> Result<HttpRequest, ApiError> {
        self.post(&["edit", "domain"], &Edit { items, attr })
    }

    pub fn delete_domains<I: Serialize>(&self, items: &[I]) -> Result<HttpRequest, ApiError> {
        self.post(&["delete", "domain"], &Items { items })
    }

    // -- aliases ------------------------------------------------------------

    pub fn get_alias(&self, id: Option<&str>) -> HttpRequest {
        self.get(&["get", "alias", id.unwrap_or(ALL)])
    }

    pub fn add_alias(&self, spec: &AliasSpec) -> Result<HttpRequest, ApiError> {
        self.post(&["add", "alias"], spec)
    }

    pub fn delete_aliases<I: Serialize>(&self, items: &[I]) -> Result<HttpRequest, ApiError> {
        self.post(&["delete", "alias"], &Items { items })
    }

    // -- sync jobs ----------------------------------------------------------

    pub fn add_sync_job(&self, spec: &SyncJobSpec) -> Result<HttpRequest, ApiError> {
        self.post(&["add", "syncjob"], spec)
    }

    pub fn edit_sync_job<I: Serialize, A: Serialize>(
        &self,
        items: &[I],
        attr: &A,
    ) -> Result<HttpRequest, ApiError> {
        self.post(&["edit", "syncjob"], &Edit { items, attr })
    }

    pub fn delete_sync_jobs<I: Serialize>(&self, items: &[I]) -> Result<HttpRequest, ApiError> {
        self.post(&["delete", "syncjob"], &Items { items })
    }

    /// All sync jobs without their (large) run logs.
    pub fn list_sync_jobs(&self) -> HttpRequest {
        self.get(&["get", "syncjobs", ALL, "no_log"])
    }

    // -- forwarding hosts ---------------------------------------------------

    pub fn add_forwarding_host(&self, spec: &ForwardingHostSpec) -> Result<HttpRequest, ApiError> {
        self.post(&["add", "fwdhost"], spec)
    }

    pub fn delete_forwarding_hosts<I: Serialize>(&self, items: &[I]) -> Result<HttpRequest, ApiError> {
        self.post(&["delete", "fwdhost"], &Items { items })
    }

    pub fn list_forwarding_hosts(&self) -> HttpRequest {
        self.get(&["fwdhost", ALL])
    }

    // -- logs ---------------------------------------------------------------

    /// The newest `count` entries of one log.
    pub fn get_logs(&self, kind: LogKind, count: u32) -> HttpRequest {
        self.get(&["get", "logs", kind.as_str(), &count.to_string()])
    }

    fn get(&self, segments: &[&str]) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: self.url(segments),
            headers: self.headers.clone(),
            body: None,
        }
    }

    fn post<B: Serialize + ?Sized>(&self, segments: &[&str], body: &B) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(body).map_err(ApiError::Encode)?;
        let mut headers = self.headers.clone();
        headers.push(("Content-Type".to_string(), "application/json".to_string()));
        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: self.url(segments),
            headers,
            body: Some(body),
        })
    }

    fn url(&self, segments: &[&str]) -> String {
        let mut url = self.base_url.clone();
        // http(s) URLs always have path segments; ClientConfig admits no other scheme.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(API_PREFIX).extend(segments);
        }
        url.into()
    }
}
