//! Blocking client for the mailcow administration API.
//!
//! # Design
//! `MailcowClient` holds immutable configuration plus a shared transport
//! and registration checker, so it is `Send + Sync` and can be cloned
//! cheaply. Every operation builds its request through `Endpoints`, sends
//! it through the retry policy and hands back the decoded JSON body as-is:
//! mailcow reports per-item outcomes inside the body, including on 4xx.
//!
//! Domain and mailbox creation first validate the domain name and then ask
//! the registration checker; either failure stops the call before the
//! create request is sent.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::config::{ApiKeys, ClientConfig};
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse, Transport, UreqTransport};
use crate::registration::{RegistrationChecker, WhoisChecker};
use crate::request::Endpoints;
use crate::retry::RetryPolicy;
use crate::types::{AliasSpec, DomainSpec, ForwardingHostSpec, LogKind, MailboxSpec, SyncJobSpec};
use crate::validate::check_hostname;

#[derive(Clone)]
pub struct MailcowClient {
    config: ClientConfig,
    endpoints: Endpoints,
    retry: RetryPolicy,
    transport: Arc<dyn Transport>,
    registration: Arc<dyn RegistrationChecker>,
}

impl MailcowClient {
    /// Client with the default ureq transport and the default WHOIS check.
    pub fn new(config: ClientConfig) -> Self {
        let transport = UreqTransport::new(config.timeout());
        Self::with_parts(config, Arc::new(transport), Arc::new(WhoisChecker::default()))
    }

    /// Validate `base_url` and `keys`, then build a default client.
    ///
    /// # Errors
    ///
    /// `ApiError::Config` when the URL or either key is missing or malformed.
    pub fn connect(base_url: &str, keys: ApiKeys) -> Result<Self, ApiError> {
        Ok(Self::new(ClientConfig::new(base_url, keys)?))
    }

    pub fn with_parts(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        registration: Arc<dyn RegistrationChecker>,
    ) -> Self {
        Self {
            endpoints: Endpoints::new(&config),
            retry: RetryPolicy::new(config.max_attempts(), config.backoff()),
            config,
            transport,
            registration,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Request builders, for callers that want to inspect or send requests themselves.
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Send `request` under the retry policy and decode the body.
    ///
    /// # Errors
    ///
    /// `ApiError::Transport` once retries are exhausted, `ApiError::Decode`
    /// when the body is not JSON.
    pub fn execute(&self, request: &HttpRequest) -> Result<Value, ApiError> {
        let response = self.retry.send(self.transport.as_ref(), request)?;
        decode(response)
    }

    // -- mailboxes ----------------------------------------------------------

    pub fn get_mailbox(&self, user: Option<&str>) -> Result<Value, ApiError> {
        self.execute(&self.endpoints.get_mailbox(user))
    }

    pub fn list_mailboxes(&self) -> Result<Value, ApiError> {
        self.get_mailbox(None)
    }

    #[instrument(skip(self, spec), fields(mailbox = %spec.address()))]
    pub fn add_mailbox(&self, spec: &MailboxSpec) -> Result<Value, ApiError> {
        check_hostname(&spec.domain)?;
        self.ensure_registered(&spec.domain)?;
        let result = self.execute(&self.endpoints.add_mailbox(spec)?)?;
        info!("add mailbox request accepted");
        Ok(result)
    }

    pub fn edit_mailbox<I: Serialize, A: Serialize>(&self, items: &[I], attr: &A) -> Result<Value, ApiError> {
        self.execute(&self.endpoints.edit_mailbox(items, attr)?)
    }

    #[instrument(skip_all, fields(count = items.len()))]
    pub fn delete_mailboxes<I: Serialize>(&self, items: &[I]) -> Result<Value, ApiError> {
        let result = self.execute(&self.endpoints.delete_mailboxes(items)?)?;
        info!("delete mailbox request accepted");
        Ok(result)
    }

    // -- domains ------------------------------------------------------------

    pub fn get_domain(&self, domain: Option<&str>) -> Result<Value, ApiError> {
        self.execute(&self.endpoints.get_domain(domain))
    }

    pub fn list_domains(&self) -> Result<Value, ApiError> {
        self.get_domain(None)
    }

    #[instrument(skip(self, spec), fields(domain = %spec.domain))]
    pub fn add_domain(&self, spec: &DomainSpec) -> Result<Value, ApiError> {
        check_hostname(&spec.domain)?;
        self.ensure_registered(&spec.domain)?;
        let result = self.execute(&self.endpoints.add_domain(spec)?)?;
        info!("add domain request accepted");
        Ok(result)
    }

    pub fn edit_domain<I: Serialize, A: Serialize>(&self, items: &[I], attr: &A) -> Result<Value, ApiError> {
        self.execute(&self.endpoints.edit_domain(items, attr)?)
    }

    #[instrument(skip_all, fields(count = items.len()))]
    pub fn delete_domains<I: Serialize>(&self, items: &[I]) -> Result<Value, ApiError> {
        let result = self.execute(&self.endpoints.delete_domains(items)?)?;
        info!("delete domain request accepted");
        Ok(result)
    }

    // -- aliases ------------------------------------------------------------

    pub fn get_alias(&self, id: Option<&str>) -> Result<Value, ApiError> {
        self.execute(&self.endpoints.get_alias(id))
    }

    pub fn add_alias(&self, spec: &AliasSpec) -> Result<Value, ApiError> {
        self.execute(&self.endpoints.add_alias(spec)?)
    }

    pub fn delete_aliases<I: Serialize>(&self, items: &[I]) -> Result<Value, ApiError> {
        self.execute(&self.endpoints.delete_aliases(items)?)
    }

    // -- sync jobs ----------------------------------------------------------

    pub fn add_sync_job(&self, spec: &SyncJobSpec) -> Result<Value, ApiError> {
        self.execute(&self.endpoints.add_sync_job(spec)?)
    }

    pub fn edit_sync_job<I: Serialize, A: Serialize>(&self, items: &[I], attr: &A) -> Result<Value, ApiError> {
        self.execute(&self.endpoints.edit_sync_job(items, attr)?)
    }

    pub fn delete_sync_jobs<I: Serialize>(&self, items: &[I]) -> Result<Value, ApiError> {
        self.execute(&self.endpoints.delete_sync_jobs(items)?)
    }

    pub fn list_sync_jobs(&self) -> Result<Value, ApiError> {
        self.execute(&self.endpoints.list_sync_jobs())
    }

    // -- forwarding hosts ---------------------------------------------------

    pub fn add_forwarding_host(&self, spec: &ForwardingHostSpec) -> Result<Value, ApiError> {
        self.execute(&self.endpoints.add_forwarding_host(spec)?)
    }

    pub fn delete_forwarding_hosts<I: Serialize>(&self, items: &[I]) -> Result<Value, ApiError> {
        self.execute(&self.endpoints.delete_forwarding_hosts(items)?)
    }

    pub fn list_forwarding_hosts(&self) -> Result<Value, ApiError> {
        self.execute(&self.endpoints.list_forwarding_hosts())
    }

    // -- logs ---------------------------------------------------------------

    pub fn get_logs(&self, kind: LogKind, count: u32) -> Result<Value, ApiError> {
        self.execute(&self.endpoints.get_logs(kind, count))
    }

    fn ensure_registered(&self, domain: &str) -> Result<(), ApiError> {
        match self.registration.is_registered(domain) {
            Ok(true) => Ok(()),
            Ok(false) => Err(ApiError::DomainNotRegistered {
                domain: domain.to_string(),
            }),
            Err(err) => {
                warn!(domain, error = %err, "registration lookup failed, treating domain as unregistered");
                Err(ApiError::DomainNotRegistered {
                    domain: domain.to_string(),
                })
            }
        }
    }
}

impl std::fmt::Debug for MailcowClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailcowClient")
            .field("config", &self.config)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Decode a response body below 500. An empty body decodes to `null`.
fn decode(response: HttpResponse) -> Result<Value, ApiError> {
    if response.body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&response.body).map_err(|source| ApiError::Decode {
        status: response.status,
        source,
    })
}
