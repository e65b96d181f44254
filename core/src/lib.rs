//! Blocking client for the mailcow mail-server administration API.
//!
//! # Overview
//! Maps method calls onto `/api/v1` requests for mailboxes, domains,
//! aliases, sync jobs, forwarding hosts and logs, and returns each decoded
//! JSON body unchanged. Domain and mailbox creation are gated by a hostname
//! check and a pluggable registration lookup (WHOIS by default).
//!
//! # Design
//! - `ClientConfig` is validated once at construction and never changes.
//! - `Endpoints` builds `HttpRequest` values without I/O; `Transport`
//!   performs one round-trip; `RetryPolicy` retries 5xx and network
//!   failures a bounded number of times.
//! - Library code logs through `tracing` and never prints; the embedding
//!   application installs the subscriber.
//!
//! ```no_run
//! use mailcow_core::{ApiKeys, DomainSpec, MailcowClient};
//!
//! # fn main() -> Result<(), mailcow_core::ApiError> {
//! let client = MailcowClient::connect("https://mail.example.org", ApiKeys::new("ro-key", "rw-key"))?;
//! let outcome = client.add_domain(&DomainSpec::new("example.org"))?;
//! println!("{outcome}");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod registration;
pub mod request;
pub mod retry;
pub mod types;
pub mod validate;

pub use client::MailcowClient;
pub use config::{ApiKeys, ClientConfig, ClientSettings};
pub use error::{ApiError, ConfigError, TransportError, WhoisError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
pub use registration::{AcceptAll, RegistrationChecker, WhoisChecker};
pub use request::Endpoints;
pub use retry::RetryPolicy;
pub use types::{AliasSpec, DomainSpec, ForwardingHostSpec, LogKind, MailboxSpec, SyncJobSpec};
