//! Resource records sent to the mailcow API.
//!
//! # Design
//! mailcow accepts far more attributes than are modelled here. Each record
//! types the attributes this crate knows about as `Option`s (unset fields
//! are left out of the JSON) and forwards anything else through the
//! flattened `extra` map unchanged. Booleans travel as the API's `0`/`1`.
//!
//! Only domains and mailboxes get client-side defaults, via
//! `with_defaults`; the server applies its own to everything else.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_DOMAIN_ALIASES: u32 = 400;
pub const DEFAULT_DOMAIN_MAILBOXES: u32 = 10;
/// Default mailbox quota inside a new domain, in MiB.
pub const DEFAULT_DOMAIN_DEFQUOTA: u64 = 3072;
/// Largest quota a single mailbox of the domain may get, in MiB.
pub const DEFAULT_DOMAIN_MAXQUOTA: u64 = 10240;
/// Total quota of the domain, in MiB.
pub const DEFAULT_DOMAIN_QUOTA: u64 = 10240;
/// Quota of a new mailbox, in MiB.
pub const DEFAULT_MAILBOX_QUOTA: u64 = 3072;

/// A mail domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainSpec {
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "number::deserialize", skip_serializing_if = "Option::is_none")]
    pub aliases: Option<u32>,
    #[serde(default, deserialize_with = "number::deserialize", skip_serializing_if = "Option::is_none")]
    pub mailboxes: Option<u32>,
    #[serde(default, deserialize_with = "number::deserialize", skip_serializing_if = "Option::is_none")]
    pub defquota: Option<u64>,
    #[serde(default, deserialize_with = "number::deserialize", skip_serializing_if = "Option::is_none")]
    pub maxquota: Option<u64>,
    #[serde(default, deserialize_with = "number::deserialize", skip_serializing_if = "Option::is_none")]
    pub quota: Option<u64>,
    #[serde(default, with = "flag", skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, with = "flag", skip_serializing_if = "Option::is_none")]
    pub backupmx: Option<bool>,
    #[serde(default, with = "flag", skip_serializing_if = "Option::is_none")]
    pub relay_all_recipients: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DomainSpec {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..Self::default()
        }
    }

    /// Fill every unset limit and flag with mailcow's recommended value.
    /// Attributes already present in `extra` are left to the caller.
    pub fn with_defaults(mut self) -> Self {
        let extra = &self.extra;
        default_unless(&mut self.aliases, extra, "aliases", DEFAULT_DOMAIN_ALIASES);
        default_unless(&mut self.mailboxes, extra, "mailboxes", DEFAULT_DOMAIN_MAILBOXES);
        default_unless(&mut self.defquota, extra, "defquota", DEFAULT_DOMAIN_DEFQUOTA);
        default_unless(&mut self.maxquota, extra, "maxquota", DEFAULT_DOMAIN_MAXQUOTA);
        default_unless(&mut self.quota, extra, "quota", DEFAULT_DOMAIN_QUOTA);
        default_unless(&mut self.active, extra, "active", true);
        default_unless(&mut self.backupmx, extra, "backupmx", false);
        default_unless(&mut self.relay_all_recipients, extra, "relay_all_recipients", false);
        self
    }
}

/// A mailbox, addressed as `local_part@domain`.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MailboxSpec {
    pub local_part: String,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub password: String,
    /// Confirmation copy of `password`; defaults to it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password2: Option<String>,
    #[serde(default, deserialize_with = "number::deserialize", skip_serializing_if = "Option::is_none")]
    pub quota: Option<u64>,
    #[serde(default, with = "flag", skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, with = "flag", skip_serializing_if = "Option::is_none")]
    pub force_pw_update: Option<bool>,
    #[serde(default, with = "flag", skip_serializing_if = "Option::is_none")]
    pub tls_enforce_in: Option<bool>,
    #[serde(default, with = "flag", skip_serializing_if = "Option::is_none")]
    pub tls_enforce_out: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MailboxSpec {
    pub fn new(
        local_part: impl Into<String>,
        domain: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            local_part: local_part.into(),
            domain: domain.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    pub fn address(&self) -> String {
        format!("{}@{}", self.local_part, self.domain)
    }

    pub fn with_defaults(mut self) -> Self {
        let extra = &self.extra;
        default_unless(&mut self.password2, extra, "password2", self.password.clone());
        default_unless(&mut self.quota, extra, "quota", DEFAULT_MAILBOX_QUOTA);
        default_unless(&mut self.active, extra, "active", true);
        default_unless(&mut self.force_pw_update, extra, "force_pw_update", true);
        default_unless(&mut self.tls_enforce_in, extra, "tls_enforce_in", true);
        default_unless(&mut self.tls_enforce_out, extra, "tls_enforce_out", true);
        self
    }
}

impl fmt::Debug for MailboxSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailboxSpec")
            .field("local_part", &self.local_part)
            .field("domain", &self.domain)
            .field("name", &self.name)
            .field("password", &"<redacted>")
            .field("quota", &self.quota)
            .field("active", &self.active)
            .field("force_pw_update", &self.force_pw_update)
            .field("tls_enforce_in", &self.tls_enforce_in)
            .field("tls_enforce_out", &self.tls_enforce_out)
            .field("extra", &self.extra)
            .finish()
    }
}

/// An alias forwarding `address` to one or more comma-separated targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AliasSpec {
    pub address: String,
    pub goto: String,
    #[serde(default, with = "flag", skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AliasSpec {
    pub fn new<I, S>(address: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let goto = targets
            .into_iter()
            .map(|t| t.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(",");
        Self {
            address: address.into(),
            goto,
            ..Self::default()
        }
    }
}

/// An imapsync job pulling mail from a remote IMAP account into `username`.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncJobSpec {
    /// Local mailbox receiving the mail.
    pub username: String,
    pub host1: String,
    #[serde(default, deserialize_with = "number::deserialize", skip_serializing_if = "Option::is_none")]
    pub port1: Option<u16>,
    pub user1: String,
    pub password1: String,
    /// `SSL`, `TLS` or `PLAIN`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enc1: Option<String>,
    #[serde(default, deserialize_with = "number::deserialize", skip_serializing_if = "Option::is_none")]
    pub mins_interval: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subfolder2: Option<String>,
    #[serde(default, deserialize_with = "number::deserialize", skip_serializing_if = "Option::is_none")]
    pub maxage: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,
    #[serde(default, with = "flag", skip_serializing_if = "Option::is_none")]
    pub delete2duplicates: Option<bool>,
    #[serde(default, with = "flag", skip_serializing_if = "Option::is_none")]
    pub delete1: Option<bool>,
    #[serde(default, with = "flag", skip_serializing_if = "Option::is_none")]
    pub automap: Option<bool>,
    #[serde(default, with = "flag", skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SyncJobSpec {
    pub fn new(
        username: impl Into<String>,
        host1: impl Into<String>,
        user1: impl Into<String>,
        password1: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            host1: host1.into(),
            user1: user1.into(),
            password1: password1.into(),
            ..Self::default()
        }
    }
}

impl fmt::Debug for SyncJobSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncJobSpec")
            .field("username", &self.username)
            .field("host1", &self.host1)
            .field("port1", &self.port1)
            .field("user1", &self.user1)
            .field("password1", &"<redacted>")
            .field("enc1", &self.enc1)
            .field("mins_interval", &self.mins_interval)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

/// A relay host whose mail is accepted without spam filtering, unless
/// `filter_spam` is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForwardingHostSpec {
    pub hostname: String,
    #[serde(default, with = "flag", skip_serializing_if = "Option::is_none")]
    pub filter_spam: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ForwardingHostSpec {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ..Self::default()
        }
    }
}

/// Set `field` to `value` unless the caller already supplied `key`, either
/// typed or through the `extra` map. Serializing both would send `key` twice.
fn default_unless<T>(field: &mut Option<T>, extra: &Map<String, Value>, key: &str, value: T) {
    if field.is_none() && !extra.contains_key(key) {
        *field = Some(value);
    }
}

/// Log categories served by `/api/v1/get/logs/{kind}/{count}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogKind {
    Acme,
    Api,
    Autodiscover,
    Dovecot,
    Netfilter,
    Postfix,
    Ratelimited,
    RspamdHistory,
    Sogo,
    Watchdog,
}

impl LogKind {
    pub const ALL: [LogKind; 10] = [
        LogKind::Acme,
        LogKind::Api,
        LogKind::Autodiscover,
        LogKind::Dovecot,
        LogKind::Netfilter,
        LogKind::Postfix,
        LogKind::Ratelimited,
        LogKind::RspamdHistory,
        LogKind::Sogo,
        LogKind::Watchdog,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LogKind::Acme => "acme",
            LogKind::Api => "api",
            LogKind::Autodiscover => "autodiscover",
            LogKind::Dovecot => "dovecot",
            LogKind::Netfilter => "netfilter",
            LogKind::Postfix => "postfix",
            LogKind::Ratelimited => "ratelimited",
            LogKind::RspamdHistory => "rspamd-history",
            LogKind::Sogo => "sogo",
            LogKind::Watchdog => "watchdog",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown log kind {s:?}"))
    }
}

/// Body of every bulk call: `{"items": [...]}`.
#[derive(Debug, Serialize)]
pub(crate) struct Items<'a, I> {
    pub items: &'a [I],
}

/// Body of every edit call: `{"items": [...], "attr": {...}}`.
#[derive(Debug, Serialize)]
pub(crate) struct Edit<'a, I, A> {
    pub items: &'a [I],
    pub attr: &'a A,
}

/// `Option<bool>` as mailcow's `0`/`1`. Reading also accepts JSON booleans
/// and numeric strings, which the API returns interchangeably.
mod flag {
    use serde::de::{self, Deserializer};
    use serde::{Deserialize, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(value: &Option<bool>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(flag) => serializer.serialize_u8(u8::from(*flag)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(flag)) => Ok(Some(flag)),
            Some(Value::Number(n)) => match n.as_f64() {
                Some(v) if v == 0.0 => Ok(Some(false)),
                Some(v) if v == 1.0 => Ok(Some(true)),
                _ => Err(de::Error::custom(format!("invalid flag {n}"))),
            },
            Some(Value::String(s)) => match s.trim() {
                "0" | "" => Ok(Some(false)),
                "1" => Ok(Some(true)),
                other => Err(de::Error::custom(format!("invalid flag {other:?}"))),
            },
            Some(other) => Err(de::Error::custom(format!("invalid flag {other}"))),
        }
    }
}

/// Optional integers that may arrive as JSON numbers or numeric strings.
/// Serialization is left to serde, so requests always carry numbers.
mod number {
    use std::fmt::Display;
    use std::str::FromStr;

    use serde::de::{self, Deserializer};
    use serde::Deserialize;
    use serde_json::Value;

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: FromStr + TryFrom<u64>,
        <T as FromStr>::Err: Display,
        <T as TryFrom<u64>>::Error: Display,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => {
                let n = n
                    .as_u64()
                    .ok_or_else(|| de::Error::custom(format!("invalid number {n}, expected a non-negative integer")))?;
                T::try_from(n).map(Some).map_err(de::Error::custom)
            }
            Some(Value::String(s)) => s.trim().parse().map(Some).map_err(de::Error::custom),
            Some(other) => Err(de::Error::custom(format!("invalid number {other}"))),
        }
    }
}
