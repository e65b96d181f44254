//! In-memory stand-in for the mailcow `/api/v1` administration API.
//!
//! Responses follow mailcow's shapes: write calls answer with a list of
//! `{"type": "success"|"danger", "log": [...], "msg": [...]}` entries and
//! status 200 even when an item fails; reads return the stored records.
//! Every request must carry the configured `X-Api-Key`. Tests can make the
//! next N requests fail with 500 through `AppState::fail_next`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::{Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;

pub const DEFAULT_API_KEY: &str = "mock-api-key";

#[derive(Default)]
struct Store {
    domains: BTreeMap<String, Value>,
    mailboxes: BTreeMap<String, Value>,
    aliases: BTreeMap<u64, Value>,
    syncjobs: BTreeMap<u64, Value>,
    fwdhosts: BTreeMap<String, Value>,
    api_log: Vec<Value>,
    next_id: u64,
}

impl Store {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Shared server state. Clones refer to the same store and counters.
#[derive(Clone)]
pub struct AppState {
    store: Arc<RwLock<Store>>,
    api_key: Arc<str>,
    faults: Arc<AtomicU32>,
    hits: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(api_key: &str) -> Self {
        Self {
            store: Arc::default(),
            api_key: Arc::from(api_key),
            faults: Arc::default(),
            hits: Arc::default(),
        }
    }

    /// Answer the next `count` requests with HTTP 500.
    pub fn fail_next(&self, count: u32) {
        self.faults.store(count, Ordering::SeqCst);
    }

    /// Requests received so far, including rejected and faulted ones.
    pub fn requests_seen(&self) -> u64 {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(DEFAULT_API_KEY)
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/get/mailbox/{id}", get(get_mailbox))
        .route("/api/v1/add/mailbox", post(add_mailbox))
        .route("/api/v1/edit/mailbox", post(edit_mailbox))
        .route("/api/v1/delete/mailbox", post(delete_mailbox))
        .route("/api/v1/get/domain/{id}", get(get_domain))
        .route("/api/v1/add/domain", post(add_domain))
        .route("/api/v1/edit/domain", post(edit_domain))
        .route("/api/v1/delete/domain", post(delete_domain))
        .route("/api/v1/get/alias/{id}", get(get_alias))
        .route("/api/v1/add/alias", post(add_alias))
        .route("/api/v1/delete/alias", post(delete_alias))
        .route("/api/v1/get/syncjobs/{id}/{log}", get(get_syncjobs))
        .route("/api/v1/add/syncjob", post(add_syncjob))
        .route("/api/v1/edit/syncjob", post(edit_syncjob))
        .route("/api/v1/delete/syncjob", post(delete_syncjob))
        .route("/api/v1/fwdhost/all", get(list_fwdhosts))
        .route("/api/v1/get/fwdhost/all", get(list_fwdhosts))
        .route("/api/v1/add/fwdhost", post(add_fwdhost))
        .route("/api/v1/delete/fwdhost", post(delete_fwdhost))
        .route("/api/v1/get/logs/{kind}/{count}", get(get_logs))
        .layer(middleware::from_fn_with_state(state.clone(), guard))
        .with_state(state)
}

pub async fn run(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, app(state)).await
}

/// Fault injection, API key check and the `api` log, in that order.
async fn guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let hit = state.hits.fetch_add(1, Ordering::SeqCst) + 1;
    let method = request.method().clone();
    let uri = request.uri().path().to_string();

    if state
        .faults
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
    {
        debug!(%method, %uri, "injecting fault");
        return (StatusCode::INTERNAL_SERVER_ERROR, "injected fault").into_response();
    }

    let authorized = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|key| key == &*state.api_key);
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"type": "error", "msg": "authentication failed"})),
        )
            .into_response();
    }

    if method == Method::POST {
        state.store.write().await.api_log.push(json!({
            "time": hit,
            "method": "POST",
            "uri": uri,
        }));
    }
    next.run(request).await
}

fn entry(kind: &str, log: &[&str], msg: Value) -> Value {
    json!({"type": kind, "log": log, "msg": msg})
}

fn success(log: &[&str], msg: Value) -> Value {
    entry("success", log, msg)
}

fn danger(log: &[&str], msg: Value) -> Value {
    entry("danger", log, msg)
}

fn field<'a>(body: &'a Value, name: &str) -> Option<&'a str> {
    body.get(name).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn items(body: &Value) -> Vec<Value> {
    body.get("items")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn attr(body: &Value) -> Map<String, Value> {
    body.get("attr")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn item_key(item: &Value) -> Option<String> {
    match item {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn item_id(item: &Value) -> Option<u64> {
    match item {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn merge(record: &mut Value, attr: &Map<String, Value>) {
    if let Value::Object(fields) = record {
        for (key, value) in attr {
            fields.insert(key.clone(), value.clone());
        }
    }
}

fn one_or_all<K: Ord>(map: &BTreeMap<K, Value>, key: Option<K>) -> Value {
    match key {
        None => Value::Array(map.values().cloned().collect()),
        Some(key) => map.get(&key).cloned().unwrap_or_else(|| json!({})),
    }
}

// -- mailboxes ----------------------------------------------------------------

async fn get_mailbox(State(state): State<AppState>, Path(id): Path<String>) -> Json<Value> {
    let store = state.store.read().await;
    let key = (id != "all").then_some(id);
    Json(one_or_all(&store.mailboxes, key))
}

async fn add_mailbox(State(state): State<AppState>, Json(body): Json<Value>) -> Json<Value> {
    let log = ["mailbox", "add"];
    let (Some(local_part), Some(domain)) = (field(&body, "local_part"), field(&body, "domain")) else {
        return Json(json!([danger(&log, json!("mailbox_invalid"))]));
    };
    if field(&body, "password") != field(&body, "password2") {
        return Json(json!([danger(&log, json!("password_mismatch"))]));
    }

    let address = format!("{local_part}@{domain}");
    let mut store = state.store.write().await;
    if !store.domains.contains_key(domain) {
        return Json(json!([danger(&log, json!(["domain_not_found", domain]))]));
    }
    if store.mailboxes.contains_key(&address) {
        return Json(json!([danger(&log, json!(["object_exists", address]))]));
    }

    let mut record = body.clone();
    if let Value::Object(fields) = &mut record {
        fields.remove("password");
        fields.remove("password2");
        fields.insert("username".into(), json!(address));
    }
    store.mailboxes.insert(address.clone(), record);
    Json(json!([success(&log, json!(["mailbox_added", address]))]))
}

async fn edit_mailbox(State(state): State<AppState>, Json(body): Json<Value>) -> Json<Value> {
    let attr = attr(&body);
    let mut store = state.store.write().await;
    let results: Vec<Value> = items(&body)
        .iter()
        .map(|item| {
            let key = item_key(item).unwrap_or_default();
            match store.mailboxes.get_mut(&key) {
                Some(record) => {
                    merge(record, &attr);
                    success(&["mailbox", "edit"], json!(["mailbox_modified", key]))
                }
                None => danger(&["mailbox", "edit"], json!(["access_denied", key])),
            }
        })
        .collect();
    Json(Value::Array(results))
}

async fn delete_mailbox(State(state): State<AppState>, Json(body): Json<Value>) -> Json<Value> {
    let mut store = state.store.write().await;
    let results: Vec<Value> = items(&body)
        .iter()
        .map(|item| {
            let key = item_key(item).unwrap_or_default();
            match store.mailboxes.remove(&key) {
                Some(_) => success(&["mailbox", "delete"], json!(["mailbox_removed", key])),
                None => danger(&["mailbox", "delete"], json!(["access_denied", key])),
            }
        })
        .collect();
    Json(Value::Array(results))
}

// -- domains ------------------------------------------------------------------

async fn get_domain(State(state): State<AppState>, Path(id): Path<String>) -> Json<Value> {
    let store = state.store.read().await;
    let key = (id != "all").then_some(id);
    Json(one_or_all(&store.domains, key))
}

async fn add_domain(State(state): State<AppState>, Json(body): Json<Value>) -> Json<Value> {
    let log = ["domain", "add"];
    let Some(domain) = field(&body, "domain") else {
        return Json(json!([danger(&log, json!("domain_invalid"))]));
    };

    let mut store = state.store.write().await;
    if store.domains.contains_key(domain) {
        return Json(json!([danger(&log, json!(["domain_exists", domain]))]));
    }
    let mut record = body.clone();
    if let Value::Object(fields) = &mut record {
        fields.insert("domain_name".into(), json!(domain));
    }
    store.domains.insert(domain.to_string(), record);
    Json(json!([success(&log, json!(["domain_added", domain]))]))
}

async fn edit_domain(State(state): State<AppState>, Json(body): Json<Value>) -> Json<Value> {
    let attr = attr(&body);
    let mut store = state.store.write().await;
    let results: Vec<Value> = items(&body)
        .iter()
        .map(|item| {
            let key = item_key(item).unwrap_or_default();
            match store.domains.get_mut(&key) {
                Some(record) => {
                    merge(record, &attr);
                    success(&["domain", "edit"], json!(["domain_modified", key]))
                }
                None => danger(&["domain", "edit"], json!(["domain_not_found", key])),
            }
        })
        .collect();
    Json(Value::Array(results))
}

async fn delete_domain(State(state): State<AppState>, Json(body): Json<Value>) -> Json<Value> {
    let mut store = state.store.write().await;
    let results: Vec<Value> = items(&body)
        .iter()
        .map(|item| {
            let key = item_key(item).unwrap_or_default();
            let suffix = format!("@{key}");
            if store.mailboxes.keys().any(|address| address.ends_with(&suffix)) {
                return danger(&["domain", "delete"], json!(["domain_not_empty", key]));
            }
            match store.domains.remove(&key) {
                Some(_) => success(&["domain", "delete"], json!(["domain_removed", key])),
                None => danger(&["domain", "delete"], json!(["domain_not_found", key])),
            }
        })
        .collect();
    Json(Value::Array(results))
}

// -- aliases ------------------------------------------------------------------

async fn get_alias(State(state): State<AppState>, Path(id): Path<String>) -> Json<Value> {
    let store = state.store.read().await;
    if id == "all" {
        return Json(one_or_all(&store.aliases, None));
    }
    match id.parse::<u64>() {
        Ok(id) => Json(one_or_all(&store.aliases, Some(id))),
        Err(_) => Json(json!({})),
    }
}

async fn add_alias(State(state): State<AppState>, Json(body): Json<Value>) -> Json<Value> {
    let log = ["alias", "add"];
    let (Some(address), Some(goto)) = (field(&body, "address"), field(&body, "goto")) else {
        return Json(json!([danger(&log, json!("alias_invalid"))]));
    };

    let mut store = state.store.write().await;
    if store.aliases.values().any(|a| a["address"] == address) {
        return Json(json!([danger(&log, json!(["is_alias_or_mailbox", address]))]));
    }
    let id = store.next_id();
    let active = body.get("active").cloned().unwrap_or(json!(1));
    store.aliases.insert(
        id,
        json!({"id": id, "address": address, "goto": goto, "active": active}),
    );
    Json(json!([success(&log, json!(["alias_added", address, id]))]))
}

async fn delete_alias(State(state): State<AppState>, Json(body): Json<Value>) -> Json<Value> {
    let mut store = state.store.write().await;
    let results: Vec<Value> = items(&body)
        .iter()
        .map(|item| match item_id(item).and_then(|id| store.aliases.remove(&id)) {
            Some(alias) => success(&["alias", "delete"], json!(["alias_removed", alias["address"]])),
            None => danger(&["alias", "delete"], json!(["access_denied", item])),
        })
        .collect();
    Json(Value::Array(results))
}

// -- sync jobs ----------------------------------------------------------------

async fn get_syncjobs(
    State(state): State<AppState>,
    Path((id, _log)): Path<(String, String)>,
) -> Json<Value> {
    let store = state.store.read().await;
    let key = if id == "all" { None } else { id.parse::<u64>().ok() };
    match key {
        None if id != "all" => Json(json!({})),
        key => Json(one_or_all(&store.syncjobs, key)),
    }
}

async fn add_syncjob(State(state): State<AppState>, Json(body): Json<Value>) -> Json<Value> {
    let log = ["syncjob", "add"];
    let Some(username) = field(&body, "username") else {
        return Json(json!([danger(&log, json!("username_invalid"))]));
    };
    if field(&body, "host1").is_none() || field(&body, "user1").is_none() {
        return Json(json!([danger(&log, json!("access_denied"))]));
    }

    let mut store = state.store.write().await;
    if !store.mailboxes.contains_key(username) {
        return Json(json!([danger(&log, json!(["username_invalid", username]))]));
    }
    let id = store.next_id();
    let mut record = body.clone();
    if let Value::Object(fields) = &mut record {
        fields.remove("password1");
        fields.insert("id".into(), json!(id));
    }
    store.syncjobs.insert(id, record);
    Json(json!([success(&log, json!(["mailbox_modified", username]))]))
}

async fn edit_syncjob(State(state): State<AppState>, Json(body): Json<Value>) -> Json<Value> {
    let attr = attr(&body);
    let mut store = state.store.write().await;
    let results: Vec<Value> = items(&body)
        .iter()
        .map(|item| {
            let record = match item_id(item) {
                Some(id) => store.syncjobs.get_mut(&id),
                None => None,
            };
            match record {
                Some(record) => {
                    merge(record, &attr);
                    success(&["syncjob", "edit"], json!(["mailbox_modified", record["username"]]))
                }
                None => danger(&["syncjob", "edit"], json!(["access_denied", item])),
            }
        })
        .collect();
    Json(Value::Array(results))
}

async fn delete_syncjob(State(state): State<AppState>, Json(body): Json<Value>) -> Json<Value> {
    let mut store = state.store.write().await;
    let results: Vec<Value> = items(&body)
        .iter()
        .map(|item| match item_id(item).and_then(|id| store.syncjobs.remove(&id)) {
            Some(_) => success(&["syncjob", "delete"], json!(["deleted_syncjob", item])),
            None => danger(&["syncjob", "delete"], json!(["access_denied", item])),
        })
        .collect();
    Json(Value::Array(results))
}

// -- forwarding hosts ---------------------------------------------------------

async fn list_fwdhosts(State(state): State<AppState>) -> Json<Value> {
    let store = state.store.read().await;
    Json(one_or_all(&store.fwdhosts, None))
}

async fn add_fwdhost(State(state): State<AppState>, Json(body): Json<Value>) -> Json<Value> {
    let log = ["fwdhost", "add"];
    let Some(hostname) = field(&body, "hostname") else {
        return Json(json!([danger(&log, json!("invalid_host"))]));
    };
    let filter_spam = match body.get("filter_spam") {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(n)) => n.as_u64() == Some(1),
        Some(Value::String(s)) => s == "1",
        _ => false,
    };

    let mut store = state.store.write().await;
    store.fwdhosts.insert(
        hostname.to_string(),
        json!({
            "host": hostname,
            "source": hostname,
            "keep_spam": if filter_spam { "no" } else { "yes" },
        }),
    );
    Json(json!([success(&log, json!(["forwarding_host_added", hostname]))]))
}

async fn delete_fwdhost(State(state): State<AppState>, Json(body): Json<Value>) -> Json<Value> {
    let mut store = state.store.write().await;
    let results: Vec<Value> = items(&body)
        .iter()
        .map(|item| {
            let key = item_key(item).unwrap_or_default();
            match store.fwdhosts.remove(&key) {
                Some(_) => success(&["fwdhost", "delete"], json!(["forwarding_host_removed", key])),
                None => danger(&["fwdhost", "delete"], json!(["access_denied", key])),
            }
        })
        .collect();
    Json(Value::Array(results))
}

// -- logs ---------------------------------------------------------------------

/// Only the `api` log has content: one entry per accepted write, newest first.
async fn get_logs(
    State(state): State<AppState>,
    Path((kind, count)): Path<(String, usize)>,
) -> Json<Value> {
    if kind != "api" {
        return Json(json!([]));
    }
    let store = state.store.read().await;
    Json(Value::Array(
        store.api_log.iter().rev().take(count).cloned().collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_tolerates_missing_or_malformed_lists() {
        assert!(items(&json!({})).is_empty());
        assert!(items(&json!({"items": "nope"})).is_empty());
        assert_eq!(items(&json!({"items": [1, "a"]})), vec![json!(1), json!("a")]);
    }

    #[test]
    fn item_ids_accept_numbers_and_numeric_strings() {
        assert_eq!(item_id(&json!(4)), Some(4));
        assert_eq!(item_id(&json!("4")), Some(4));
        assert_eq!(item_id(&json!("four")), None);
    }

    #[test]
    fn merge_overwrites_only_given_attributes() {
        let mut record = json!({"active": 1, "quota": 3072});
        let attr = json!({"active": 0}).as_object().cloned().unwrap();
        merge(&mut record, &attr);
        assert_eq!(record, json!({"active": 0, "quota": 3072}));
    }

    #[test]
    fn one_or_all_returns_empty_object_for_unknown_key() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), json!({"x": 1}));
        assert_eq!(one_or_all(&map, Some("b".to_string())), json!({}));
        assert_eq!(one_or_all(&map, None), json!([{"x": 1}]));
    }

    #[test]
    fn fault_budget_counts_down() {
        let state = AppState::default();
        state.fail_next(2);
        let take = || {
            state
                .faults
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        };
        assert!(take());
        assert!(take());
        assert!(!take());
    }
}
