//! Verify request builders against JSON test vectors stored in `test-vectors/`.
//!
//! Each vector names an operation, its input, and the request it must
//! produce. Bodies are compared as parsed JSON so field order does not
//! matter.

use mailcow_core::{
    AliasSpec, ApiKeys, ClientConfig, DomainSpec, Endpoints, ForwardingHostSpec, HttpMethod, HttpRequest, LogKind,
    MailboxSpec, SyncJobSpec,
};
use serde_json::Value;

const BASE_URL: &str = "https://mail.example.org";

fn endpoints() -> Endpoints {
    let config = ClientConfig::new(BASE_URL, ApiKeys::new("ro-key", "rw-key")).unwrap();
    Endpoints::new(&config)
}

/// Parse the method string from test vectors into `HttpMethod`.
fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        other => panic!("unknown method: {other}"),
    }
}

fn load(raw: &str) -> Vec<Value> {
    let vectors: Value = serde_json::from_str(raw).unwrap();
    vectors["cases"].as_array().unwrap().clone()
}

fn sent_body(req: &HttpRequest) -> Value {
    serde_json::from_str(req.body.as_deref().unwrap()).unwrap()
}

fn input<T: serde::de::DeserializeOwned>(case: &Value) -> T {
    serde_json::from_value(case["input"].clone()).unwrap()
}

// ---------------------------------------------------------------------------
// Add
// ---------------------------------------------------------------------------

#[test]
fn add_test_vectors() {
    let e = endpoints();
    for case in load(include_str!("../../test-vectors/add.json")) {
        let name = case["name"].as_str().unwrap();
        let req = match case["operation"].as_str().unwrap() {
            "add_domain" => e.add_domain(&input::<DomainSpec>(&case)),
            "add_mailbox" => e.add_mailbox(&input::<MailboxSpec>(&case)),
            "add_alias" => e.add_alias(&input::<AliasSpec>(&case)),
            "add_sync_job" => e.add_sync_job(&input::<SyncJobSpec>(&case)),
            "add_forwarding_host" => e.add_forwarding_host(&input::<ForwardingHostSpec>(&case)),
            other => panic!("{name}: unknown operation {other}"),
        }
        .unwrap();

        let expected = &case["expected_request"];
        assert_eq!(req.method, parse_method(expected["method"].as_str().unwrap()), "{name}: method");
        assert_eq!(req.url, format!("{BASE_URL}{}", expected["path"].as_str().unwrap()), "{name}: path");

        let expected_headers: Vec<(String, String)> = expected["headers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|h| {
                let arr = h.as_array().unwrap();
                (arr[0].as_str().unwrap().to_string(), arr[1].as_str().unwrap().to_string())
            })
            .collect();
        assert_eq!(req.headers, expected_headers, "{name}: headers");
        assert_eq!(sent_body(&req), expected["body"], "{name}: body");
    }
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[test]
fn delete_test_vectors() {
    let e = endpoints();
    for case in load(include_str!("../../test-vectors/delete.json")) {
        let name = case["name"].as_str().unwrap();
        let items = case["items"].as_array().unwrap();
        let req = match case["operation"].as_str().unwrap() {
            "delete_mailboxes" => e.delete_mailboxes(items),
            "delete_domains" => e.delete_domains(items),
            "delete_aliases" => e.delete_aliases(items),
            "delete_sync_jobs" => e.delete_sync_jobs(items),
            "delete_forwarding_hosts" => e.delete_forwarding_hosts(items),
            other => panic!("{name}: unknown operation {other}"),
        }
        .unwrap();

        let expected = &case["expected_request"];
        assert_eq!(req.method, parse_method(expected["method"].as_str().unwrap()), "{name}: method");
        assert_eq!(req.url, format!("{BASE_URL}{}", expected["path"].as_str().unwrap()), "{name}: path");
        assert_eq!(sent_body(&req), expected["body"], "{name}: body");
    }
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

#[test]
fn get_test_vectors() {
    let e = endpoints();
    for case in load(include_str!("../../test-vectors/get.json")) {
        let name = case["name"].as_str().unwrap();
        let arg = case["arg"].as_str();
        let req = match case["operation"].as_str().unwrap() {
            "get_mailbox" => e.get_mailbox(arg),
            "get_domain" => e.get_domain(arg),
            "get_alias" => e.get_alias(arg),
            "list_sync_jobs" => e.list_sync_jobs(),
            "list_forwarding_hosts" => e.list_forwarding_hosts(),
            "get_logs" => {
                let (kind, count) = arg.unwrap().split_once('/').unwrap();
                e.get_logs(kind.parse::<LogKind>().unwrap(), count.parse().unwrap())
            }
            other => panic!("{name}: unknown operation {other}"),
        };

        assert_eq!(req.method, HttpMethod::Get, "{name}: method");
        assert_eq!(
            req.url,
            format!("{BASE_URL}{}", case["expected_path"].as_str().unwrap()),
            "{name}: path"
        );
        assert_eq!(req.headers, vec![("X-Api-Key".to_string(), "rw-key".to_string())], "{name}: headers");
        assert!(req.body.is_none(), "{name}: body");
    }
}
