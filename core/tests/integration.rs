//! End-to-end tests against the mock mailcow server over real HTTP.
//!
//! # Design
//! Starts `mock-server` on a random port in its own tokio runtime and a
//! fake WHOIS responder on another, then drives `MailcowClient` with the
//! default ureq transport and a `WhoisChecker` pointed at the fake.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use mailcow_core::{
    AliasSpec, ApiError, ApiKeys, ClientConfig, DomainSpec, ForwardingHostSpec, LogKind, MailboxSpec,
    MailcowClient, SyncJobSpec, TransportError, UreqTransport, WhoisChecker,
};
use mock_server::{AppState, DEFAULT_API_KEY};
use serde_json::json;

/// Start the mock API server and return its base URL.
fn start_server(state: AppState) -> String {
    let std_listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener, state).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

/// Answer WHOIS queries forever; only `registered` domains get the Verisign notice.
fn start_whois(registered: &'static [&'static str]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut line = String::new();
            if BufReader::new(stream.try_clone().unwrap()).read_line(&mut line).is_err() {
                continue;
            }
            let domain = line.trim();
            let reply = if registered.contains(&domain) {
                format!(
                    "   Domain Name: {}\r\nNOTICE: The expiration date displayed in this record is the date the\r\n",
                    domain.to_uppercase()
                )
            } else {
                format!("No match for \"{}\".\r\n", domain.to_uppercase())
            };
            let _ = stream.write_all(reply.as_bytes());
        }
    });

    addr
}

fn client(base_url: &str, whois: &str, api_key: &str) -> MailcowClient {
    let config = ClientConfig::new(base_url, ApiKeys::new("read-only", api_key))
        .unwrap()
        .with_timeout(Duration::from_secs(5));
    let checker = WhoisChecker::new(whois).with_timeout(Duration::from_secs(2));
    MailcowClient::with_parts(config, Arc::new(UreqTransport::new(Some(Duration::from_secs(5)))), Arc::new(checker))
}

#[test]
fn full_lifecycle() {
    let state = AppState::default();
    let base = start_server(state.clone());
    let whois = start_whois(&["example.org"]);
    let client = client(&base, &whois, DEFAULT_API_KEY);

    // Step 1: nothing provisioned yet.
    assert_eq!(client.list_domains().unwrap(), json!([]));

    // Step 2: gate rejects bad and unregistered names without calling the API.
    let before = state.requests_seen();
    let err = client.add_domain(&DomainSpec::new("bad domain")).unwrap_err();
    assert!(matches!(err, ApiError::Validation { .. }));
    let err = client.add_domain(&DomainSpec::new("unregistered.org")).unwrap_err();
    assert!(matches!(err, ApiError::DomainNotRegistered { .. }));
    let err = client
        .add_mailbox(&MailboxSpec::new("info", "unregistered.org", "pw"))
        .unwrap_err();
    assert!(matches!(err, ApiError::DomainNotRegistered { .. }));
    assert_eq!(state.requests_seen(), before);

    // Step 3: create the domain; defaults reach the server.
    let outcome = client.add_domain(&DomainSpec::new("example.org")).unwrap();
    assert_eq!(outcome[0]["type"], "success");
    let domain = client.get_domain(Some("example.org")).unwrap();
    assert_eq!(domain["quota"], 10240);
    assert_eq!(domain["mailboxes"], 10);

    // Step 4: a second create is reported in the body, not raised.
    let outcome = client.add_domain(&DomainSpec::new("example.org")).unwrap();
    assert_eq!(outcome[0]["type"], "danger");

    // Step 5: mailbox with default quota.
    let outcome = client
        .add_mailbox(&MailboxSpec::new("info", "example.org", "Secr3t!"))
        .unwrap();
    assert_eq!(outcome[0]["msg"], json!(["mailbox_added", "info@example.org"]));
    let mailbox = client.get_mailbox(Some("info@example.org")).unwrap();
    assert_eq!(mailbox["quota"], 3072);
    client.edit_mailbox(&["info@example.org"], &json!({"quota": 4096})).unwrap();
    assert_eq!(client.get_mailbox(Some("info@example.org")).unwrap()["quota"], 4096);
    assert_eq!(client.list_mailboxes().unwrap().as_array().unwrap().len(), 1);

    // Step 6: alias.
    client
        .add_alias(&AliasSpec::new("sales@example.org", ["info@example.org"]))
        .unwrap();
    let aliases = client.get_alias(None).unwrap();
    assert_eq!(aliases[0]["goto"], "info@example.org");
    let alias_id = aliases[0]["id"].as_u64().unwrap();
    client.delete_aliases(&[alias_id]).unwrap();
    assert_eq!(client.get_alias(None).unwrap(), json!([]));

    // Step 7: sync job add, edit, list, delete.
    let job = SyncJobSpec {
        mins_interval: Some(20),
        ..SyncJobSpec::new("info@example.org", "imap.old.example", "info", "oldpass")
    };
    assert_eq!(client.add_sync_job(&job).unwrap()[0]["type"], "success");
    let jobs = client.list_sync_jobs().unwrap();
    assert_eq!(jobs[0]["mins_interval"], 20);
    assert!(jobs[0].get("password1").is_none());
    let job_id = jobs[0]["id"].as_u64().unwrap();
    client.edit_sync_job(&[job_id], &json!({"active": 0})).unwrap();
    assert_eq!(client.list_sync_jobs().unwrap()[0]["active"], 0);
    client.delete_sync_jobs(&[job_id]).unwrap();
    assert_eq!(client.list_sync_jobs().unwrap(), json!([]));

    // Step 8: forwarding hosts.
    client
        .add_forwarding_host(&ForwardingHostSpec::new("192.0.2.10"))
        .unwrap();
    assert_eq!(client.list_forwarding_hosts().unwrap()[0]["keep_spam"], "yes");
    client.delete_forwarding_hosts(&["192.0.2.10"]).unwrap();
    assert_eq!(client.list_forwarding_hosts().unwrap(), json!([]));

    // Step 9: every write above shows up in the api log.
    let log = client.get_logs(LogKind::Api, 3).unwrap();
    assert_eq!(log.as_array().unwrap().len(), 3);
    assert_eq!(log[0]["uri"], "/api/v1/delete/fwdhost");

    // Step 10: tear down.
    let removed = client.delete_mailboxes(&["info@example.org"]).unwrap();
    assert_eq!(removed[0]["type"], "success");
    let removed = client.delete_domains(&["example.org"]).unwrap();
    assert_eq!(removed[0]["type"], "success");
    assert_eq!(client.list_domains().unwrap(), json!([]));
}

#[test]
fn retries_recover_from_a_single_server_error() {
    let state = AppState::default();
    let base = start_server(state.clone());
    let client = client(&base, "127.0.0.1:9", DEFAULT_API_KEY);

    state.fail_next(1);
    assert_eq!(client.list_domains().unwrap(), json!([]));
    assert_eq!(state.requests_seen(), 2);
}

#[test]
fn persistent_server_errors_exhaust_three_attempts() {
    let state = AppState::default();
    let base = start_server(state.clone());
    let client = client(&base, "127.0.0.1:9", DEFAULT_API_KEY);

    state.fail_next(3);
    let err = client.list_sync_jobs().unwrap_err();
    assert!(matches!(
        err,
        ApiError::Transport(TransportError::Server { status: 500, .. })
    ));
    assert_eq!(state.requests_seen(), 3);
}

#[test]
fn wrong_key_returns_the_error_body() {
    let state = AppState::default();
    let base = start_server(state.clone());
    let client = client(&base, "127.0.0.1:9", "not-the-key");

    let body = client.list_mailboxes().unwrap();
    assert_eq!(body, json!({"type": "error", "msg": "authentication failed"}));
    assert_eq!(state.requests_seen(), 1);
}
