//! Property tests for the client's local guarantees: bulk bodies are
//! verbatim, and rejected names never reach the network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mailcow_core::validate::is_hostname;
use mailcow_core::{
    ApiError, ApiKeys, ClientConfig, DomainSpec, HttpRequest, HttpResponse, MailboxSpec, MailcowClient,
    RegistrationChecker, Transport, TransportError, WhoisError,
};
use proptest::prelude::*;
use serde_json::{json, Value};

#[derive(Default)]
struct Counter {
    requests: AtomicUsize,
    lookups: AtomicUsize,
}

struct CountingTransport(Arc<Counter>);

impl Transport for CountingTransport {
    fn execute(&self, _request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.0.requests.fetch_add(1, Ordering::SeqCst);
        Ok(HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: "[]".to_string(),
        })
    }
}

struct CountingChecker(Arc<Counter>, bool);

impl RegistrationChecker for CountingChecker {
    fn is_registered(&self, _domain: &str) -> Result<bool, WhoisError> {
        self.0.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.1)
    }
}

fn client(registered: bool) -> (MailcowClient, Arc<Counter>) {
    let counter = Arc::new(Counter::default());
    let config = ClientConfig::new("https://mail.example.org", ApiKeys::new("ro", "rw")).unwrap();
    let client = MailcowClient::with_parts(
        config,
        Arc::new(CountingTransport(counter.clone())),
        Arc::new(CountingChecker(counter.clone(), registered)),
    );
    (client, counter)
}

proptest! {
    #[test]
    fn bulk_delete_body_is_the_item_list(items in prop::collection::vec("[a-z0-9@.]{0,12}", 0..8)) {
        let (client, _) = client(true);
        let req = client.endpoints().delete_mailboxes(&items).unwrap();
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        prop_assert_eq!(body, json!({ "items": items }));
    }

    #[test]
    fn non_hostnames_fail_before_any_lookup(domain in "[a-z0-9 _.@-]{0,16}") {
        prop_assume!(!is_hostname(&domain));
        let (client, counter) = client(true);

        let err = client.add_domain(&DomainSpec::new(domain.clone())).unwrap_err();
        prop_assert!(matches!(err, ApiError::Validation { .. }), "expected validation error, got {:?}", err);
        let err = client.add_mailbox(&MailboxSpec::new("info", domain, "pw")).unwrap_err();
        prop_assert!(matches!(err, ApiError::Validation { .. }), "expected validation error, got {:?}", err);

        prop_assert_eq!(counter.lookups.load(Ordering::SeqCst), 0);
        prop_assert_eq!(counter.requests.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unregistered_hostnames_never_send_a_create(label in "[a-z][a-z0-9]{0,10}", tld in "[a-z]{2,5}") {
        let domain = format!("{label}.{tld}");
        let (client, counter) = client(false);

        let err = client.add_domain(&DomainSpec::new(domain)).unwrap_err();
        prop_assert!(
            matches!(err, ApiError::DomainNotRegistered { .. }),
            "expected unregistered domain error, got {:?}",
            err
        );
        prop_assert_eq!(counter.lookups.load(Ordering::SeqCst), 1);
        prop_assert_eq!(counter.requests.load(Ordering::SeqCst), 0);
    }
}
