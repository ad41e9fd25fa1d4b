//! Toggle lifecycle of EntitlementSession: local gate first, write on
//! approval, patch, full re-fetch.

use mops_client::{ClientConfig, ClientError, EntitlementClient, EntitlementSession};
use mops_core::{ChangeSource, Notes, TenantId};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TENANT: &str = "8d3c2b4e-6a51-4f0e-9b7a-1c2d3e4f5a6b";

fn tenant() -> TenantId {
    TENANT.parse().unwrap()
}

fn list_path() -> String {
    format!("/v1/tenants/{TENANT}/modules")
}

fn module_path(key: &str) -> String {
    format!("/v1/tenants/{TENANT}/modules/{key}")
}

fn row(key: &str, name: &str, deps: &[&str], enabled: bool) -> Value {
    json!({
        "module_key": key,
        "module_name": name,
        "dependency_keys": deps,
        "is_core": false,
        "enabled": enabled,
        "billing_model": "included",
        "status": if enabled { "active" } else { "inactive" },
        "notes": ""
    })
}

/// inventory on, purchasing off, receiving off.
fn initial_rows() -> Value {
    json!([
        row("inventory", "Inventory", &[], true),
        row("purchasing", "Purchasing", &["inventory"], false),
        row("receiving", "Receiving", &["purchasing", "inventory"], false),
    ])
}

async fn mount_list_once(server: &MockServer, rows: Value) {
    Mock::given(method("GET"))
        .and(path(list_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .up_to_n_times(1)
        .mount(server)
        .await;
}

async fn open_session(server: &MockServer) -> EntitlementSession {
    let client = EntitlementClient::new(ClientConfig::new(server.uri().parse().unwrap())).unwrap();
    EntitlementSession::open(client, tenant()).await.unwrap()
}

#[tokio::test]
async fn open_loads_snapshot() {
    let server = MockServer::start().await;
    mount_list_once(&server, initial_rows()).await;

    let session = open_session(&server).await;
    assert_eq!(session.snapshot().len(), 3);
    assert!(!session.is_stale());
    assert_eq!(session.graph().enabled_keys().count(), 1);
}

#[tokio::test]
async fn local_rejection_sends_no_request() {
    let server = MockServer::start().await;
    mount_list_once(&server, initial_rows()).await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut session = open_session(&server).await;
    let err = session
        .request_toggle("receiving", true, ChangeSource::AdminUi, None)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Rejected(_)));
    assert_eq!(err.blockers(), Some(vec!["purchasing".to_string()]));
    assert!(!session.is_stale());
}

#[tokio::test]
async fn toggle_to_current_state_sends_nothing() {
    let server = MockServer::start().await;
    mount_list_once(&server, initial_rows()).await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut session = open_session(&server).await;
    let unchanged = session
        .request_toggle("inventory", true, ChangeSource::Cli, None)
        .await
        .unwrap();

    assert!(unchanged.enabled);
    assert_eq!(unchanged.module_key, "inventory");
    assert!(!session.is_stale());
}

#[tokio::test]
async fn toggle_to_current_state_with_notes_writes_metadata() {
    let server = MockServer::start().await;
    mount_list_once(&server, initial_rows()).await;
    let mut updated = row("inventory", "Inventory", &[], true);
    updated["notes"] = json!("count cycle moved to Friday");
    Mock::given(method("PUT"))
        .and(path(module_path("inventory")))
        .and(body_json(json!({
            "enabled": true,
            "notes": "count cycle moved to Friday",
            "source": "cli"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(updated.clone()))
        .expect(1)
        .mount(&server)
        .await;
    mount_list_once(
        &server,
        json!([
            updated,
            row("purchasing", "Purchasing", &["inventory"], false),
            row("receiving", "Receiving", &["purchasing", "inventory"], false),
        ]),
    )
    .await;

    let mut session = open_session(&server).await;
    let notes = Notes::new("count cycle moved to Friday").unwrap();
    let row = session
        .request_toggle("inventory", true, ChangeSource::Cli, Some(notes))
        .await
        .unwrap();

    assert_eq!(row.notes.as_str(), "count cycle moved to Friday");
    assert!(!session.is_stale());
}

#[tokio::test]
async fn local_disable_rejection_names_dependents() {
    let server = MockServer::start().await;
    mount_list_once(
        &server,
        json!([
            row("inventory", "Inventory", &[], true),
            row("purchasing", "Purchasing", &["inventory"], true),
            row("products", "Products (BOM / BOL)", &["inventory"], true),
        ]),
    )
    .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut session = open_session(&server).await;
    let err = session
        .request_toggle("inventory", false, ChangeSource::AdminUi, None)
        .await
        .unwrap_err();
    assert_eq!(
        err.blockers(),
        Some(vec!["Purchasing".to_string(), "Products (BOM / BOL)".to_string()])
    );
}

#[tokio::test]
async fn approved_toggle_writes_then_refetches() {
    let server = MockServer::start().await;
    mount_list_once(&server, initial_rows()).await;

    Mock::given(method("PUT"))
        .and(path(module_path("purchasing")))
        .and(body_json(json!({
            "enabled": true,
            "notes": "annual contract",
            "source": "admin_ui"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(row("purchasing", "Purchasing", &["inventory"], true)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut session = open_session(&server).await;

    // Second list fetch: another session also enabled receiving meanwhile.
    mount_list_once(
        &server,
        json!([
            row("inventory", "Inventory", &[], true),
            row("purchasing", "Purchasing", &["inventory"], true),
            row("receiving", "Receiving", &["purchasing", "inventory"], true),
        ]),
    )
    .await;

    let updated = session
        .request_toggle(
            "purchasing",
            true,
            ChangeSource::AdminUi,
            Some(Notes::new("annual contract").unwrap()),
        )
        .await
        .unwrap();

    assert!(updated.enabled);
    assert!(!session.is_stale());
    // Snapshot comes from the re-fetch, not just the patch.
    assert!(session.snapshot()[2].enabled);
}

#[tokio::test]
async fn remote_conflict_is_surfaced_and_marks_stale() {
    let server = MockServer::start().await;
    mount_list_once(&server, initial_rows()).await;

    Mock::given(method("PUT"))
        .and(path(module_path("purchasing")))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": "cannot enable purchasing: requires inventory to be enabled first",
            "missing_dependencies": ["inventory"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = open_session(&server).await;
    let err = session
        .request_toggle("purchasing", true, ChangeSource::AdminUi, None)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Conflict { .. }));
    assert_eq!(err.blockers(), Some(vec!["inventory".to_string()]));
    assert!(session.is_stale());
    // Nothing was patched.
    assert!(!session.snapshot()[1].enabled);
}

#[tokio::test]
async fn failed_refetch_keeps_patched_row() {
    let server = MockServer::start().await;
    mount_list_once(&server, initial_rows()).await;

    Mock::given(method("PUT"))
        .and(path(module_path("purchasing")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(row("purchasing", "Purchasing", &["inventory"], true)),
        )
        .mount(&server)
        .await;

    let mut session = open_session(&server).await;

    Mock::given(method("GET"))
        .and(path(list_path()))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let updated = session
        .request_toggle("purchasing", true, ChangeSource::AdminUi, None)
        .await
        .unwrap();

    assert!(updated.enabled);
    assert!(session.is_stale());
    assert!(session.snapshot()[1].enabled);
}

#[tokio::test]
async fn unknown_module_is_rejected_without_request() {
    let server = MockServer::start().await;
    mount_list_once(&server, initial_rows()).await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut session = open_session(&server).await;
    let err = session
        .request_toggle("warehouse", true, ChangeSource::Cli, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::UnknownModule(_)));

    let err = session
        .request_toggle("Not A Key", true, ChangeSource::Cli, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
}

#[tokio::test]
async fn preview_is_local() {
    let server = MockServer::start().await;
    mount_list_once(&server, initial_rows()).await;

    let session = open_session(&server).await;
    let decision = session.preview("receiving", true).unwrap();
    assert!(!decision.allowed);
    assert_eq!(decision.missing_dependencies, vec!["purchasing".to_string()]);

    let decision = session.preview("inventory", false).unwrap();
    assert!(decision.allowed);
}
