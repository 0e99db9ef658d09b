//! `KubeStore` against a mocked API server.
//!
//! The client talks to a `tower_test` service; each test plays the server
//! side, answering the reconciler's requests in order.

use ff_operator::OperatorConfig;
use ff_operator::controller::{ControllerContext, FeatureFlagReconciler, Outcome, Reconcile};
use ff_operator::error::ErrorClass;
use ff_operator::store::{KubeStore, ObjectKey, ResourceStore};
use http::{Method, Request, Response, StatusCode};
use kube::client::Body;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_test::mock::{self, Handle};

type ApiServer = Handle<Request<Body>, Response<Body>>;

const FLAG_PATH: &str = "/apis/deployment.github.com/v1alpha1/namespaces/ui/featureflags/dark-mode";

fn mock_store() -> (KubeStore, ApiServer) {
    let (service, handle) = mock::pair::<Request<Body>, Response<Body>>();
    let client = kube::Client::new(service, "default");
    (KubeStore::new(client, Duration::from_secs(5)), handle)
}

fn reconciler(store: KubeStore) -> FeatureFlagReconciler {
    FeatureFlagReconciler::new(Arc::new(ControllerContext::new(
        Arc::new(store),
        OperatorConfig::default(),
    )))
}

fn key() -> ObjectKey {
    ObjectKey::new("ui", "dark-mode")
}

fn flag_json(enabled: bool, status: bool) -> Value {
    json!({
        "apiVersion": "deployment.github.com/v1alpha1",
        "kind": "FeatureFlag",
        "metadata": {
            "name": "dark-mode",
            "namespace": "ui",
            "resourceVersion": "41",
            "generation": 2
        },
        "spec": {"enabled": enabled, "status": status}
    })
}

fn api_status(code: StatusCode, reason: &str) -> Value {
    json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Failure",
        "message": format!("featureflags.deployment.github.com \"dark-mode\": {reason}"),
        "reason": reason,
        "code": code.as_u16()
    })
}

fn respond(code: StatusCode, body: &Value) -> Response<Body> {
    let bytes = serde_json::to_vec(body).expect("Failed to serialize response");
    Response::builder()
        .status(code)
        .header("content-type", "application/json")
        .body(Body::from(bytes))
        .expect("Failed to build response")
}

/// Answer the next request, asserting its method and path. Returns its body.
async fn serve(server: &mut ApiServer, method: Method, path: &str, response: Response<Body>) -> Value {
    let (request, send) = server.next_request().await.expect("client sent no request");
    assert_eq!(*request.method(), method);
    assert_eq!(request.uri().path(), path);

    let body = request
        .into_body()
        .collect_bytes()
        .await
        .expect("Failed to read request body");
    send.send_response(response);

    if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).expect("request body should be JSON")
    }
}

#[tokio::test]
async fn test_get_reads_snapshot() {
    let (store, mut server) = mock_store();
    let client = tokio::spawn(async move { store.get(&key(), &CancellationToken::new()).await });

    serve(&mut server, Method::GET, FLAG_PATH, respond(StatusCode::OK, &flag_json(true, false))).await;

    let snapshot = client
        .await
        .expect("client task should not panic")
        .expect("get should succeed")
        .expect("flag should exist");
    assert_eq!(snapshot.key, key());
    assert_eq!(snapshot.resource_version, "41");
    assert_eq!(snapshot.generation, Some(2));
    assert!(snapshot.spec.enabled);
    assert!(!snapshot.spec.status);
}

#[tokio::test]
async fn test_get_not_found_is_none() {
    let (store, mut server) = mock_store();
    let client = tokio::spawn(async move { store.get(&key(), &CancellationToken::new()).await });

    serve(
        &mut server,
        Method::GET,
        FLAG_PATH,
        respond(StatusCode::NOT_FOUND, &api_status(StatusCode::NOT_FOUND, "NotFound")),
    )
    .await;

    let snapshot = client
        .await
        .expect("client task should not panic")
        .expect("404 is not an error");
    assert!(snapshot.is_none());
}

/// Fetch then conditional status patch, accepted by the server.
#[tokio::test]
async fn test_reconcile_patches_status() {
    let (store, mut server) = mock_store();
    let reconciler = reconciler(store);
    let client = tokio::spawn(async move {
        reconciler.reconcile(&key(), &CancellationToken::new()).await
    });

    serve(&mut server, Method::GET, FLAG_PATH, respond(StatusCode::OK, &flag_json(true, true))).await;

    let mut patched = flag_json(true, true);
    patched["status"] = json!({"active": true, "observedGeneration": 2});
    let patch = serve(
        &mut server,
        Method::PATCH,
        &format!("{FLAG_PATH}/status"),
        respond(StatusCode::OK, &patched),
    )
    .await;

    assert_eq!(patch["metadata"]["resourceVersion"], "41");
    assert_eq!(patch["status"], json!({"active": true, "observedGeneration": 2}));
    assert!(patch.get("spec").is_none());

    let outcome = client.await.expect("client task should not panic");
    assert!(outcome.is_done());
}

/// A flag the server no longer has is done without a write.
#[tokio::test]
async fn test_reconcile_missing_flag_is_done() {
    let (store, mut server) = mock_store();
    let reconciler = reconciler(store);
    let client = tokio::spawn(async move {
        reconciler.reconcile(&key(), &CancellationToken::new()).await
    });

    serve(
        &mut server,
        Method::GET,
        FLAG_PATH,
        respond(StatusCode::NOT_FOUND, &api_status(StatusCode::NOT_FOUND, "NotFound")),
    )
    .await;

    let outcome = client.await.expect("client task should not panic");
    assert!(outcome.is_done());
}

/// A 409 from the status patch surfaces as a conflict error.
#[tokio::test]
async fn test_reconcile_conflict_is_error() {
    let (store, mut server) = mock_store();
    let reconciler = reconciler(store);
    let client = tokio::spawn(async move {
        reconciler.reconcile(&key(), &CancellationToken::new()).await
    });

    serve(&mut server, Method::GET, FLAG_PATH, respond(StatusCode::OK, &flag_json(false, true))).await;
    serve(
        &mut server,
        Method::PATCH,
        &format!("{FLAG_PATH}/status"),
        respond(StatusCode::CONFLICT, &api_status(StatusCode::CONFLICT, "Conflict")),
    )
    .await;

    let outcome = client.await.expect("client task should not panic");
    match outcome {
        Outcome::Error(err) => {
            assert_eq!(err.class(), ErrorClass::Conflict);
            assert!(err.to_string().contains("resource version 41"));
        }
        other => panic!("expected a conflict error, got {other:?}"),
    }
}

/// A flag deleted before the patch lands is done, not an error.
#[tokio::test]
async fn test_reconcile_deleted_before_patch_is_done() {
    let (store, mut server) = mock_store();
    let reconciler = reconciler(store);
    let client = tokio::spawn(async move {
        reconciler.reconcile(&key(), &CancellationToken::new()).await
    });

    serve(&mut server, Method::GET, FLAG_PATH, respond(StatusCode::OK, &flag_json(true, true))).await;
    serve(
        &mut server,
        Method::PATCH,
        &format!("{FLAG_PATH}/status"),
        respond(StatusCode::NOT_FOUND, &api_status(StatusCode::NOT_FOUND, "NotFound")),
    )
    .await;

    let outcome = client.await.expect("client task should not panic");
    assert!(outcome.is_done());
}

/// Server errors are transient and retried.
#[tokio::test]
async fn test_reconcile_server_error_is_transient() {
    let (store, mut server) = mock_store();
    let reconciler = reconciler(store);
    let client = tokio::spawn(async move {
        reconciler.reconcile(&key(), &CancellationToken::new()).await
    });

    serve(
        &mut server,
        Method::GET,
        FLAG_PATH,
        respond(
            StatusCode::SERVICE_UNAVAILABLE,
            &api_status(StatusCode::SERVICE_UNAVAILABLE, "ServiceUnavailable"),
        ),
    )
    .await;

    let outcome = client.await.expect("client task should not panic");
    assert_eq!(outcome.error().map(|e| e.class()), Some(ErrorClass::Transient));
}
