use std::time::Duration;

use meshverify::errors::ProbeError;
use meshverify::probe::{HttpTransport, ProbeExecutor, ProbeRequest, Target, Workload};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request_to(address: &str) -> ProbeRequest {
    let target = Target::new("server", "echo", "http", 8090).with_address(address);
    ProbeRequest::new(Workload::app("client"), target).with_path("/echo")
}

fn transport() -> HttpTransport {
    HttpTransport::new(Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn test_direct_batch_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/echo"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let transport = transport();
    let request = request_to(&server.address().to_string()).with_count(3);
    let result = ProbeExecutor::new(&transport).call(&request).await.unwrap();

    assert!(result.success);
    assert_eq!(result.calls.len(), 3);
    assert!(result.artifact.is_none());
    result.check_ok().unwrap();
}

#[tokio::test]
async fn test_direct_bad_status_reports_first_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let transport = transport();
    let request = request_to(&server.address().to_string()).with_count(2);
    let result = ProbeExecutor::new(&transport).call(&request).await.unwrap();

    assert!(!result.success);
    // every call is still issued
    assert_eq!(result.calls.len(), 2);
    assert!(matches!(
        result.check_ok(),
        Err(ProbeError::BadStatus { call: 1, status: 503, .. })
    ));
}

#[tokio::test]
async fn test_direct_unreachable_target() {
    // Bind then drop to get a port nothing listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);

    let transport = transport();
    let result = ProbeExecutor::new(&transport).call(&request_to(&address)).await.unwrap();

    assert!(!result.success);
    assert!(matches!(result.check_ok(), Err(ProbeError::Unreachable { call: 1, .. })));
}

#[tokio::test]
async fn test_zero_count_is_rejected_before_sending() {
    let transport = transport();
    let request = request_to("127.0.0.1:1").with_count(0);

    let err = ProbeExecutor::new(&transport).call(&request).await.unwrap_err();
    assert!(matches!(err, ProbeError::InvalidRequest { .. }));
}
