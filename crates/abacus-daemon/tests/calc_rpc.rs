// Copyright (c) 2026 Abacus Contributors
// SPDX-License-Identifier: Apache-2.0

//! Arithmetic behavior observed through the RPC surface: failures of the
//! engine ride in-band with a nonzero status code, never as RPC errors.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::metadata::MetadataValue;
use tonic::transport::{Channel, Server};
use tonic::Request;

use abacus_core::{CalcConfig, Role};
use abacus_daemon::auth::{default_access_policy, AccessGuard};
use abacus_daemon::server::CalculatorService;
use abacus_daemon::telemetry::Telemetry;
use abacus_daemon::token::{TokenIssuer, TokenVerifier};
use abacus_protocol::pb;
use abacus_protocol::pb::calculator_client::CalculatorClient;
use abacus_protocol::pb::calculator_server::CalculatorServer;
use abacus_protocol::StatusCode;

const SECRET: &[u8] = b"calc-integration-secret";
const ISSUER: &str = "abacus-auth";

async fn start_server(config: CalcConfig) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let guard = AccessGuard::new(
        Arc::new(default_access_policy()),
        Some(Arc::new(TokenVerifier::new(SECRET, ISSUER, 0))),
        Some(Duration::from_secs(5)),
    );
    let service = CalculatorService::new(config, Telemetry::default());
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let incoming = TcpListenerStream::new(listener);
    let handle = tokio::spawn(async move {
        Server::builder()
            .add_service(CalculatorServer::with_interceptor(service, guard))
            .serve_with_incoming(incoming)
            .await
            .expect("server run");
    });
    (addr, handle)
}

fn admin_request(a: f64, b: f64) -> Request<pb::CalculationRequest> {
    let token = TokenIssuer::new(SECRET, ISSUER, Duration::from_secs(600))
        .mint("calc-caller", Role::Admin)
        .expect("mint token");
    let mut request = Request::new(pb::CalculationRequest { a, b });
    let value: MetadataValue<_> = format!("Bearer {token}").parse().expect("bearer metadata");
    request.metadata_mut().insert("authorization", value);
    request
}

async fn client(addr: SocketAddr) -> CalculatorClient<Channel> {
    CalculatorClient::connect(format!("http://{addr}"))
        .await
        .expect("connect")
}

#[tokio::test]
async fn overflow_is_reported_in_band() {
    let (addr, handle) = start_server(CalcConfig::default()).await;
    let mut client = client(addr).await;

    let response = client
        .add(admin_request(f64::MAX, f64::MAX))
        .await
        .expect("transport must succeed")
        .into_inner();
    assert_eq!(response.status_code, StatusCode::Overflow.as_i32());
    assert_eq!(response.result, 0.0);
    assert_eq!(response.error_message, "numeric overflow");
    assert_eq!(response.operation, "Add");

    handle.abort();
}

#[tokio::test]
async fn divide_by_zero_is_reported_in_band() {
    let (addr, handle) = start_server(CalcConfig::default()).await;
    let mut client = client(addr).await;

    let response = client
        .divide(admin_request(5.0, 0.0))
        .await
        .expect("transport must succeed")
        .into_inner();
    assert_eq!(response.status_code, StatusCode::DivideByZero.as_i32());
    assert_eq!(response.result, 0.0);
    assert_eq!(response.error_message, "division by zero");

    handle.abort();
}

#[tokio::test]
async fn non_finite_operand_is_invalid_input() {
    let (addr, handle) = start_server(CalcConfig::default()).await;
    let mut client = client(addr).await;

    let response = client
        .subtract(admin_request(f64::NAN, 1.0))
        .await
        .expect("transport must succeed")
        .into_inner();
    assert_eq!(response.status_code, StatusCode::InvalidInput.as_i32());

    let response = client
        .multiply(admin_request(f64::INFINITY, 2.0))
        .await
        .expect("transport must succeed")
        .into_inner();
    assert_eq!(response.status_code, StatusCode::InvalidInput.as_i32());

    handle.abort();
}

#[tokio::test]
async fn results_are_rounded_to_configured_places() {
    let (addr, handle) = start_server(CalcConfig {
        max_decimal_places: 6,
        check_overflow: true,
    })
    .await;
    let mut client = client(addr).await;

    let response = client
        .add(admin_request(0.1, 0.2))
        .await
        .expect("add")
        .into_inner();
    assert_eq!(response.status_code, StatusCode::Ok.as_i32());
    assert_eq!(response.result, 0.3);

    handle.abort();
}

#[tokio::test]
async fn response_carries_duration_and_operation_tag() {
    let (addr, handle) = start_server(CalcConfig::default()).await;
    let mut client = client(addr).await;

    let response = client
        .divide(admin_request(9.0, 4.0))
        .await
        .expect("divide")
        .into_inner();
    assert_eq!(response.result, 2.25);
    assert_eq!(response.operation, "Divide");
    assert!(response.duration_ns >= 0);

    handle.abort();
}
