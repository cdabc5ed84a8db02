#![allow(clippy::result_large_err)]

// Copyright (c) 2026 Abacus Contributors
// SPDX-License-Identifier: Apache-2.0

use tonic::{Request, Response, Status};

use abacus_core::{CalcConfig, CalculationResult, Calculator, Outcome};
use abacus_protocol::pb::health_check_response::ServingStatus;
use abacus_protocol::{methods, pb, StatusCode};

use crate::auth::Deadline;
use crate::telemetry::Telemetry;

/// Calculator request dispatcher.
///
/// The access interceptor has already run by the time a handler executes;
/// this service only checks the call deadline, drives the engine, and
/// translates the structured result into the response envelope. Arithmetic
/// failures are in-band (nonzero `status_code`), never RPC errors.
#[derive(Debug, Clone)]
pub struct CalculatorService {
    calc: Calculator,
    telemetry: Telemetry,
}

impl CalculatorService {
    pub fn new(config: CalcConfig, telemetry: Telemetry) -> Self {
        Self {
            calc: Calculator::new(config),
            telemetry,
        }
    }

    fn finish(&self, method: &'static str, result: CalculationResult) -> pb::CalculationResponse {
        let operation = result.operation;
        let status = status_code(result.outcome);

        self.telemetry.record_request(method, operation.metric_label());
        self.telemetry.record_response_time(result.elapsed);
        if status != StatusCode::Ok {
            self.telemetry
                .record_error(method, operation.metric_label(), status.as_i32());
        }

        pb::CalculationResponse {
            result: result.value,
            status_code: status.as_i32(),
            error_message: result.outcome.message().to_string(),
            operation: operation.as_str().to_string(),
            duration_ns: result.elapsed.as_nanos() as i64,
        }
    }
}

/// Reject a call whose deadline elapsed before dispatch. Once the engine
/// starts it runs to completion; only this check observes the deadline.
fn check_deadline<T>(request: &Request<T>) -> Result<(), Status> {
    if let Some(deadline) = request.extensions().get::<Deadline>() {
        if deadline.expired() {
            return Err(Status::cancelled("request cancelled or timed out"));
        }
    }
    Ok(())
}

fn status_code(outcome: Outcome) -> StatusCode {
    match outcome {
        Outcome::Ok => StatusCode::Ok,
        Outcome::Overflow => StatusCode::Overflow,
        Outcome::DivideByZero => StatusCode::DivideByZero,
        Outcome::InvalidInput => StatusCode::InvalidInput,
        Outcome::Underflow => StatusCode::Underflow,
    }
}

#[tonic::async_trait]
impl pb::calculator_server::Calculator for CalculatorService {
    async fn add(
        &self,
        request: Request<pb::CalculationRequest>,
    ) -> Result<Response<pb::CalculationResponse>, Status> {
        check_deadline(&request)?;
        let req = request.into_inner();
        Ok(Response::new(
            self.finish(methods::ADD, self.calc.add(req.a, req.b)),
        ))
    }

    async fn subtract(
        &self,
        request: Request<pb::CalculationRequest>,
    ) -> Result<Response<pb::CalculationResponse>, Status> {
        check_deadline(&request)?;
        let req = request.into_inner();
        Ok(Response::new(
            self.finish(methods::SUBTRACT, self.calc.subtract(req.a, req.b)),
        ))
    }

    async fn multiply(
        &self,
        request: Request<pb::CalculationRequest>,
    ) -> Result<Response<pb::CalculationResponse>, Status> {
        check_deadline(&request)?;
        let req = request.into_inner();
        Ok(Response::new(
            self.finish(methods::MULTIPLY, self.calc.multiply(req.a, req.b)),
        ))
    }

    async fn divide(
        &self,
        request: Request<pb::CalculationRequest>,
    ) -> Result<Response<pb::CalculationResponse>, Status> {
        check_deadline(&request)?;
        let req = request.into_inner();
        Ok(Response::new(
            self.finish(methods::DIVIDE, self.calc.divide(req.a, req.b)),
        ))
    }
}

/// Liveness surface; registered without the access interceptor.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthService;

#[tonic::async_trait]
impl pb::health_server::Health for HealthService {
    async fn check(
        &self,
        _request: Request<pb::HealthCheckRequest>,
    ) -> Result<Response<pb::HealthCheckResponse>, Status> {
        Ok(Response::new(pb::HealthCheckResponse {
            status: ServingStatus::Serving as i32,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abacus_protocol::pb::calculator_server::Calculator as CalculatorHandler;
    use abacus_protocol::pb::health_server::Health as HealthHandler;
    use std::time::Duration;
    use tonic::Code;

    fn service() -> CalculatorService {
        CalculatorService::new(CalcConfig::default(), Telemetry::default())
    }

    #[tokio::test]
    async fn add_produces_success_envelope() {
        let response = service()
            .add(Request::new(pb::CalculationRequest { a: 6.0, b: 7.0 }))
            .await
            .expect("add rpc")
            .into_inner();
        assert_eq!(response.status_code, StatusCode::Ok.as_i32());
        assert_eq!(response.result, 13.0);
        assert_eq!(response.operation, "Add");
        assert!(response.error_message.is_empty());
    }

    #[tokio::test]
    async fn divide_by_zero_is_in_band_not_an_rpc_error() {
        let response = service()
            .divide(Request::new(pb::CalculationRequest { a: 5.0, b: 0.0 }))
            .await
            .expect("divide rpc must still succeed at the transport level")
            .into_inner();
        assert_eq!(response.status_code, StatusCode::DivideByZero.as_i32());
        assert_eq!(response.result, 0.0);
        assert_eq!(response.error_message, "division by zero");
    }

    #[tokio::test]
    async fn overflow_reports_nonzero_status_and_zero_value() {
        let response = service()
            .add(Request::new(pb::CalculationRequest {
                a: f64::MAX,
                b: f64::MAX,
            }))
            .await
            .expect("add rpc")
            .into_inner();
        assert_eq!(response.status_code, StatusCode::Overflow.as_i32());
        assert_eq!(response.result, 0.0);
    }

    #[tokio::test]
    async fn expired_deadline_cancels_before_dispatch() {
        let mut request = Request::new(pb::CalculationRequest { a: 1.0, b: 2.0 });
        request
            .extensions_mut()
            .insert(Deadline::after(Duration::ZERO));
        let err = service()
            .add(request)
            .await
            .expect_err("expired deadline must cancel");
        assert_eq!(err.code(), Code::Cancelled);
    }

    #[tokio::test]
    async fn live_deadline_does_not_cancel() {
        let mut request = Request::new(pb::CalculationRequest { a: 1.0, b: 2.0 });
        request
            .extensions_mut()
            .insert(Deadline::after(Duration::from_secs(30)));
        let response = service().add(request).await.expect("add rpc").into_inner();
        assert_eq!(response.status_code, StatusCode::Ok.as_i32());
    }

    #[tokio::test]
    async fn health_reports_serving() {
        let response = HealthService
            .check(Request::new(pb::HealthCheckRequest {
                service: String::new(),
            }))
            .await
            .expect("health rpc")
            .into_inner();
        assert_eq!(response.status, ServingStatus::Serving as i32);
    }
}
