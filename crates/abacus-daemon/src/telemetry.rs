// Copyright (c) 2026 Abacus Contributors
// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("metrics server failed: {0}")]
    Server(std::io::Error),
}

const LATENCY_BUCKET_BOUNDS_MS: [u64; 9] = [1, 5, 10, 25, 50, 100, 250, 500, 1000];

#[derive(Debug, Default)]
struct TelemetryState {
    requests_total: HashMap<(String, String), u64>,
    errors_total: HashMap<(String, String, i32), u64>,
    response_time_ms_bucket: BTreeMap<u64, u64>,
}

/// In-process request/error/latency counters, rendered in Prometheus text
/// exposition format. Cheap to clone; all clones share one state.
#[derive(Debug, Clone, Default)]
pub struct Telemetry {
    state: Arc<Mutex<TelemetryState>>,
}

impl Telemetry {
    pub fn record_request(&self, method: &str, operation: &str) {
        let mut guard = self.state.lock();
        let entry = guard
            .requests_total
            .entry((method.to_string(), operation.to_string()))
            .or_insert(0);
        *entry = entry.saturating_add(1);
    }

    pub fn record_error(&self, method: &str, operation: &str, code: i32) {
        let mut guard = self.state.lock();
        let entry = guard
            .errors_total
            .entry((method.to_string(), operation.to_string(), code))
            .or_insert(0);
        *entry = entry.saturating_add(1);
    }

    pub fn record_response_time(&self, elapsed: Duration) {
        let latency_ms = elapsed.as_millis() as u64;
        let bucket = LATENCY_BUCKET_BOUNDS_MS
            .into_iter()
            .find(|bound| latency_ms <= *bound)
            .unwrap_or(u64::MAX);
        let mut guard = self.state.lock();
        let entry = guard.response_time_ms_bucket.entry(bucket).or_insert(0);
        *entry = entry.saturating_add(1);
    }

    pub fn render(&self) -> String {
        let guard = self.state.lock();
        let mut out = String::new();

        out.push_str("# TYPE abacus_grpc_requests_total counter\n");
        for ((method, operation), value) in &guard.requests_total {
            let _ = writeln!(
                out,
                "abacus_grpc_requests_total{{method=\"{}\",operation=\"{}\"}} {}",
                method, operation, value
            );
        }

        out.push_str("# TYPE abacus_grpc_errors_total counter\n");
        for ((method, operation, code), value) in &guard.errors_total {
            let _ = writeln!(
                out,
                "abacus_grpc_errors_total{{method=\"{}\",operation=\"{}\",code=\"{}\"}} {}",
                method, operation, code, value
            );
        }

        out.push_str("# TYPE abacus_grpc_response_time_ms_bucket counter\n");
        for (bucket, value) in &guard.response_time_ms_bucket {
            let bucket_label = if *bucket == u64::MAX {
                "+Inf".to_string()
            } else {
                bucket.to_string()
            };
            let _ = writeln!(
                out,
                "abacus_grpc_response_time_ms_bucket{{le=\"{}\"}} {}",
                bucket_label, value
            );
        }

        out
    }

    pub async fn spawn_metrics_server(
        self,
        addr: SocketAddr,
    ) -> Result<(SocketAddr, tokio::task::JoinHandle<()>), TelemetryError> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(TelemetryError::Server)?;
        let bound = listener.local_addr().map_err(TelemetryError::Server)?;
        let handle = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((mut socket, _)) => {
                        let telemetry = self.clone();
                        tokio::spawn(async move {
                            let mut buf = vec![0_u8; 2048];
                            match socket.read(&mut buf).await {
                                Ok(n) if n > 0 => {
                                    let req = String::from_utf8_lossy(&buf[..n]);
                                    let (status, body) = if req.starts_with("GET /metrics ") {
                                        ("200 OK", telemetry.render())
                                    } else {
                                        ("404 Not Found", "not found".to_string())
                                    };
                                    let response = format!(
                                        "HTTP/1.1 {status}\r\ncontent-type: text/plain; version=0.0.4\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                                        body.len(), body
                                    );
                                    let _ = socket.write_all(response.as_bytes()).await;
                                }
                                Ok(_) => {}
                                Err(err) => {
                                    tracing::warn!(error=%err, "metrics socket read failed");
                                }
                            }
                        });
                    }
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) => {
                        tracing::error!(error=%err, "metrics server accept failed");
                        break;
                    }
                }
            }
        });
        Ok((bound, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_per_series() {
        let telemetry = Telemetry::default();
        telemetry.record_request("/abacus.v1.Calculator/Add", "ADD");
        telemetry.record_request("/abacus.v1.Calculator/Add", "ADD");
        telemetry.record_request("/abacus.v1.Calculator/Divide", "DIVIDE");
        telemetry.record_error("/abacus.v1.Calculator/Divide", "DIVIDE", 2);

        let rendered = telemetry.render();
        assert!(rendered.contains(
            "abacus_grpc_requests_total{method=\"/abacus.v1.Calculator/Add\",operation=\"ADD\"} 2"
        ));
        assert!(rendered.contains(
            "abacus_grpc_requests_total{method=\"/abacus.v1.Calculator/Divide\",operation=\"DIVIDE\"} 1"
        ));
        assert!(rendered.contains(
            "abacus_grpc_errors_total{method=\"/abacus.v1.Calculator/Divide\",operation=\"DIVIDE\",code=\"2\"} 1"
        ));
    }

    #[test]
    fn latency_lands_in_the_right_bucket() {
        let telemetry = Telemetry::default();
        telemetry.record_response_time(Duration::from_millis(3));
        telemetry.record_response_time(Duration::from_millis(40));
        telemetry.record_response_time(Duration::from_secs(10));

        let rendered = telemetry.render();
        assert!(rendered.contains("abacus_grpc_response_time_ms_bucket{le=\"5\"} 1"));
        assert!(rendered.contains("abacus_grpc_response_time_ms_bucket{le=\"50\"} 1"));
        assert!(rendered.contains("abacus_grpc_response_time_ms_bucket{le=\"+Inf\"} 1"));
    }

    #[test]
    fn clones_share_state() {
        let telemetry = Telemetry::default();
        let clone = telemetry.clone();
        clone.record_request("m", "ADD");
        assert!(telemetry.render().contains("operation=\"ADD\"} 1"));
    }

    #[tokio::test]
    async fn metrics_server_serves_exposition() {
        let telemetry = Telemetry::default();
        telemetry.record_request("m", "ADD");
        let addr: SocketAddr = "127.0.0.1:0".parse().expect("addr");

        let (bound, handle) = telemetry
            .clone()
            .spawn_metrics_server(addr)
            .await
            .expect("spawn metrics server");

        let mut stream = tokio::net::TcpStream::connect(bound).await.expect("connect");
        stream
            .write_all(b"GET /metrics HTTP/1.1\r\nhost: test\r\n\r\n")
            .await
            .expect("write request");
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.expect("read");
        let response = String::from_utf8_lossy(&response);
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("abacus_grpc_requests_total"));

        handle.abort();
    }
}
