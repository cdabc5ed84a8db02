// Copyright (c) 2026 Abacus Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use abacus_daemon::auth::{default_access_policy, AccessGuard};
use abacus_daemon::config::{DaemonConfig, TlsSettings};
use abacus_daemon::server::{CalculatorService, HealthService};
use abacus_daemon::telemetry::Telemetry;
use abacus_daemon::tls;
use abacus_daemon::token::{BearerVerifier, TokenVerifier};
use abacus_protocol::pb::calculator_server::CalculatorServer;
use abacus_protocol::pb::health_server::HealthServer;

#[derive(Debug, Parser)]
#[command(name = "abacus-daemon")]
#[command(about = "Authenticated gRPC calculation daemon")]
struct Args {
    /// gRPC listen address; overrides the config file.
    #[arg(long)]
    listen: Option<String>,

    /// Optional JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Prometheus exposition listen address; overrides the config file.
    #[arg(long)]
    metrics_listen: Option<String>,

    /// File holding the HS256 bearer-token secret; overrides the config file.
    #[arg(long)]
    token_secret_file: Option<PathBuf>,

    /// Server certificate (PEM). Must be paired with --tls-key.
    #[arg(long, requires = "tls_key")]
    tls_cert: Option<PathBuf>,

    /// Server private key (PEM).
    #[arg(long, requires = "tls_cert")]
    tls_key: Option<PathBuf>,

    /// Client CA bundle (PEM); enables required client-certificate auth.
    #[arg(long, requires = "tls_cert")]
    client_ca: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    log: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(args.log.clone()))
        .init();

    let mut config = match &args.config {
        Some(path) => DaemonConfig::load(path)?,
        None => DaemonConfig::default(),
    };
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    if args.metrics_listen.is_some() {
        config.metrics_listen = args.metrics_listen;
    }
    if args.token_secret_file.is_some() {
        config.auth.token_secret_file = args.token_secret_file;
    }
    if let (Some(cert_file), Some(key_file)) = (args.tls_cert, args.tls_key) {
        config.tls = Some(TlsSettings {
            cert_file,
            key_file,
            client_ca_file: args.client_ca,
        });
    }

    let addr: SocketAddr = config.listen.parse()?;

    let mut policy = default_access_policy();
    policy.apply_overrides(config.policy_overrides.clone());

    let verifier: Option<Arc<dyn BearerVerifier>> = match &config.auth.token_secret_file {
        Some(path) => {
            let secret = std::fs::read(path)?;
            Some(Arc::new(TokenVerifier::new(
                &secret,
                &config.auth.issuer,
                config.auth.leeway_secs,
            )))
        }
        None => None,
    };

    let mtls_enabled = config
        .tls
        .as_ref()
        .is_some_and(|tls| tls.client_ca_file.is_some());
    if verifier.is_none() && !mtls_enabled {
        tracing::warn!(
            "no token secret and no client CA configured; every credentialed path will fail"
        );
    }

    let guard = AccessGuard::new(
        Arc::new(policy),
        verifier,
        Some(Duration::from_millis(config.auth.request_timeout_ms)),
    );

    let telemetry = Telemetry::default();
    if let Some(metrics_listen) = &config.metrics_listen {
        let metrics_addr: SocketAddr = metrics_listen.parse()?;
        let (bound, _handle) = telemetry.clone().spawn_metrics_server(metrics_addr).await?;
        tracing::info!(addr = %bound, "metrics exposition started");
    }

    let service = CalculatorService::new(config.calc.to_calc_config(), telemetry);

    tracing::info!(%addr, mtls = mtls_enabled, "starting abacus gRPC server");

    let mut builder = tonic::transport::Server::builder();
    if let Some(tls_settings) = &config.tls {
        builder = builder.tls_config(tls::server_tls(tls_settings)?)?;
    }

    builder
        .add_service(CalculatorServer::with_interceptor(service, guard))
        .add_service(HealthServer::new(HealthService))
        .serve(addr)
        .await?;

    Ok(())
}
