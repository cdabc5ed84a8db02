// Copyright (c) 2026 Abacus Contributors
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::json;
use tonic::metadata::MetadataValue;
use tonic::transport::{Channel, Endpoint};
use tonic::Request;

use abacus_core::Role;
use abacus_daemon::tls;
use abacus_daemon::token::TokenIssuer;
use abacus_protocol::pb;
use abacus_protocol::pb::calculator_client::CalculatorClient;
use abacus_protocol::pb::health_client::HealthClient;

#[derive(Parser)]
#[command(name = "abacusctl")]
#[command(about = "Client for the abacus calculation daemon")]
struct Cli {
    #[arg(long, default_value = "http://127.0.0.1:50051")]
    addr: String,

    /// Bearer token attached to calculator calls.
    #[arg(long)]
    token: Option<String>,

    /// CA bundle for TLS connections; required for https addresses.
    #[arg(long)]
    ca_cert: Option<PathBuf>,

    /// Client certificate for mutual TLS.
    #[arg(long, requires = "client_key")]
    client_cert: Option<PathBuf>,

    /// Client private key for mutual TLS.
    #[arg(long, requires = "client_cert")]
    client_key: Option<PathBuf>,

    /// TLS server name, when it differs from the address host.
    #[arg(long, default_value = "localhost")]
    domain: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    Add { a: f64, b: f64 },
    Subtract { a: f64, b: f64 },
    Multiply { a: f64, b: f64 },
    Divide { a: f64, b: f64 },
    Health,
    /// Mint a development bearer token (offline; never contacts the daemon).
    MintToken {
        #[arg(long)]
        secret_file: PathBuf,
        #[arg(long)]
        subject: String,
        #[arg(long, default_value = "USER")]
        role: String,
        #[arg(long, default_value = "abacus-auth")]
        issuer: String,
        #[arg(long, default_value_t = 3600)]
        ttl_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Command::MintToken {
        secret_file,
        subject,
        role,
        issuer,
        ttl_secs,
    } = &cli.cmd
    {
        let secret = std::fs::read(secret_file)?;
        let role = Role::from_claim(role)
            .ok_or_else(|| format!("`{role}` is not a grantable role (ADMIN, USER, GUEST)"))?;
        let token = TokenIssuer::new(&secret, issuer.clone(), Duration::from_secs(*ttl_secs))
            .mint(subject, role)?;
        println!("{token}");
        return Ok(());
    }

    let channel = connect(&cli).await?;

    match cli.cmd {
        Command::Add { a, b } => {
            calculate(channel, cli.token.as_deref(), Operation::Add, a, b).await?;
        }
        Command::Subtract { a, b } => {
            calculate(channel, cli.token.as_deref(), Operation::Subtract, a, b).await?;
        }
        Command::Multiply { a, b } => {
            calculate(channel, cli.token.as_deref(), Operation::Multiply, a, b).await?;
        }
        Command::Divide { a, b } => {
            calculate(channel, cli.token.as_deref(), Operation::Divide, a, b).await?;
        }
        Command::Health => {
            let response = HealthClient::new(channel)
                .check(Request::new(pb::HealthCheckRequest {
                    service: String::new(),
                }))
                .await?
                .into_inner();
            let status = pb::health_check_response::ServingStatus::try_from(response.status)
                .map(|status| format!("{status:?}"))
                .unwrap_or_else(|_| response.status.to_string());
            println!("{}", json!({ "status": status }));
        }
        Command::MintToken { .. } => {}
    }

    Ok(())
}

enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

async fn calculate(
    channel: Channel,
    token: Option<&str>,
    operation: Operation,
    a: f64,
    b: f64,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = CalculatorClient::new(channel);
    let request = with_token(pb::CalculationRequest { a, b }, token)?;
    let response = match operation {
        Operation::Add => client.add(request).await,
        Operation::Subtract => client.subtract(request).await,
        Operation::Multiply => client.multiply(request).await,
        Operation::Divide => client.divide(request).await,
    }?
    .into_inner();

    println!(
        "{}",
        json!({
            "operation": response.operation,
            "result": response.result,
            "status_code": response.status_code,
            "error_message": response.error_message,
            "duration_ns": response.duration_ns,
        })
    );
    Ok(())
}

fn with_token<T>(
    message: T,
    token: Option<&str>,
) -> Result<Request<T>, Box<dyn std::error::Error>> {
    let mut request = Request::new(message);
    if let Some(token) = token {
        let value: MetadataValue<_> = format!("Bearer {token}").parse()?;
        request.metadata_mut().insert("authorization", value);
    }
    Ok(request)
}

async fn connect(cli: &Cli) -> Result<Channel, Box<dyn std::error::Error>> {
    let mut endpoint = Endpoint::from_shared(cli.addr.clone())?;
    if let Some(ca_cert) = &cli.ca_cert {
        let identity = match (&cli.client_cert, &cli.client_key) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        };
        endpoint = endpoint.tls_config(tls::client_tls(&cli.domain, ca_cert, identity)?)?;
    }
    Ok(endpoint.connect().await?)
}
