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

//! Per-request authentication and authorization.
//!
//! Every calculator RPC passes through [`AccessGuard`] before its handler
//! runs. The guard resolves a caller role from an ordered list of credential
//! strategies (verified client certificate first, bearer token second) and
//! checks it against an immutable per-method allow-list. Authentication and
//! authorization failures surface as RPC-level errors; the handler is never
//! invoked for a denied call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tonic::metadata::MetadataMap;
use tonic::service::Interceptor;
use tonic::{GrpcMethod, Request, Status};
use x509_parser::prelude::{FromDer, X509Certificate};

use abacus_core::{AccessPolicy, Role};
use abacus_protocol::methods;

use crate::token::BearerVerifier;

const AUTHORIZATION_METADATA_KEY: &str = "authorization";
const NO_PERMISSION: &str = "no permission to access this RPC";

/// Which strategy produced the resolved role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    ClientCertificate,
    BearerToken,
}

impl CredentialSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClientCertificate => "certificate",
            Self::BearerToken => "token",
        }
    }
}

impl core::fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call credential resolution result, injected into request extensions
/// for handlers that want to know who is calling. Lives for one call only.
#[derive(Debug, Clone)]
pub struct CredentialClaim {
    pub role: Role,
    pub source: CredentialSource,
    pub identity: String,
}

/// Call deadline established by the interceptor; the dispatcher consults it
/// before invoking the engine.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Instant,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self {
            expires_at: Instant::now() + timeout,
        }
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

enum Resolution {
    Resolved(CredentialClaim),
    NotApplicable,
    Failed(Status),
}

/// The built-in per-method allow-list. Methods without an entry (such as
/// the health check) are publicly accessible.
pub fn default_access_policy() -> AccessPolicy {
    AccessPolicy::new([
        (methods::ADD, vec![Role::Admin, Role::User, Role::Guest]),
        (methods::SUBTRACT, vec![Role::Admin, Role::User, Role::Guest]),
        (methods::MULTIPLY, vec![Role::Admin, Role::User]),
        (methods::DIVIDE, vec![Role::Admin]),
    ])
}

/// Request interceptor enforcing credential resolution and RBAC.
#[derive(Clone)]
pub struct AccessGuard {
    policy: Arc<AccessPolicy>,
    verifier: Option<Arc<dyn BearerVerifier>>,
    default_timeout: Option<Duration>,
}

impl AccessGuard {
    pub fn new(
        policy: Arc<AccessPolicy>,
        verifier: Option<Arc<dyn BearerVerifier>>,
        default_timeout: Option<Duration>,
    ) -> Self {
        Self {
            policy,
            verifier,
            default_timeout,
        }
    }

    /// Full admission decision for one call. Returns the resolved claim on
    /// success; the caller injects it into the request.
    pub fn authorize<C: AsRef<[u8]>>(
        &self,
        method: &str,
        chain: Option<&[C]>,
        metadata: &MetadataMap,
    ) -> Result<CredentialClaim, Status> {
        // Anonymous probes of methods the lowest trust tier cannot reach are
        // denied uniformly before any credential material is touched.
        if !self.policy.is_accessible(method, Role::Guest)
            && !has_credential_material(chain, metadata)
        {
            tracing::debug!(path = %method, "denied anonymous caller in pre-check");
            return Err(Status::permission_denied(NO_PERMISSION));
        }

        let claim = self.resolve(chain, metadata)?;

        if !self.policy.is_accessible(method, claim.role) {
            tracing::debug!(path = %method, role = %claim.role, "resolved role lacks access");
            return Err(Status::permission_denied(NO_PERMISSION));
        }

        tracing::debug!(
            path = %method,
            role = %claim.role,
            source = %claim.source,
            "accepted rpc request"
        );
        Ok(claim)
    }

    /// Run the credential strategies in order, stopping at the first
    /// resolved claim. A strategy failure is terminal; a strategy that does
    /// not apply falls through to the next one.
    pub fn resolve<C: AsRef<[u8]>>(
        &self,
        chain: Option<&[C]>,
        metadata: &MetadataMap,
    ) -> Result<CredentialClaim, Status> {
        match resolve_certificate(chain) {
            Resolution::Resolved(claim) => return Ok(claim),
            Resolution::Failed(status) => return Err(status),
            Resolution::NotApplicable => {}
        }

        match self.resolve_token(metadata) {
            Resolution::Resolved(claim) => Ok(claim),
            Resolution::Failed(status) => Err(status),
            Resolution::NotApplicable => Err(Status::unauthenticated(
                "authorization token is not provided",
            )),
        }
    }

    fn resolve_token(&self, metadata: &MetadataMap) -> Resolution {
        let Some(value) = metadata.get(AUTHORIZATION_METADATA_KEY) else {
            return Resolution::NotApplicable;
        };
        let Ok(value) = value.to_str() else {
            return Resolution::Failed(Status::unauthenticated("invalid authorization header"));
        };
        let token = value.strip_prefix("Bearer ").unwrap_or(value);
        let Some(verifier) = &self.verifier else {
            return Resolution::Failed(Status::unauthenticated(
                "bearer tokens are not accepted by this server",
            ));
        };
        match verifier.verify(token) {
            Ok(verified) => Resolution::Resolved(CredentialClaim {
                role: verified.role,
                source: CredentialSource::BearerToken,
                identity: verified.claims.sub,
            }),
            Err(err) => Resolution::Failed(Status::unauthenticated(format!(
                "access token is invalid: {err}"
            ))),
        }
    }
}

impl Interceptor for AccessGuard {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let method = request
            .extensions()
            .get::<GrpcMethod>()
            .map(|m| format!("/{}/{}", m.service(), m.method()))
            .unwrap_or_else(|| "unknown".to_string());

        let peer_certs = request.peer_certs();
        let chain = peer_certs.as_deref().map(Vec::as_slice);

        let claim = self.authorize(&method, chain, request.metadata())?;

        let timeout = parse_grpc_timeout(request.metadata()).or(self.default_timeout);
        if let Some(timeout) = timeout {
            request.set_timeout(timeout);
            request.extensions_mut().insert(Deadline::after(timeout));
        }
        request.extensions_mut().insert(claim);
        Ok(request)
    }
}

fn has_credential_material<C: AsRef<[u8]>>(chain: Option<&[C]>, metadata: &MetadataMap) -> bool {
    chain.is_some_and(|certs| !certs.is_empty())
        || metadata.contains_key(AUTHORIZATION_METADATA_KEY)
}

/// Certificate strategy: applies only when the transport attached a verified
/// client chain. The TLS layer has already verified the chain against the
/// configured client CA; this only maps the leaf's subject to a role.
fn resolve_certificate<C: AsRef<[u8]>>(chain: Option<&[C]>) -> Resolution {
    let Some(leaf) = chain.and_then(|certs| certs.first()) else {
        return Resolution::NotApplicable;
    };
    match map_certificate_role(leaf.as_ref()) {
        Ok((role, subject)) => Resolution::Resolved(CredentialClaim {
            role,
            source: CredentialSource::ClientCertificate,
            identity: subject,
        }),
        Err(status) => Resolution::Failed(status),
    }
}

/// Map a verified leaf certificate (DER) to a role via its subject
/// organizational-unit attributes.
pub fn map_certificate_role(leaf_der: &[u8]) -> Result<(Role, String), Status> {
    let (_, cert) = X509Certificate::from_der(leaf_der)
        .map_err(|_| Status::unauthenticated("client certificate could not be parsed"))?;
    let role = role_from_units(
        cert.subject()
            .iter_organizational_unit()
            .filter_map(|attr| attr.as_str().ok()),
    );
    Ok((role, cert.subject().to_string()))
}

/// OU-to-role mapping. Precedence is fixed (Admin outranks Guest) so a
/// certificate carrying both units maps the same way regardless of field
/// order. Certificates with no recognized unit map to the baseline User
/// role; this never yields the Denied sentinel.
pub fn role_from_units<'a, I>(units: I) -> Role
where
    I: IntoIterator<Item = &'a str>,
{
    let mut admin = false;
    let mut guest = false;
    for unit in units {
        match unit {
            "Admin" => admin = true,
            "Guest" => guest = true,
            _ => {}
        }
    }
    if admin {
        Role::Admin
    } else if guest {
        Role::Guest
    } else {
        Role::User
    }
}

/// Parse the standard `grpc-timeout` request header (e.g. `5S`, `100m`).
fn parse_grpc_timeout(metadata: &MetadataMap) -> Option<Duration> {
    let value = metadata.get("grpc-timeout")?.to_str().ok()?;
    if value.len() < 2 {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    let amount: u64 = digits.parse().ok()?;
    match unit {
        "H" => Some(Duration::from_secs(amount.saturating_mul(3600))),
        "M" => Some(Duration::from_secs(amount.saturating_mul(60))),
        "S" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_millis(amount)),
        "u" => Some(Duration::from_micros(amount)),
        "n" => Some(Duration::from_nanos(amount)),
        _ => None,
    }
}
