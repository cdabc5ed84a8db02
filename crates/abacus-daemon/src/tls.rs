// Copyright (c) 2026 Abacus Contributors
// SPDX-License-Identifier: Apache-2.0

//! TLS material loading. Handshake mechanics belong to the transport
//! library; this module only reads PEM files into tonic's config types.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tonic::transport::{Certificate, ClientTlsConfig, Identity, ServerTlsConfig};

use crate::config::TlsSettings;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Build the server-side TLS configuration. With a client CA configured the
/// server requires and verifies a client certificate (mutual TLS); without
/// one it serves ordinary server-auth TLS.
pub fn server_tls(settings: &TlsSettings) -> Result<ServerTlsConfig, TlsError> {
    let cert = read(&settings.cert_file)?;
    let key = read(&settings.key_file)?;
    let mut config = ServerTlsConfig::new().identity(Identity::from_pem(cert, key));
    if let Some(ca_path) = &settings.client_ca_file {
        let ca = read(ca_path)?;
        config = config.client_ca_root(Certificate::from_pem(ca));
    }
    Ok(config)
}

/// Build a client-side TLS configuration trusting `ca_file`, optionally
/// presenting a client identity for mutual TLS.
pub fn client_tls(
    domain: &str,
    ca_file: &Path,
    identity: Option<(&Path, &Path)>,
) -> Result<ClientTlsConfig, TlsError> {
    let ca = read(ca_file)?;
    let mut config = ClientTlsConfig::new()
        .domain_name(domain)
        .ca_certificate(Certificate::from_pem(ca));
    if let Some((cert_path, key_path)) = identity {
        config = config.identity(Identity::from_pem(read(cert_path)?, read(key_path)?));
    }
    Ok(config)
}

fn read(path: &Path) -> Result<Vec<u8>, TlsError> {
    fs::read(path).map_err(|source| TlsError::Read {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(content).expect("write pem");
        file
    }

    #[test]
    fn server_tls_loads_identity_and_optional_ca() {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
            .expect("generate cert");
        let cert_pem = write_temp(cert.serialize_pem().expect("cert pem").as_bytes());
        let key_pem = write_temp(cert.serialize_private_key_pem().as_bytes());

        let settings = TlsSettings {
            cert_file: cert_pem.path().to_path_buf(),
            key_file: key_pem.path().to_path_buf(),
            client_ca_file: None,
        };
        assert!(server_tls(&settings).is_ok());

        let settings = TlsSettings {
            cert_file: cert_pem.path().to_path_buf(),
            key_file: key_pem.path().to_path_buf(),
            client_ca_file: Some(cert_pem.path().to_path_buf()),
        };
        assert!(server_tls(&settings).is_ok());
    }

    #[test]
    fn missing_file_is_reported_with_path() {
        let settings = TlsSettings {
            cert_file: PathBuf::from("/nonexistent/server.pem"),
            key_file: PathBuf::from("/nonexistent/server.key"),
            client_ca_file: None,
        };
        match server_tls(&settings) {
            Err(TlsError::Read { path, .. }) => {
                assert_eq!(path, PathBuf::from("/nonexistent/server.pem"));
            }
            Ok(_) => panic!("expected a read error"),
        }
    }
}
