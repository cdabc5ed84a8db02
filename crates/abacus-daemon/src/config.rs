// Copyright (c) 2026 Abacus Contributors
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use abacus_core::{CalcConfig, Role};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    pub listen: String,
    pub metrics_listen: Option<String>,
    pub tls: Option<TlsSettings>,
    pub auth: AuthSettings,
    pub calc: CalcSettings,
    /// Per-method role allow-list entries merged over the built-in table.
    pub policy_overrides: HashMap<String, Vec<Role>>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:50051".to_string(),
            metrics_listen: None,
            tls: None,
            auth: AuthSettings::default(),
            calc: CalcSettings::default(),
            policy_overrides: HashMap::new(),
        }
    }
}

impl DaemonConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let payload = fs::read(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&payload).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsSettings {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
    /// When set, clients must present a certificate signed by this CA.
    pub client_ca_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthSettings {
    pub token_secret_file: Option<PathBuf>,
    pub issuer: String,
    pub leeway_secs: u64,
    pub request_timeout_ms: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            token_secret_file: None,
            issuer: "abacus-auth".to_string(),
            leeway_secs: 60,
            request_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalcSettings {
    pub max_decimal_places: u32,
    pub check_overflow: bool,
}

impl Default for CalcSettings {
    fn default() -> Self {
        Self {
            max_decimal_places: 10,
            check_overflow: true,
        }
    }
}

impl CalcSettings {
    pub fn to_calc_config(&self) -> CalcConfig {
        CalcConfig {
            max_decimal_places: self.max_decimal_places,
            check_overflow: self.check_overflow,
        }
    }
}
