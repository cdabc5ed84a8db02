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

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
#![forbid(unsafe_code)]

use core::fmt;

pub mod pb {
    pub mod v1 {
        tonic::include_proto!("abacus.v1");
    }

    pub use v1::*;
}

pub const PROTOCOL_SEMVER: &str = "1.0.0";

/// Full gRPC method paths, shared by the access-policy table, the server,
/// and clients. These strings are part of the wire contract.
pub mod methods {
    pub const ADD: &str = "/abacus.v1.Calculator/Add";
    pub const SUBTRACT: &str = "/abacus.v1.Calculator/Subtract";
    pub const MULTIPLY: &str = "/abacus.v1.Calculator/Multiply";
    pub const DIVIDE: &str = "/abacus.v1.Calculator/Divide";
    pub const HEALTH_CHECK: &str = "/abacus.v1.Health/Check";
}

/// In-band status codes carried in `CalculationResponse.status_code`.
///
/// Success is always 0. Nonzero values classify the arithmetic outcome;
/// they are never used for authentication or transport failures, which
/// surface as RPC-level errors instead.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok = 0,
    Overflow = 1,
    DivideByZero = 2,
    InvalidInput = 3,
    Underflow = 4,
}

impl StatusCode {
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Ok),
            1 => Some(Self::Overflow),
            2 => Some(Self::DivideByZero),
            3 => Some(Self::InvalidInput),
            4 => Some(Self::Underflow),
            _ => None,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
