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

//! Pure domain logic for the abacus calculation service.
//!
//! Everything here is free of I/O and transport concerns: the arithmetic
//! engine is a stateless transform of operands and configuration into a
//! structured result, and the access policy is an immutable lookup table.
//! Both are safe to share across any number of concurrent requests.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod calc;
pub mod policy;

pub use calc::{CalcConfig, CalculationResult, Calculator, Operation, Outcome};
pub use policy::{AccessPolicy, Role};
