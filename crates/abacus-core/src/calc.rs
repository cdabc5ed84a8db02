// Copyright (c) 2026 Abacus Contributors
// SPDX-License-Identifier: Apache-2.0

use core::fmt;
use std::time::{Duration, Instant};

/// The four supported binary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    /// Response tag carried back to the caller.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "Add",
            Self::Subtract => "Subtract",
            Self::Multiply => "Multiply",
            Self::Divide => "Divide",
        }
    }

    /// Uppercase label used for metrics series.
    pub const fn metric_label(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Subtract => "SUBTRACT",
            Self::Multiply => "MULTIPLY",
            Self::Divide => "DIVIDE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a calculation. `Ok` is a first-class outcome: the
/// engine never panics or returns a bare error, it always produces a
/// [`CalculationResult`] carrying one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    InvalidInput,
    DivideByZero,
    Overflow,
    Underflow,
}

impl Outcome {
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Human-readable message for non-success outcomes; empty for `Ok`.
    pub const fn message(self) -> &'static str {
        match self {
            Self::Ok => "",
            Self::InvalidInput => "invalid input",
            Self::DivideByZero => "division by zero",
            Self::Overflow => "numeric overflow",
            Self::Underflow => "numeric underflow",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            f.write_str("ok")
        } else {
            f.write_str(self.message())
        }
    }
}

/// Result of one engine invocation. Immutable once constructed; every
/// evaluation path carries the elapsed wall-clock time from engine entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalculationResult {
    pub value: f64,
    pub operation: Operation,
    pub elapsed: Duration,
    pub outcome: Outcome,
}

/// Numeric evaluation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalcConfig {
    /// Results are rounded to this many decimal places.
    pub max_decimal_places: u32,
    /// When set, operand-relative range pre-checks run before computing and
    /// a non-finite raw result is classified instead of returned.
    pub check_overflow: bool,
}

impl Default for CalcConfig {
    fn default() -> Self {
        Self {
            max_decimal_places: 10,
            check_overflow: true,
        }
    }
}

/// Stateless arithmetic engine.
///
/// Evaluation order for every operation: operand finiteness, divisor zero
/// check (divide only), operand-relative overflow pre-checks, raw compute,
/// post-compute finiteness check, rounding. Rounding policy: multiply by
/// `10^places`, round half away from zero to the nearest integer, divide
/// back.
#[derive(Debug, Clone, Copy, Default)]
pub struct Calculator {
    config: CalcConfig,
}

impl Calculator {
    pub fn new(config: CalcConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> CalcConfig {
        self.config
    }

    pub fn add(&self, a: f64, b: f64) -> CalculationResult {
        self.evaluate(Operation::Add, a, b)
    }

    pub fn subtract(&self, a: f64, b: f64) -> CalculationResult {
        self.evaluate(Operation::Subtract, a, b)
    }

    pub fn multiply(&self, a: f64, b: f64) -> CalculationResult {
        self.evaluate(Operation::Multiply, a, b)
    }

    pub fn divide(&self, a: f64, b: f64) -> CalculationResult {
        self.evaluate(Operation::Divide, a, b)
    }

    pub fn evaluate(&self, operation: Operation, a: f64, b: f64) -> CalculationResult {
        let start = Instant::now();

        if !a.is_finite() || !b.is_finite() {
            return Self::failed(operation, Outcome::InvalidInput, start);
        }

        if operation == Operation::Divide && b == 0.0 {
            return Self::failed(operation, Outcome::DivideByZero, start);
        }

        if self.config.check_overflow {
            if let Some(outcome) = range_pre_check(operation, a, b) {
                return Self::failed(operation, outcome, start);
            }
        }

        let raw = match operation {
            Operation::Add => a + b,
            Operation::Subtract => a - b,
            Operation::Multiply => a * b,
            Operation::Divide => a / b,
        };

        if self.config.check_overflow && !raw.is_finite() {
            let outcome = if raw > 0.0 {
                Outcome::Overflow
            } else {
                Outcome::Underflow
            };
            return Self::failed(operation, outcome, start);
        }

        CalculationResult {
            value: round_to_places(raw, self.config.max_decimal_places),
            operation,
            elapsed: start.elapsed(),
            outcome: Outcome::Ok,
        }
    }

    fn failed(operation: Operation, outcome: Outcome, start: Instant) -> CalculationResult {
        CalculationResult {
            value: 0.0,
            operation,
            elapsed: start.elapsed(),
            outcome,
        }
    }
}

/// Detect whether the operation itself would leave the representable range,
/// from the operands alone, before computing.
fn range_pre_check(operation: Operation, a: f64, b: f64) -> Option<Outcome> {
    match operation {
        Operation::Add => {
            if a > 0.0 && b > f64::MAX - a {
                Some(Outcome::Overflow)
            } else if a < 0.0 && b < -f64::MAX - a {
                Some(Outcome::Underflow)
            } else {
                None
            }
        }
        Operation::Subtract => {
            if a > 0.0 && b < a - f64::MAX {
                Some(Outcome::Overflow)
            } else if a < 0.0 && b > a + f64::MAX {
                Some(Outcome::Underflow)
            } else {
                None
            }
        }
        Operation::Multiply => {
            let (abs_a, abs_b) = (a.abs(), b.abs());
            if abs_a > 1.0 && abs_b > f64::MAX / abs_a {
                Some(signed_range_outcome(a, b))
            } else {
                None
            }
        }
        Operation::Divide => {
            // Divisor is known nonzero here; only a sub-unit divisor can
            // push a finite dividend out of range.
            if b.abs() < 1.0 && a.abs() > f64::MAX * b.abs() {
                Some(signed_range_outcome(a, b))
            } else {
                None
            }
        }
    }
}

fn signed_range_outcome(a: f64, b: f64) -> Outcome {
    if (a > 0.0) == (b > 0.0) {
        Outcome::Overflow
    } else {
        Outcome::Underflow
    }
}

fn round_to_places(value: f64, places: u32) -> f64 {
    let multiplier = 10f64.powi(places as i32);
    (value * multiplier).round() / multiplier
}
