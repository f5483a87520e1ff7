//! Scan verification against an expected operation.

use serde::{Deserialize, Serialize};

use crate::operation::Operation;

/// A decoded scan, as handed over by the device layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "code", rename_all = "snake_case")]
pub enum ScanResult {
    Product(String),
    Location(String),
    Lot(String),
}

impl ScanResult {
    pub fn code(&self) -> &str {
        match self {
            ScanResult::Product(c) | ScanResult::Location(c) | ScanResult::Lot(c) => c,
        }
    }
}

/// Why a scan or an entry was accepted or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyReason {
    ProductMatched,
    LocationMatched,
    LotMatched,
    /// No lot was expected; the scanned one is recorded.
    LotRecorded,
    ProductMismatch,
    LocationMismatch,
    LotMismatch,
    EmptyCode,
    /// The scanned product only belongs to operations that are already complete.
    AlreadyComplete,
    /// Manual entry refused: verification is required and nothing was scanned yet.
    ScanRequired,
    /// Manual entry accepted.
    ManualEntry,
}

/// Outcome of a verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub accepted: bool,
    pub reason: VerifyReason,
}

impl Verification {
    pub fn accept(reason: VerifyReason) -> Self {
        Self {
            accepted: true,
            reason,
        }
    }

    pub fn reject(reason: VerifyReason) -> Self {
        Self {
            accepted: false,
            reason,
        }
    }

    /// Whether this outcome counts as verification of the operation.
    pub fn verifies_operation(&self) -> bool {
        self.accepted
            && matches!(
                self.reason,
                VerifyReason::ProductMatched | VerifyReason::LocationMatched
            )
    }
}

/// Check a scan against the operation it is supposed to belong to.
pub fn verify(scan: &ScanResult, operation: &Operation) -> Verification {
    if scan.code().trim().is_empty() {
        return Verification::reject(VerifyReason::EmptyCode);
    }

    match scan {
        ScanResult::Product(code) => {
            if operation.product.matches_code(code) {
                Verification::accept(VerifyReason::ProductMatched)
            } else {
                Verification::reject(VerifyReason::ProductMismatch)
            }
        }
        ScanResult::Location(code) => {
            if operation.location.matches_code(code) {
                Verification::accept(VerifyReason::LocationMatched)
            } else {
                Verification::reject(VerifyReason::LocationMismatch)
            }
        }
        ScanResult::Lot(code) => match operation.lot.as_deref() {
            Some(expected) if expected.trim() == code.trim() => {
                Verification::accept(VerifyReason::LotMatched)
            }
            Some(_) => Verification::reject(VerifyReason::LotMismatch),
            None => Verification::accept(VerifyReason::LotRecorded),
        },
    }
}

/// Whether manual quantity entry may complete `operation`.
pub fn manual_entry_allowed(operation: &Operation, verification_required: bool) -> Verification {
    if verification_required && operation.needs_verification && !operation.scanned {
        Verification::reject(VerifyReason::ScanRequired)
    } else {
        Verification::accept(VerifyReason::ManualEntry)
    }
}
