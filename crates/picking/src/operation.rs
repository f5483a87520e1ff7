use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use pickflow_core::{DomainError, DomainResult, MoveLineId, PickingId, ProductId};

use crate::location::Location;
use crate::zone::ZoneId;

/// Quantities are in the product's unit of measure; fractional units exist.
const QTY_EPSILON: f64 = 1e-6;

/// Product as needed for picking and scan verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub barcode: Option<String>,
    /// Internal reference (SKU).
    pub default_code: Option<String>,
}

impl Product {
    pub fn new(id: ProductId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            barcode: None,
            default_code: None,
        }
    }

    pub fn with_barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = Some(barcode.into());
        self
    }

    pub fn with_default_code(mut self, code: impl Into<String>) -> Self {
        self.default_code = Some(code.into());
        self
    }

    /// Whether a scanned code designates this product (barcode or product code).
    pub fn matches_code(&self, code: &str) -> bool {
        let code = code.trim();
        if code.is_empty() {
            return false;
        }
        self.barcode.as_deref().is_some_and(|b| b.trim() == code)
            || self
                .default_code
                .as_deref()
                .is_some_and(|c| c.trim().eq_ignore_ascii_case(code))
    }
}

/// A move line as read from the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveLine {
    pub id: MoveLineId,
    pub picking_id: Option<PickingId>,
    pub product: Product,
    pub location: Location,
    pub location_dest: Option<Location>,
    pub lot: Option<String>,
    pub expiry: Option<NaiveDate>,
    pub package: Option<String>,
    pub quantity: f64,
    pub quantity_done: f64,
}

/// The atomic unit of work: move `quantity` of `product` out of `location`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: MoveLineId,
    pub picking_id: Option<PickingId>,
    pub product: Product,
    pub location: Location,
    pub zone: Option<ZoneId>,
    pub quantity: f64,
    pub quantity_done: f64,
    pub lot: Option<String>,
    pub expiry: Option<NaiveDate>,
    pub package: Option<String>,
    pub is_completed: bool,
    pub needs_verification: bool,
    /// A product or location scan was accepted for this operation in the current session.
    pub scanned: bool,
}

impl Operation {
    /// Build an operation from its move line.
    ///
    /// The zone is resolved once here from the source location name.
    pub fn from_move_line(line: MoveLine, needs_verification: bool) -> DomainResult<Self> {
        if !line.quantity.is_finite() || line.quantity < 0.0 {
            return Err(DomainError::validation(format!(
                "move line {}: invalid quantity {}",
                line.id, line.quantity
            )));
        }
        if !line.quantity_done.is_finite() || line.quantity_done < 0.0 {
            return Err(DomainError::validation(format!(
                "move line {}: invalid done quantity {}",
                line.id, line.quantity_done
            )));
        }

        let zone = line.location.zone();
        let mut op = Self {
            id: line.id,
            picking_id: line.picking_id,
            product: line.product,
            location: line.location,
            zone,
            quantity: line.quantity,
            quantity_done: line.quantity_done,
            lot: line.lot,
            expiry: line.expiry,
            package: line.package,
            is_completed: false,
            needs_verification,
            scanned: false,
        };
        op.is_completed = op.reaches_required(op.quantity_done);
        Ok(op)
    }

    /// Whether `quantity` satisfies the required quantity.
    pub fn reaches_required(&self, quantity: f64) -> bool {
        quantity + QTY_EPSILON >= self.quantity
    }

    /// Whether `quantity` would exceed the required quantity (over-pick).
    pub fn exceeds_required(&self, quantity: f64) -> bool {
        quantity > self.quantity + QTY_EPSILON
    }

    pub fn remaining(&self) -> f64 {
        (self.quantity - self.quantity_done).max(0.0)
    }

    pub fn is_pending(&self) -> bool {
        !self.is_completed
    }
}

/// Whether two quantities are the same for picking purposes.
pub fn same_quantity(a: f64, b: f64) -> bool {
    (a - b).abs() <= QTY_EPSILON
}

/// Percentage of completed operations, rounded to the nearest integer.
///
/// Always recomputed from the full operation set; 0 for an empty set.
pub fn completion_percentage(operations: &[Operation]) -> u8 {
    if operations.is_empty() {
        return 0;
    }
    let done = operations.iter().filter(|op| op.is_completed).count();
    ((100.0 * done as f64) / operations.len() as f64).round() as u8
}

/// Whether every operation of the set is completed (false for an empty set).
pub fn all_completed(operations: &[Operation]) -> bool {
    !operations.is_empty() && operations.iter().all(|op| op.is_completed)
}
