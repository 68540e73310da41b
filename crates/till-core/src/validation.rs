//! # Validation Module
//!
//! Field-level validators shared by sale drafts, catalog input and stock
//! adjustments.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: UI bridge (external)                                         │
//! │  └── Type validation (deserialization of enums, numbers)               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Business rules, checked before any storage access                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (current_qty >= 0)                                          │
//! │  ├── UNIQUE (sale_number), UNIQUE (sku)                                │
//! │  └── Conditional stock update                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Field names are passed in so that draft lines can report `lines[2].quantity`.

use crate::error::ValidationError;
use crate::MAX_REFERENCE_LEN;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Upper bound on a tax rate: 100%.
pub const MAX_TAX_RATE_BPS: i64 = 10_000;

const MAX_NAME_LEN: usize = 200;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a short business identifier (sale number, SKU, movement ref).
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 64 characters
///
/// ## Returns
/// The trimmed value.
///
/// ## Example
/// ```rust
/// use till_core::validation::validate_reference;
///
/// assert_eq!(validate_reference("saleNumber", " INV-001 ").unwrap(), "INV-001");
/// assert!(validate_reference("saleNumber", "   ").is_err());
/// ```
pub fn validate_reference(field: &str, value: &str) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > MAX_REFERENCE_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_REFERENCE_LEN,
        });
    }

    Ok(value.to_string())
}

/// Validates a product name: non-empty, at most 200 characters.
pub fn validate_product_name(name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(name.to_string())
}

/// Trims optional free text; blank becomes `None`.
pub fn normalize_optional_text(
    field: &str,
    value: Option<&str>,
    max: usize,
) -> ValidationResult<Option<String>> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(Some(value.to_string()))
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Quantity must be strictly positive.
pub fn validate_quantity(field: &str, qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Prices, discounts, opening quantities: zero or more.
pub fn validate_non_negative(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a tax rate in basis points and narrows it.
///
/// ## Rules
/// - Must not be negative
/// - At most 10000 (100%)
pub fn validate_tax_rate_bps(field: &str, bps: i64) -> ValidationResult<u32> {
    validate_non_negative(field, bps)?;

    if bps > MAX_TAX_RATE_BPS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_TAX_RATE_BPS,
        });
    }

    Ok(bps as u32)
}
