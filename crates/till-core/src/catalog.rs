//! # Catalog Input
//!
//! Inputs that change a product's stock outside of a sale: creating a product
//! with opening stock, and manual stock adjustments.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::MovementReason;
use crate::validation::{
    normalize_optional_text, validate_non_negative, validate_product_name, validate_reference,
    validate_tax_rate_bps, ValidationResult,
};
use crate::MAX_REFERENCE_LEN;

/// A product to be added to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub unit_price_cents: i64,
    #[serde(default)]
    pub tax_rate_bps: i64,
    /// Recorded as a manual adjustment when positive.
    #[serde(default)]
    pub opening_qty: i64,
    #[serde(default)]
    pub reorder_level: i64,
}

impl NewProduct {
    /// Returns the product with text fields trimmed.
    pub fn validate(self) -> ValidationResult<NewProduct> {
        let sku = validate_reference("sku", &self.sku)?;
        let name = validate_product_name(&self.name)?;
        validate_non_negative("unitPriceCents", self.unit_price_cents)?;
        validate_tax_rate_bps("taxRateBps", self.tax_rate_bps)?;
        validate_non_negative("openingQty", self.opening_qty)?;
        validate_non_negative("reorderLevel", self.reorder_level)?;

        Ok(NewProduct { sku, name, ..self })
    }
}

/// A manual change to a product's quantity, e.g. a stock count correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentInput {
    pub product_id: String,
    /// Signed; negative removes stock.
    pub delta: i64,
    pub reason: MovementReason,
    #[serde(default, rename = "ref")]
    pub reference: Option<String>,
}

impl AdjustmentInput {
    /// Sale, refund and void movements belong to the sale engine, so only
    /// [`MovementReason::ManualAdjustment`] is accepted here.
    pub fn validate(self) -> ValidationResult<AdjustmentInput> {
        let product_id = validate_reference("productId", &self.product_id)?;

        if self.delta == 0 {
            return Err(ValidationError::InvalidFormat {
                field: "delta".to_string(),
                reason: "must not be zero".to_string(),
            });
        }

        if self.delta == i64::MIN {
            return Err(ValidationError::OutOfRange {
                field: "delta".to_string(),
                min: -i64::MAX,
                max: i64::MAX,
            });
        }

        if self.reason != MovementReason::ManualAdjustment {
            return Err(ValidationError::NotAllowed {
                field: "reason".to_string(),
                allowed: vec![MovementReason::ManualAdjustment.as_str().to_string()],
            });
        }

        let reference = normalize_optional_text("ref", self.reference.as_deref(), MAX_REFERENCE_LEN)?;

        Ok(AdjustmentInput {
            product_id,
            reference,
            ..self
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_product() -> NewProduct {
        NewProduct {
            sku: " COF-250 ".to_string(),
            name: "Coffee 250g".to_string(),
            unit_price_cents: 899,
            tax_rate_bps: 500,
            opening_qty: 12,
            reorder_level: 3,
        }
    }

    #[test]
    fn test_new_product_trims() {
        let product = new_product().validate().unwrap();
        assert_eq!(product.sku, "COF-250");
    }

    #[test]
    fn test_new_product_rejects_negatives() {
        let mut p = new_product();
        p.opening_qty = -1;
        assert_eq!(p.validate().unwrap_err().field(), "openingQty");

        let mut p = new_product();
        p.unit_price_cents = -1;
        assert_eq!(p.validate().unwrap_err().field(), "unitPriceCents");
    }

    #[test]
    fn test_adjustment_rules() {
        let adjustment = AdjustmentInput {
            product_id: "p-1".to_string(),
            delta: -3,
            reason: MovementReason::ManualAdjustment,
            reference: Some("  ".to_string()),
        };
        assert_eq!(adjustment.clone().validate().unwrap().reference, None);

        let zero = AdjustmentInput {
            delta: 0,
            ..adjustment.clone()
        };
        assert_eq!(zero.validate().unwrap_err().field(), "delta");

        let unbounded = AdjustmentInput {
            delta: i64::MIN,
            ..adjustment.clone()
        };
        assert!(matches!(
            unbounded.validate(),
            Err(ValidationError::OutOfRange { .. })
        ));

        let refund = AdjustmentInput {
            reason: MovementReason::Refund,
            ..adjustment
        };
        assert!(matches!(
            refund.validate(),
            Err(ValidationError::NotAllowed { .. })
        ));
    }
}
