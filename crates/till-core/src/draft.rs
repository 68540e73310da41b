//! # Sale Drafts
//!
//! A [`SaleDraft`] is what a caller submits; a [`ValidatedDraft`] is what the
//! sale store is allowed to persist.
//!
//! ## Draft Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   SaleDraft ──validate()──► ValidatedDraft ──into_sale()──► Sale        │
//! │   (caller input)            (priced lines,      (ids, timestamp,        │
//! │                              totals fixed)       name/SKU snapshot)     │
//! │                                                                         │
//! │   Each arrow consumes its input. Nothing is filled in field by field,   │
//! │   so a retried create always starts from the same validated value.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Validation never touches storage. Stock sufficiency and product existence
//! are checked later, inside the create transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::{line_amounts, LineAmounts, Money, SaleTotals};
use crate::types::{PaymentMethod, Product, Sale, SaleLine, SaleStatus, TaxRate};
use crate::validation::{
    normalize_optional_text, validate_non_negative, validate_quantity, validate_reference,
    validate_tax_rate_bps, ValidationResult,
};

const MAX_CUSTOMER_NAME_LEN: usize = 200;
const MAX_NOTE_LEN: usize = 1000;

// =============================================================================
// Draft Input
// =============================================================================

/// One requested line of a sale, with its pricing snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DraftLine {
    pub product_id: String,
    /// Display name snapshot; read from the product row when absent.
    #[serde(default)]
    pub product_name: Option<String>,
    /// SKU snapshot; read from the product row when absent.
    #[serde(default)]
    pub sku: Option<String>,
    pub quantity: i64,
    pub unit_price_cents: i64,
    #[serde(default)]
    pub discount_cents: i64,
    pub tax_rate_bps: i64,
}

impl DraftLine {
    /// Builds a line priced from the catalog product as it is right now.
    pub fn from_product(product: &Product, quantity: i64, discount_cents: i64) -> Self {
        DraftLine {
            product_id: product.id.clone(),
            product_name: Some(product.name.clone()),
            sku: Some(product.sku.clone()),
            quantity,
            unit_price_cents: product.unit_price_cents,
            discount_cents,
            tax_rate_bps: product.tax_rate_bps as i64,
        }
    }
}

/// Caller-supplied, unpersisted sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SaleDraft {
    pub sale_number: String,
    /// Defaults to the commit time. Set it to backdate imported sales.
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub lines: Vec<DraftLine>,
}

// =============================================================================
// Validated Output
// =============================================================================

/// A draft line that passed validation, with its amounts computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    product_id: String,
    product_name: Option<String>,
    sku: Option<String>,
    quantity: i64,
    unit_price: Money,
    tax_rate: TaxRate,
    amounts: LineAmounts,
}

impl PricedLine {
    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn amounts(&self) -> LineAmounts {
        self.amounts
    }

    /// Freezes the line, taking the name and SKU snapshot from `product`
    /// wherever the draft left them out.
    pub fn to_sale_line(&self, product: &Product) -> SaleLine {
        SaleLine {
            product_id: self.product_id.clone(),
            product_name: self
                .product_name
                .clone()
                .unwrap_or_else(|| product.name.clone()),
            sku: self.sku.clone().unwrap_or_else(|| product.sku.clone()),
            quantity: self.quantity,
            unit_price_cents: self.unit_price.cents(),
            tax_rate_bps: self.tax_rate.bps(),
            line_subtotal_cents: self.amounts.subtotal.cents(),
            line_discount_cents: self.amounts.discount.cents(),
            line_tax_cents: self.amounts.tax.cents(),
            line_total_cents: self.amounts.total.cents(),
        }
    }
}

/// A draft that is safe to persist. Only [`SaleDraft::validate`] builds one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedDraft {
    sale_number: String,
    timestamp: Option<DateTime<Utc>>,
    customer_name: Option<String>,
    note: Option<String>,
    payment_method: PaymentMethod,
    lines: Vec<PricedLine>,
    totals: SaleTotals,
}

impl ValidatedDraft {
    pub fn sale_number(&self) -> &str {
        &self.sale_number
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    pub fn customer_name(&self) -> Option<&str> {
        self.customer_name.as_deref()
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn lines(&self) -> &[PricedLine] {
        &self.lines
    }

    pub fn totals(&self) -> SaleTotals {
        self.totals
    }

    /// Produces the committed aggregate.
    ///
    /// `lines` are the frozen lines in draft order; a new sale is always
    /// [`SaleStatus::Completed`].
    pub fn into_sale(self, id: String, timestamp: DateTime<Utc>, lines: Vec<SaleLine>) -> Sale {
        Sale {
            id,
            sale_number: self.sale_number,
            timestamp,
            customer_name: self.customer_name,
            note: self.note,
            payment_method: self.payment_method,
            status: SaleStatus::Completed,
            subtotal_cents: self.totals.subtotal_cents,
            discount_cents: self.totals.discount_cents,
            tax_cents: self.totals.tax_cents,
            total_cents: self.totals.total_cents,
            lines,
        }
    }
}

// =============================================================================
// Validation
// =============================================================================

impl SaleDraft {
    /// Checks every draft rule and prices the lines.
    ///
    /// ## Rules
    /// - `saleNumber` non-empty, at most 64 characters
    /// - `paymentMethod` present
    /// - at least one line
    /// - per line: product id present, quantity > 0, price/discount/tax
    ///   not negative, tax at most 100%, discount at most the line subtotal
    /// - every line amount and every sale total fits in i64 cents
    ///
    /// The first failing rule is reported.
    pub fn validate(self) -> ValidationResult<ValidatedDraft> {
        let sale_number = validate_reference("saleNumber", &self.sale_number)?;

        let payment_method = self.payment_method.ok_or_else(|| ValidationError::Required {
            field: "paymentMethod".to_string(),
        })?;

        if self.lines.is_empty() {
            return Err(ValidationError::Required {
                field: "lines".to_string(),
            });
        }

        let customer_name = normalize_optional_text(
            "customerName",
            self.customer_name.as_deref(),
            MAX_CUSTOMER_NAME_LEN,
        )?;
        let note = normalize_optional_text("note", self.note.as_deref(), MAX_NOTE_LEN)?;

        let lines = self
            .lines
            .into_iter()
            .enumerate()
            .map(|(index, line)| price_line(index, line))
            .collect::<ValidationResult<Vec<_>>>()?;

        let totals = lines
            .iter()
            .try_fold(SaleTotals::default(), |acc, line| acc.checked_add_line(&line.amounts))
            .ok_or_else(|| ValidationError::Exceeds {
                field: "lines".to_string(),
                limit: i64::MAX,
            })?;

        Ok(ValidatedDraft {
            sale_number,
            timestamp: self.timestamp,
            customer_name,
            note,
            payment_method,
            lines,
            totals,
        })
    }
}

fn price_line(index: usize, line: DraftLine) -> ValidationResult<PricedLine> {
    let field = |name: &str| format!("lines[{index}].{name}");

    let product_id = validate_reference(&field("productId"), &line.product_id)?;
    validate_quantity(&field("quantity"), line.quantity)?;
    validate_non_negative(&field("unitPriceCents"), line.unit_price_cents)?;
    validate_non_negative(&field("discountCents"), line.discount_cents)?;
    let tax_bps = validate_tax_rate_bps(&field("taxRateBps"), line.tax_rate_bps)?;

    let subtotal = line
        .unit_price_cents
        .checked_mul(line.quantity)
        .ok_or_else(|| ValidationError::Exceeds {
            field: field("quantity"),
            limit: i64::MAX / line.unit_price_cents.max(1),
        })?;

    if line.discount_cents > subtotal {
        return Err(ValidationError::Exceeds {
            field: field("discountCents"),
            limit: subtotal,
        });
    }

    let unit_price = Money::from_cents(line.unit_price_cents);
    let tax_rate = TaxRate::from_bps(tax_bps);
    let amounts = line_amounts(
        unit_price,
        line.quantity,
        Money::from_cents(line.discount_cents),
        tax_rate,
    )
    .ok_or_else(|| ValidationError::Exceeds {
        field: field("unitPriceCents"),
        limit: i64::MAX,
    })?;

    let snapshot = |value: Option<String>| value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    Ok(PricedLine {
        product_id,
        product_name: snapshot(line.product_name),
        sku: snapshot(line.sku),
        quantity: line.quantity,
        unit_price,
        tax_rate,
        amounts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product_id: &str, quantity: i64, price: i64, bps: i64) -> DraftLine {
        DraftLine {
            product_id: product_id.to_string(),
            product_name: Some("Coffee".to_string()),
            sku: Some("COF-250".to_string()),
            quantity,
            unit_price_cents: price,
            discount_cents: 0,
            tax_rate_bps: bps,
        }
    }

    fn draft(lines: Vec<DraftLine>) -> SaleDraft {
        SaleDraft {
            sale_number: "INV-0001".to_string(),
            timestamp: None,
            customer_name: None,
            note: None,
            payment_method: Some(PaymentMethod::Cash),
            lines,
        }
    }

    #[test]
    fn test_prices_lines_and_totals() {
        let mut second = line("p-2", 3, 999, 825);
        second.discount_cents = 297;

        let validated = draft(vec![line("p-1", 2, 500, 500), second])
            .validate()
            .unwrap();

        let first = validated.lines()[0].amounts();
        assert_eq!(first.subtotal.cents(), 1000);
        assert_eq!(first.tax.cents(), 50);
        assert_eq!(first.total.cents(), 1050);

        let totals = validated.totals();
        assert_eq!(totals.subtotal_cents, 1000 + 2997);
        assert_eq!(totals.discount_cents, 297);
        assert_eq!(totals.tax_cents, 50 + 223);
        assert_eq!(totals.total_cents, 1050 + 2923);
        assert!(totals.is_consistent());
    }

    #[test]
    fn test_missing_header_fields() {
        let mut d = draft(vec![line("p-1", 1, 100, 0)]);
        d.sale_number = "  ".to_string();
        assert_eq!(d.validate().unwrap_err().field(), "saleNumber");

        let mut d = draft(vec![line("p-1", 1, 100, 0)]);
        d.payment_method = None;
        assert_eq!(d.validate().unwrap_err().field(), "paymentMethod");

        let d = draft(vec![]);
        assert_eq!(d.validate().unwrap_err().field(), "lines");
    }

    #[test]
    fn test_line_errors_carry_index() {
        let err = draft(vec![line("p-1", 1, 100, 0), line("p-2", 0, 100, 0)])
            .validate()
            .unwrap_err();
        assert!(matches!(err, ValidationError::MustBePositive { .. }));
        assert_eq!(err.field(), "lines[1].quantity");

        let err = draft(vec![line("p-1", 1, -5, 0)]).validate().unwrap_err();
        assert_eq!(err.field(), "lines[0].unitPriceCents");

        let err = draft(vec![line("p-1", 1, 100, -1)]).validate().unwrap_err();
        assert_eq!(err.field(), "lines[0].taxRateBps");
    }

    #[test]
    fn test_discount_bounded_by_subtotal() {
        let mut l = line("p-1", 2, 500, 0);
        l.discount_cents = 1001;
        let err = draft(vec![l.clone()]).validate().unwrap_err();
        assert_eq!(
            err,
            ValidationError::Exceeds {
                field: "lines[0].discountCents".to_string(),
                limit: 1000,
            }
        );

        l.discount_cents = 1000;
        let validated = draft(vec![l]).validate().unwrap();
        assert_eq!(validated.totals().total_cents, 0);

        let mut l = line("p-1", 1, 500, 0);
        l.discount_cents = -1;
        assert!(matches!(
            draft(vec![l]).validate(),
            Err(ValidationError::Negative { .. })
        ));
    }

    #[test]
    fn test_subtotal_overflow_is_rejected() {
        let err = draft(vec![line("p-1", i64::MAX, 2, 0)]).validate().unwrap_err();
        assert_eq!(err.field(), "lines[0].quantity");
    }

    #[test]
    fn test_line_total_overflow_is_rejected() {
        // Subtotal fits; adding 100% tax does not.
        let err = draft(vec![line("p-1", 1, i64::MAX, 10000)]).validate().unwrap_err();
        assert_eq!(
            err,
            ValidationError::Exceeds {
                field: "lines[0].unitPriceCents".to_string(),
                limit: i64::MAX,
            }
        );
    }

    #[test]
    fn test_sale_total_overflow_is_rejected() {
        let big = line("p-1", 1, i64::MAX / 2 + 1, 0);
        let err = draft(vec![big.clone(), big]).validate().unwrap_err();
        assert_eq!(err.field(), "lines");
        assert!(matches!(err, ValidationError::Exceeds { .. }));
    }

    #[test]
    fn test_optional_text_is_trimmed() {
        let mut d = draft(vec![line("p-1", 1, 100, 0)]);
        d.customer_name = Some("  Ayesha  ".to_string());
        d.note = Some("   ".to_string());
        let validated = d.validate().unwrap();
        assert_eq!(validated.customer_name(), Some("Ayesha"));
        assert_eq!(validated.note(), None);
    }

    #[test]
    fn test_snapshot_falls_back_to_product() {
        let now = Utc::now();
        let product = Product {
            id: "p-1".to_string(),
            sku: "TEA-100".to_string(),
            name: "Green Tea".to_string(),
            unit_price_cents: 350,
            tax_rate_bps: 0,
            current_qty: 4,
            reorder_level: 0,
            created_at: now,
            updated_at: now,
        };

        let mut l = line("p-1", 1, 300, 0);
        l.product_name = None;
        l.sku = Some(" ".to_string());
        let validated = draft(vec![l]).validate().unwrap();
        let sale_line = validated.lines()[0].to_sale_line(&product);

        assert_eq!(sale_line.product_name, "Green Tea");
        assert_eq!(sale_line.sku, "TEA-100");
        // Draft price wins over the current catalog price.
        assert_eq!(sale_line.unit_price_cents, 300);
    }

    #[test]
    fn test_from_product_and_into_sale() {
        let now = Utc::now();
        let product = Product {
            id: "p-9".to_string(),
            sku: "BRD-01".to_string(),
            name: "Bread".to_string(),
            unit_price_cents: 250,
            tax_rate_bps: 1000,
            current_qty: 10,
            reorder_level: 2,
            created_at: now,
            updated_at: now,
        };

        let validated = draft(vec![DraftLine::from_product(&product, 4, 0)])
            .validate()
            .unwrap();
        let lines = validated
            .lines()
            .iter()
            .map(|l| l.to_sale_line(&product))
            .collect();
        let sale = validated.into_sale("s-1".to_string(), now, lines);

        assert_eq!(sale.status, SaleStatus::Completed);
        assert_eq!(sale.subtotal_cents, 1000);
        assert_eq!(sale.tax_cents, 100);
        assert_eq!(sale.total_cents, 1100);
        assert!(sale.is_balanced());
    }

    #[test]
    fn test_deserializes_camel_case() {
        let json = r#"{
            "saleNumber": "INV-7",
            "paymentMethod": "card",
            "lines": [{"productId": "p-1", "quantity": 2, "unitPriceCents": 500, "taxRateBps": 500}]
        }"#;
        let d: SaleDraft = serde_json::from_str(json).unwrap();
        assert_eq!(d.payment_method, Some(PaymentMethod::Card));
        assert_eq!(d.lines[0].discount_cents, 0);
        assert!(d.validate().is_ok());
    }
}
