//! Invoice data model.
//!
//! Two layers:
//!
//! * **Drafts** ([`InvoiceDraft`], [`LineItemDraft`]) are loose serde records
//!   with the exact JSON keys the model is asked to return. Every required
//!   field is optional and every number may arrive as a string, so a draft
//!   can hold whatever a model reply or an edit form produced.
//!
//! * **Documents** ([`InvoiceDocument`], [`LineItem`]) are the validated,
//!   immutable result. The only way to obtain one is
//!   `InvoiceDocument::try_from(draft)`, which runs every field rule and
//!   reports the first violation as a [`FieldError`] with a dotted path.
//!
//! Model replies and user edits both arrive as drafts, so there is a single
//! rule set. To change a document, call [`InvoiceDocument::to_draft`], edit
//! the draft, and convert it again.

use crate::error::{FieldError, ValidationError};
use crate::validators::{normalize_document_number, normalize_tax_id, parse_date, DateInput};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

// ── Currency ──────────────────────────────────────────────────────────────

/// Supported invoice currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Currency {
    #[default]
    #[serde(rename = "PLN")]
    Pln,
    #[serde(rename = "EUR")]
    Eur,
    #[serde(rename = "USD")]
    Usd,
}

impl Currency {
    pub const ALL: [Currency; 3] = [Currency::Pln, Currency::Eur, Currency::Usd];

    /// ISO 4217 code.
    pub fn code(self) -> &'static str {
        match self {
            Currency::Pln => "PLN",
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = ValidationError;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        Currency::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| ValidationError::UnsupportedCurrency(code.to_string()))
    }
}

// ── Draft input ───────────────────────────────────────────────────────────

/// A number as it arrives from JSON or a form: `4500.0`, `23` or `"4500.00"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberInput {
    Number(f64),
    Text(String),
}

impl From<f64> for NumberInput {
    fn from(v: f64) -> Self {
        NumberInput::Number(v)
    }
}

impl From<u32> for NumberInput {
    fn from(v: u32) -> Self {
        NumberInput::Number(f64::from(v))
    }
}

impl From<&str> for NumberInput {
    fn from(s: &str) -> Self {
        NumberInput::Text(s.to_string())
    }
}

impl From<String> for NumberInput {
    fn from(s: String) -> Self {
        NumberInput::Text(s)
    }
}

impl NumberInput {
    fn to_finite(&self) -> Result<f64, ValidationError> {
        let value = match self {
            NumberInput::Number(v) => *v,
            NumberInput::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| ValidationError::WrongType(format!("expected a number, got '{s}'")))?,
        };
        if !value.is_finite() {
            return Err(ValidationError::NotFinite);
        }
        Ok(value)
    }
}

/// Unvalidated line item, keyed like the model reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItemDraft {
    #[serde(default)]
    pub description: Option<String>,
    /// Absent means one unit.
    #[serde(default)]
    pub quantity: Option<NumberInput>,
    #[serde(default)]
    pub unit_price_net: Option<NumberInput>,
    #[serde(default)]
    pub vat_rate: Option<NumberInput>,
    #[serde(default)]
    pub total_gross: Option<NumberInput>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Unvalidated invoice, keyed like the model reply.
///
/// Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceDraft {
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub issue_date: Option<DateInput>,
    #[serde(default)]
    pub seller_name: Option<String>,
    #[serde(default)]
    pub seller_nip: Option<String>,
    #[serde(default)]
    pub buyer_name: Option<String>,
    #[serde(default)]
    pub items: Option<Vec<LineItemDraft>>,
    #[serde(default)]
    pub total_net_sum: Option<NumberInput>,
    #[serde(default)]
    pub total_gross_sum: Option<NumberInput>,
    /// Absent means PLN.
    #[serde(default)]
    pub currency: Option<String>,
}

impl InvoiceDraft {
    /// Decode a draft from a JSON value.
    ///
    /// Type mismatches that serde itself rejects (a string where an array is
    /// expected, a non-object root) are reported against the `response` field.
    pub fn from_value(value: serde_json::Value) -> Result<Self, FieldError> {
        serde_json::from_value(value)
            .map_err(|e| FieldError::new("response", ValidationError::WrongType(e.to_string())))
    }
}

// ── Field rules ───────────────────────────────────────────────────────────

fn required<T>(field: &str, value: Option<T>) -> Result<T, FieldError> {
    value.ok_or_else(|| FieldError::new(field, ValidationError::Missing))
}

fn non_blank(field: &str, value: Option<String>) -> Result<String, FieldError> {
    let value = required(field, value)?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FieldError::new(field, ValidationError::Blank));
    }
    Ok(trimmed.to_string())
}

fn non_negative(field: &str, value: Option<NumberInput>) -> Result<f64, FieldError> {
    let v = required(field, value)?
        .to_finite()
        .map_err(|e| FieldError::new(field, e))?;
    if v < 0.0 {
        return Err(FieldError::new(
            field,
            ValidationError::OutOfRange {
                value: v,
                rule: ">= 0",
            },
        ));
    }
    Ok(v)
}

fn positive_or_one(field: &str, value: Option<NumberInput>) -> Result<f64, FieldError> {
    let v = match value {
        None => return Ok(1.0),
        Some(n) => n.to_finite().map_err(|e| FieldError::new(field, e))?,
    };
    if v <= 0.0 {
        return Err(FieldError::new(
            field,
            ValidationError::OutOfRange {
                value: v,
                rule: "> 0",
            },
        ));
    }
    Ok(v)
}

fn percentage(field: &str, value: Option<NumberInput>) -> Result<u8, FieldError> {
    let v = required(field, value)?
        .to_finite()
        .map_err(|e| FieldError::new(field, e))?;
    if v.fract() != 0.0 {
        return Err(FieldError::new(
            field,
            ValidationError::NotWholeNumber { value: v },
        ));
    }
    if !(0.0..=100.0).contains(&v) {
        return Err(FieldError::new(
            field,
            ValidationError::OutOfRange {
                value: v,
                rule: "0..=100",
            },
        ));
    }
    Ok(v as u8)
}

fn with_field<T>(field: &str, r: Result<T, ValidationError>) -> Result<T, FieldError> {
    r.map_err(|e| FieldError::new(field, e))
}

// ── Validated records ─────────────────────────────────────────────────────

/// One validated invoice line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    description: String,
    quantity: f64,
    unit_price_net: f64,
    vat_rate: u8,
    total_gross: f64,
    category: Option<String>,
}

impl LineItem {
    /// Validate one draft line. `prefix` is prepended to field names in errors.
    fn from_draft(prefix: &str, draft: LineItemDraft) -> Result<Self, FieldError> {
        let path = |name: &str| format!("{prefix}{name}");

        let category = draft
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        Ok(Self {
            description: non_blank(&path("description"), draft.description)?,
            quantity: positive_or_one(&path("quantity"), draft.quantity)?,
            unit_price_net: non_negative(&path("unit_price_net"), draft.unit_price_net)?,
            vat_rate: percentage(&path("vat_rate"), draft.vat_rate)?,
            total_gross: non_negative(&path("total_gross"), draft.total_gross)?,
            category,
        })
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    /// Unit price excluding VAT.
    pub fn unit_price_net(&self) -> f64 {
        self.unit_price_net
    }

    /// VAT rate in whole percent, 0..=100.
    pub fn vat_rate(&self) -> u8 {
        self.vat_rate
    }

    /// Gross value of the whole line.
    pub fn total_gross(&self) -> f64 {
        self.total_gross
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn to_draft(&self) -> LineItemDraft {
        LineItemDraft {
            description: Some(self.description.clone()),
            quantity: Some(self.quantity.into()),
            unit_price_net: Some(self.unit_price_net.into()),
            vat_rate: Some(u32::from(self.vat_rate).into()),
            total_gross: Some(self.total_gross.into()),
            category: self.category.clone(),
        }
    }
}

/// A validated invoice.
///
/// Serialises to the same JSON shape the model is asked to produce, with an
/// ISO issue date. Deserialising always re-runs validation.
///
/// ```rust
/// use edgequake_invoice::model::InvoiceDocument;
///
/// let doc = InvoiceDocument::from_json(r#"{
///     "invoice_number": "FV 001 / 2025",
///     "issue_date": "15.01.2025",
///     "seller_name": "ACME Sp. z o.o.",
///     "seller_nip": "PL 123-456-78-90",
///     "buyer_name": "XYZ Solutions",
///     "items": [{"description": "Laptop", "quantity": 1, "unit_price_net": 4500,
///                "vat_rate": 23, "total_gross": 5535, "category": "IT"}],
///     "total_net_sum": 4500, "total_gross_sum": 5535, "currency": "PLN"
/// }"#).unwrap();
///
/// assert_eq!(doc.invoice_number(), "FV001/2025");
/// assert_eq!(doc.seller_nip(), "1234567890");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "InvoiceDraft")]
pub struct InvoiceDocument {
    invoice_number: String,
    issue_date: NaiveDate,
    seller_name: String,
    seller_nip: String,
    buyer_name: String,
    items: Vec<LineItem>,
    total_net_sum: f64,
    total_gross_sum: f64,
    currency: Currency,
}

impl TryFrom<InvoiceDraft> for InvoiceDocument {
    type Error = FieldError;

    fn try_from(draft: InvoiceDraft) -> Result<Self, Self::Error> {
        let invoice_number = with_field(
            "invoice_number",
            normalize_document_number(&required("invoice_number", draft.invoice_number)?),
        )?;
        let issue_date = with_field(
            "issue_date",
            parse_date(required("issue_date", draft.issue_date)?),
        )?;
        let seller_name = non_blank("seller_name", draft.seller_name)?;
        let seller_nip = with_field(
            "seller_nip",
            normalize_tax_id(&required("seller_nip", draft.seller_nip)?),
        )?;
        let buyer_name = non_blank("buyer_name", draft.buyer_name)?;

        let raw_items = required("items", draft.items)?;
        if raw_items.is_empty() {
            return Err(FieldError::new("items", ValidationError::EmptyItems));
        }
        let items = raw_items
            .into_iter()
            .enumerate()
            .map(|(i, item)| LineItem::from_draft(&format!("items[{i}]."), item))
            .collect::<Result<Vec<_>, _>>()?;

        let total_net_sum = non_negative("total_net_sum", draft.total_net_sum)?;
        let total_gross_sum = non_negative("total_gross_sum", draft.total_gross_sum)?;
        let currency = match draft.currency {
            None => Currency::default(),
            Some(code) => with_field("currency", code.parse())?,
        };

        debug!(
            invoice_number = %invoice_number,
            items = items.len(),
            "invoice document validated"
        );

        Ok(Self {
            invoice_number,
            issue_date,
            seller_name,
            seller_nip,
            buyer_name,
            items,
            total_net_sum,
            total_gross_sum,
            currency,
        })
    }
}

impl InvoiceDocument {
    /// Parse and validate a document from JSON text.
    ///
    /// Text that is not JSON, or JSON of the wrong shape, is reported as
    /// [`ValidationError::WrongType`] on the `response` field.
    pub fn from_json(json: &str) -> Result<Self, FieldError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| FieldError::new("response", ValidationError::WrongType(e.to_string())))?;
        Self::try_from(InvoiceDraft::from_value(value)?)
    }

    /// The editable form of this document. Converting it back unchanged
    /// yields an equal document.
    pub fn to_draft(&self) -> InvoiceDraft {
        InvoiceDraft {
            invoice_number: Some(self.invoice_number.clone()),
            issue_date: Some(DateInput::Date(self.issue_date)),
            seller_name: Some(self.seller_name.clone()),
            seller_nip: Some(self.seller_nip.clone()),
            buyer_name: Some(self.buyer_name.clone()),
            items: Some(self.items.iter().map(LineItem::to_draft).collect()),
            total_net_sum: Some(self.total_net_sum.into()),
            total_gross_sum: Some(self.total_gross_sum.into()),
            currency: Some(self.currency.code().to_string()),
        }
    }

    pub fn invoice_number(&self) -> &str {
        &self.invoice_number
    }

    pub fn issue_date(&self) -> NaiveDate {
        self.issue_date
    }

    pub fn seller_name(&self) -> &str {
        &self.seller_name
    }

    /// Ten ASCII digits.
    pub fn seller_nip(&self) -> &str {
        &self.seller_nip
    }

    pub fn buyer_name(&self) -> &str {
        &self.buyer_name
    }

    /// Line items in print order. Never empty.
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn total_net_sum(&self) -> f64 {
        self.total_net_sum
    }

    pub fn total_gross_sum(&self) -> f64 {
        self.total_gross_sum
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Sum of the line gross totals. Not checked against `total_gross_sum`.
    pub fn items_gross_total(&self) -> f64 {
        self.items.iter().map(|i| i.total_gross).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item_json() -> serde_json::Value {
        json!({
            "description": "Laptop Dell XPS 15",
            "quantity": 2.0,
            "unit_price_net": 4500.00,
            "vat_rate": 23,
            "total_gross": 11070.00,
            "category": "IT"
        })
    }

    fn invoice_json() -> serde_json::Value {
        json!({
            "invoice_number": "FV001/2025",
            "issue_date": "2025-01-15",
            "seller_name": "ACME Corp Sp. z o.o.",
            "seller_nip": "1234567890",
            "buyer_name": "XYZ Solutions",
            "items": [item_json()],
            "total_net_sum": 9000.00,
            "total_gross_sum": 11070.00,
            "currency": "PLN"
        })
    }

    fn build(v: serde_json::Value) -> Result<InvoiceDocument, FieldError> {
        InvoiceDocument::try_from(InvoiceDraft::from_value(v)?)
    }

    fn with_item(patch: serde_json::Value) -> serde_json::Value {
        let mut item = item_json();
        for (k, v) in patch.as_object().unwrap() {
            item[k] = v.clone();
        }
        let mut inv = invoice_json();
        inv["items"] = json!([item]);
        inv
    }

    fn field_of(r: Result<InvoiceDocument, FieldError>) -> String {
        r.expect_err("expected a validation failure").field
    }

    #[test]
    fn valid_invoice_builds() {
        let doc = build(invoice_json()).unwrap();
        assert_eq!(doc.invoice_number(), "FV001/2025");
        assert_eq!(
            doc.issue_date(),
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
        );
        assert_eq!(doc.items().len(), 1);
        assert_eq!(doc.items()[0].vat_rate(), 23);
        assert_eq!(doc.currency(), Currency::Pln);
    }

    #[test]
    fn header_fields_are_normalised() {
        let mut v = invoice_json();
        v["invoice_number"] = json!("FV 001 / 2025");
        v["seller_nip"] = json!("PL 123-456-78-90");
        v["issue_date"] = json!("15.01.2025");
        v["seller_name"] = json!("  ACME  ");
        let doc = build(v).unwrap();
        assert_eq!(doc.invoice_number(), "FV001/2025");
        assert_eq!(doc.seller_nip(), "1234567890");
        assert_eq!(doc.seller_name(), "ACME");
        assert_eq!(
            doc.issue_date(),
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
        );
    }

    #[test]
    fn empty_items_rejected() {
        let mut v = invoice_json();
        v["items"] = json!([]);
        let err = build(v).unwrap_err();
        assert_eq!(err.field, "items");
        assert_eq!(err.reason, ValidationError::EmptyItems);
    }

    #[test]
    fn missing_keys_are_named() {
        for key in [
            "invoice_number",
            "issue_date",
            "seller_name",
            "seller_nip",
            "buyer_name",
            "items",
            "total_net_sum",
            "total_gross_sum",
        ] {
            let mut v = invoice_json();
            v.as_object_mut().unwrap().remove(key);
            let err = build(v).unwrap_err();
            assert_eq!(err.field, key);
            assert_eq!(err.reason, ValidationError::Missing);
        }
    }

    #[test]
    fn currency_defaults_and_parses() {
        let mut v = invoice_json();
        v.as_object_mut().unwrap().remove("currency");
        assert_eq!(build(v).unwrap().currency(), Currency::Pln);

        let mut v = invoice_json();
        v["currency"] = json!(" eur ");
        assert_eq!(build(v).unwrap().currency(), Currency::Eur);

        let mut v = invoice_json();
        v["currency"] = json!("GBP");
        assert_eq!(field_of(build(v)), "currency");
    }

    #[test]
    fn negative_totals_rejected() {
        let mut v = invoice_json();
        v["total_net_sum"] = json!(-1.0);
        assert_eq!(field_of(build(v)), "total_net_sum");

        let mut v = invoice_json();
        v["total_gross_sum"] = json!(-0.01);
        assert_eq!(field_of(build(v)), "total_gross_sum");
    }

    #[test]
    fn bad_nip_and_date_rejected() {
        let mut v = invoice_json();
        v["seller_nip"] = json!("123");
        let err = build(v).unwrap_err();
        assert_eq!(err.field, "seller_nip");
        assert_eq!(err.reason, ValidationError::InvalidTaxId { digits: 3 });

        let mut v = invoice_json();
        v["issue_date"] = json!("invalid-date");
        assert_eq!(field_of(build(v)), "issue_date");
    }

    #[test]
    fn json_dates_follow_parse_date() {
        for raw in ["+12025-01-15", "2025 -01- 15", "2025-01-15T00:00:00"] {
            let mut v = invoice_json();
            v["issue_date"] = json!(raw);
            assert!(parse_date(raw).is_err(), "{raw}");
            let err = InvoiceDocument::from_json(&v.to_string()).unwrap_err();
            assert_eq!(err.field, "issue_date", "{raw}");
            assert!(
                matches!(err.reason, ValidationError::InvalidDate { .. }),
                "{raw}: {err:?}"
            );
        }

        let mut v = invoice_json();
        v["issue_date"] = json!(" 15/01/2025 ");
        let doc = InvoiceDocument::from_json(&v.to_string()).unwrap();
        assert_eq!(doc.issue_date(), NaiveDate::from_ymd_opt(2025, 1, 15).unwrap());
    }

    #[test]
    fn blank_names_rejected() {
        let mut v = invoice_json();
        v["buyer_name"] = json!("   ");
        let err = build(v).unwrap_err();
        assert_eq!(err.field, "buyer_name");
        assert_eq!(err.reason, ValidationError::Blank);
    }

    #[test]
    fn item_quantity_defaults_to_one() {
        let mut v = invoice_json();
        v["items"][0].as_object_mut().unwrap().remove("quantity");
        assert_eq!(build(v).unwrap().items()[0].quantity(), 1.0);
    }

    #[test]
    fn item_rules() {
        assert_eq!(
            field_of(build(with_item(json!({"quantity": 0.0})))),
            "items[0].quantity"
        );
        assert_eq!(
            field_of(build(with_item(json!({"quantity": -5.0})))),
            "items[0].quantity"
        );
        assert_eq!(
            field_of(build(with_item(json!({"unit_price_net": -100.0})))),
            "items[0].unit_price_net"
        );
        assert_eq!(
            field_of(build(with_item(json!({"vat_rate": -1})))),
            "items[0].vat_rate"
        );
        assert_eq!(
            field_of(build(with_item(json!({"vat_rate": 101})))),
            "items[0].vat_rate"
        );
        assert_eq!(
            field_of(build(with_item(json!({"total_gross": -123.0})))),
            "items[0].total_gross"
        );
        assert_eq!(
            field_of(build(with_item(json!({"description": "   "})))),
            "items[0].description"
        );
    }

    #[test]
    fn item_edge_values_accepted() {
        let doc = build(with_item(json!({
            "description": "  Book  ",
            "quantity": 2.5,
            "unit_price_net": 0.0,
            "vat_rate": 0,
            "total_gross": 0.0
        })))
        .unwrap();
        let item = &doc.items()[0];
        assert_eq!(item.description(), "Book");
        assert_eq!(item.quantity(), 2.5);
        assert_eq!(item.vat_rate(), 0);
    }

    #[test]
    fn vat_rate_must_be_whole() {
        assert_eq!(
            build(with_item(json!({"vat_rate": 23.0}))).unwrap().items()[0].vat_rate(),
            23
        );
        let err = build(with_item(json!({"vat_rate": 23.5}))).unwrap_err();
        assert_eq!(err.reason, ValidationError::NotWholeNumber { value: 23.5 });
    }

    #[test]
    fn numeric_strings_accepted() {
        let doc = build(with_item(json!({
            "unit_price_net": "4500.00",
            "vat_rate": "8",
            "total_gross": " 4860 "
        })))
        .unwrap();
        assert_eq!(doc.items()[0].unit_price_net(), 4500.0);
        assert_eq!(doc.items()[0].vat_rate(), 8);

        let err = build(with_item(json!({"unit_price_net": "dużo"}))).unwrap_err();
        assert!(matches!(err.reason, ValidationError::WrongType(_)));
    }

    #[test]
    fn category_blank_becomes_none() {
        let doc = build(with_item(json!({"category": "  "}))).unwrap();
        assert_eq!(doc.items()[0].category(), None);
        let doc = build(with_item(json!({"category": null}))).unwrap();
        assert_eq!(doc.items()[0].category(), None);
    }

    #[test]
    fn error_path_points_at_item_index() {
        let mut v = invoice_json();
        let mut bad = item_json();
        bad["quantity"] = json!(0);
        v["items"] = json!([item_json(), bad]);
        assert_eq!(field_of(build(v)), "items[1].quantity");
    }

    #[test]
    fn item_order_preserved() {
        let mut v = invoice_json();
        let names = ["first", "second", "third"];
        v["items"] = json!(names
            .iter()
            .map(|n| {
                let mut i = item_json();
                i["description"] = json!(n);
                i
            })
            .collect::<Vec<_>>());
        let doc = build(v).unwrap();
        let got: Vec<_> = doc.items().iter().map(LineItem::description).collect();
        assert_eq!(got, names);
    }

    #[test]
    fn non_finite_rejected() {
        let mut draft = InvoiceDraft::from_value(invoice_json()).unwrap();
        draft.total_net_sum = Some(f64::NAN.into());
        let err = InvoiceDocument::try_from(draft).unwrap_err();
        assert_eq!(err.reason, ValidationError::NotFinite);
    }

    #[test]
    fn draft_round_trip_is_identity() {
        let doc = build(invoice_json()).unwrap();
        let again = InvoiceDocument::try_from(doc.to_draft()).unwrap();
        assert_eq!(doc, again);
    }

    #[test]
    fn edit_goes_through_same_rules() {
        let doc = build(invoice_json()).unwrap();
        let mut draft = doc.to_draft();
        draft.items = Some(vec![]);
        let err = InvoiceDocument::try_from(draft).unwrap_err();
        assert_eq!(err.reason, ValidationError::EmptyItems);

        let mut draft = doc.to_draft();
        draft.seller_nip = Some("PL 987-654-32-10".into());
        let edited = InvoiceDocument::try_from(draft).unwrap();
        assert_eq!(edited.seller_nip(), "9876543210");
        // The source document is untouched.
        assert_eq!(doc.seller_nip(), "1234567890");
    }

    #[test]
    fn serialises_to_reply_shape() {
        let doc = build(invoice_json()).unwrap();
        let v = serde_json::to_value(&doc).unwrap();
        assert_eq!(v["issue_date"], "2025-01-15");
        assert_eq!(v["currency"], "PLN");
        assert_eq!(v["items"][0]["vat_rate"], 23);

        let back: InvoiceDocument = serde_json::from_value(v).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn deserialising_document_validates() {
        let mut v = invoice_json();
        v["items"] = json!([]);
        assert!(serde_json::from_value::<InvoiceDocument>(v).is_err());
    }

    #[test]
    fn wrong_shape_reported_on_response() {
        let err = InvoiceDocument::from_json("[1, 2, 3]").unwrap_err();
        assert_eq!(err.field, "response");
        assert!(matches!(err.reason, ValidationError::WrongType(_)));

        let err = InvoiceDocument::from_json("not json").unwrap_err();
        assert_eq!(err.field, "response");
    }

    #[test]
    fn unknown_keys_ignored() {
        let mut v = invoice_json();
        v["notes"] = json!("paid in cash");
        assert!(build(v).is_ok());
    }

    #[test]
    fn items_gross_total_sums_lines() {
        let mut v = invoice_json();
        let mut second = item_json();
        second["total_gross"] = json!(100.0);
        v["items"] = json!([item_json(), second]);
        assert_eq!(build(v).unwrap().items_gross_total(), 11170.0);
    }
}
