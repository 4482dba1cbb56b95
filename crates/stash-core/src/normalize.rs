//! Row/record normalization.
//!
//! Turns one external record, either a CSV row keyed by header or a JSON
//! object keyed by attribute name, into canonical [`ItemFields`] plus
//! unresolved [`ItemReferences`]. Malformed optional data never fails a
//! record: the offending field is dropped and a warning is recorded.

use std::collections::HashMap;
use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode};
use chrono::NaiveDate;
use serde_json::{Map, Value as JsonValue};

use crate::defaults::{
    CURRENCY_CODE_LEN, CURRENCY_NAME_MAX_LEN, CURRENCY_SYMBOL_MAX_LEN, DEFAULT_LABEL_COLOR,
    DEFAULT_QUANTITY, MONEY_MAX_INTEGER_DIGITS, MONEY_SCALE, NAME_MAX_LEN, PARTY_MAX_LEN,
    PRODUCT_FIELD_MAX_LEN,
};
use crate::error::{Error, Result};
use crate::models::{ItemFields, ItemReferences, ReferenceDescriptor};
use crate::uuid_utils::parse_client_id;

/// Date layouts accepted on import, tried in order.
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

/// One CSV row keyed by its header.
///
/// Headers match case-insensitively and `_` is treated as a space, so both
/// `Purchase Price` and `purchase_price` address the same column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvRow {
    cells: HashMap<String, String>,
}

impl CsvRow {
    /// Build a row from header/value pairs. Later duplicates win.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            cells: pairs
                .into_iter()
                .map(|(k, v)| (header_key(k.as_ref()), v.into()))
                .collect(),
        }
    }

    /// Cell for a header or attribute name.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells.get(&header_key(column)).map(String::as_str)
    }
}

fn header_key(header: &str) -> String {
    header.trim().to_lowercase().replace('_', " ")
}

/// A record as read from an import source.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    Csv(CsvRow),
    Json(JsonValue),
}

/// Normalizer output for one record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRecord {
    pub fields: ItemFields,
    pub references: ItemReferences,
    /// One entry per dropped or defaulted field.
    pub warnings: Vec<String>,
}

/// Normalize a raw record.
///
/// Fails with `InvalidInput` only when a JSON record is not an object.
pub fn normalize(raw: &RawRecord) -> Result<NormalizedRecord> {
    match raw {
        RawRecord::Csv(row) => Ok(Normalizer::default().run(Source::Csv(row))),
        RawRecord::Json(JsonValue::Object(map)) => Ok(Normalizer::default().run(Source::Json(map))),
        RawRecord::Json(other) => Err(Error::InvalidInput(format!(
            "Expected a JSON object, found {}",
            json_type_name(other)
        ))),
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

#[derive(Clone, Copy)]
enum Source<'a> {
    Csv(&'a CsvRow),
    Json(&'a Map<String, JsonValue>),
}

#[derive(Clone, Copy)]
enum Cell<'a> {
    Text(&'a str),
    Json(&'a JsonValue),
}

impl<'a> Source<'a> {
    fn get(&self, field: &str) -> Option<Cell<'a>> {
        match self {
            Source::Csv(row) => row.get(field).map(Cell::Text),
            Source::Json(map) => match map.get(field) {
                None | Some(JsonValue::Null) => None,
                Some(v) => Some(Cell::Json(v)),
            },
        }
    }
}

#[derive(Default)]
struct Normalizer {
    warnings: Vec<String>,
}

impl Normalizer {
    fn run(mut self, src: Source<'_>) -> NormalizedRecord {
        let fields = ItemFields {
            id: self.id(src),
            name: self.text(src, "name"),
            description: self.text(src, "description"),
            quantity: self.quantity(src),
            important: self.flag(src, "important"),
            purchase_price: self.decimal(src, "purchase_price"),
            purchase_date: self.date(src, "purchase_date"),
            purchase_from: self.bounded_text(src, "purchase_from", PARTY_MAX_LEN),
            manufacturer: self.bounded_text(src, "manufacturer", PRODUCT_FIELD_MAX_LEN),
            model_number: self.bounded_text(src, "model_number", PRODUCT_FIELD_MAX_LEN),
            serial_number: self.bounded_text(src, "serial_number", PRODUCT_FIELD_MAX_LEN),
            notes: self.text(src, "notes"),
            warranty_expires: self.date(src, "warranty_expires"),
            warranty_info: self.text(src, "warranty_info"),
            sold: self.flag(src, "sold"),
            sold_date: self.date(src, "sold_date"),
            sold_price: self.decimal(src, "sold_price"),
            sold_to: self.bounded_text(src, "sold_to", PARTY_MAX_LEN),
            insured: self.flag(src, "insured"),
            insured_value: self.decimal(src, "insured_value"),
            insurance_details: self.text(src, "insurance_details"),
            custom_fields: self.custom_fields(src),
        };
        let references = ItemReferences {
            location: self.location(src),
            labels: self.labels(src),
            purchase_currency: self.currency(src, "purchase_currency"),
            sold_currency: self.currency(src, "sold_currency"),
            insured_currency: self.currency(src, "insured_currency"),
        };
        NormalizedRecord {
            fields,
            references,
            warnings: self.warnings,
        }
    }

    fn warn(&mut self, field: &str, message: impl std::fmt::Display) {
        self.warnings.push(format!("{}: {}", field, message));
    }

    /// Plain text of a scalar cell, untrimmed.
    fn scalar(&mut self, field: &str, cell: Cell<'_>) -> Option<String> {
        match cell {
            Cell::Text(s) => Some(s.to_string()),
            Cell::Json(JsonValue::String(s)) => Some(s.clone()),
            Cell::Json(v @ (JsonValue::Number(_) | JsonValue::Bool(_))) => Some(v.to_string()),
            Cell::Json(other) => {
                self.warn(field, format!("expected text, found {}", json_type_name(other)));
                None
            }
        }
    }

    fn text(&mut self, src: Source<'_>, field: &str) -> Option<String> {
        let cell = src.get(field)?;
        let raw = self.scalar(field, cell)?;
        trimmed(&raw)
    }

    /// Text that must fit a bounded column; longer values are dropped.
    fn bounded_text(&mut self, src: Source<'_>, field: &str, max: usize) -> Option<String> {
        let value = self.text(src, field)?;
        if value.chars().count() > max {
            self.warn(field, format!("longer than {} characters; ignored", max));
            return None;
        }
        Some(value)
    }

    fn id(&mut self, src: Source<'_>) -> Option<uuid::Uuid> {
        // CSV exports carry no identity column, so CSV rows always create.
        let Source::Json(_) = src else {
            return None;
        };
        let raw = self.text(src, "id")?;
        let id = parse_client_id(&raw);
        if id.is_none() {
            self.warn("id", format!("'{}' is not a valid identifier; ignored", raw));
        }
        id
    }

    fn quantity(&mut self, src: Source<'_>) -> i32 {
        let parsed = match src.get("quantity") {
            None => return DEFAULT_QUANTITY,
            Some(Cell::Json(JsonValue::Number(n))) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Some(cell) => match self.scalar("quantity", cell).as_deref().map(str::trim) {
                None | Some("") => return DEFAULT_QUANTITY,
                Some(s) => s.parse::<i64>().ok().or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite() && f.fract() == 0.0)
                        .map(|f| f as i64)
                }),
            },
        };
        match parsed.and_then(|q| i32::try_from(q).ok()) {
            Some(q) if q >= 0 => q,
            _ => {
                self.warn(
                    "quantity",
                    format!("not a non-negative whole number; using {}", DEFAULT_QUANTITY),
                );
                DEFAULT_QUANTITY
            }
        }
    }

    fn flag(&mut self, src: Source<'_>, field: &str) -> bool {
        match src.get(field) {
            None => false,
            Some(Cell::Json(JsonValue::Bool(b))) => *b,
            Some(Cell::Json(JsonValue::Number(n))) => n.as_i64() == Some(1),
            Some(cell) => self
                .scalar(field, cell)
                .is_some_and(|s| parse_flag(&s)),
        }
    }

    fn decimal(&mut self, src: Source<'_>, field: &str) -> Option<BigDecimal> {
        let cell = src.get(field)?;
        let raw = self.scalar(field, cell)?;
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match parse_money(raw) {
            Some(value) => Some(value),
            None => {
                self.warn(field, format!("'{}' is not a valid amount; ignored", raw));
                None
            }
        }
    }

    fn date(&mut self, src: Source<'_>, field: &str) -> Option<NaiveDate> {
        let raw = self.text(src, field)?;
        let parsed = parse_date(&raw);
        if parsed.is_none() {
            self.warn(field, format!("'{}' is not a recognized date; ignored", raw));
        }
        parsed
    }

    fn custom_fields(&mut self, src: Source<'_>) -> Option<JsonValue> {
        match src {
            Source::Csv(_) => None,
            Source::Json(_) => match src.get("custom_fields")? {
                Cell::Json(v @ JsonValue::Object(_)) => Some(v.clone()),
                _ => {
                    self.warn("custom_fields", "expected an object; ignored");
                    None
                }
            },
        }
    }

    fn location(&mut self, src: Source<'_>) -> Option<ReferenceDescriptor> {
        let (name, description) = match src.get("location")? {
            Cell::Json(JsonValue::Object(obj)) => (
                obj.get("name").and_then(json_text),
                obj.get("description").and_then(json_text),
            ),
            cell => (self.scalar("location", cell).as_deref().and_then(trimmed), None),
        };
        let name = self.bounded_name("location", name?)?;
        Some(ReferenceDescriptor::Location { name, description })
    }

    fn labels(&mut self, src: Source<'_>) -> Vec<ReferenceDescriptor> {
        let candidates: Vec<(String, Option<String>)> = match src.get("labels") {
            None => Vec::new(),
            Some(Cell::Json(JsonValue::Array(entries))) => entries
                .iter()
                .filter_map(|entry| match entry {
                    JsonValue::Object(obj) => obj
                        .get("name")
                        .and_then(json_text)
                        .map(|name| (name, obj.get("color").and_then(json_text))),
                    other => json_text(other).map(|name| (name, None)),
                })
                .collect(),
            Some(cell) => self
                .scalar("labels", cell)
                .unwrap_or_default()
                .split(',')
                .filter_map(trimmed)
                .map(|name| (name, None))
                .collect(),
        };

        let mut labels: Vec<ReferenceDescriptor> = Vec::with_capacity(candidates.len());
        for (name, color) in candidates {
            let Some(name) = self.bounded_name("labels", name) else {
                continue;
            };
            if labels.iter().any(|l| l.natural_key() == name) {
                continue;
            }
            let color = match color {
                Some(c) if is_hex_color(&c) => c,
                Some(c) => {
                    self.warn(
                        "labels",
                        format!("invalid color '{}' for '{}'; using {}", c, name, DEFAULT_LABEL_COLOR),
                    );
                    DEFAULT_LABEL_COLOR.to_string()
                }
                None => DEFAULT_LABEL_COLOR.to_string(),
            };
            labels.push(ReferenceDescriptor::Label { name, color });
        }
        labels
    }

    fn currency(&mut self, src: Source<'_>, field: &str) -> Option<ReferenceDescriptor> {
        let (code, name, symbol) = match src.get(field)? {
            Cell::Json(JsonValue::Object(obj)) => (
                obj.get("code").and_then(json_text),
                obj.get("name").and_then(json_text),
                obj.get("symbol").and_then(json_text),
            ),
            cell => (self.scalar(field, cell).as_deref().and_then(trimmed), None, None),
        };
        let code = code?.to_uppercase();
        if code.chars().count() != CURRENCY_CODE_LEN || !code.chars().all(|c| c.is_ascii_alphabetic())
        {
            self.warn(field, format!("'{}' is not a 3-letter currency code; ignored", code));
            return None;
        }
        let name = name.filter(|n| n.chars().count() <= CURRENCY_NAME_MAX_LEN);
        let symbol = symbol.filter(|s| s.chars().count() <= CURRENCY_SYMBOL_MAX_LEN);
        Some(ReferenceDescriptor::currency(&code, name, symbol))
    }

    fn bounded_name(&mut self, field: &str, name: String) -> Option<String> {
        if name.chars().count() > NAME_MAX_LEN {
            self.warn(
                field,
                format!("name longer than {} characters; ignored", NAME_MAX_LEN),
            );
            return None;
        }
        Some(name)
    }
}

fn trimmed(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

fn json_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => trimmed(s),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `yes`, `true` and `1` (any case, surrounding whitespace ignored) are true;
/// everything else is false.
pub fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "yes" | "true" | "1")
}

/// Parse a calendar date as `YYYY-MM-DD`, falling back to `MM/DD/YYYY`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Parse a monetary amount, rounded half-up to two places.
///
/// Returns `None` when the text is not a number or the value needs more
/// than eight integer digits.
pub fn parse_money(raw: &str) -> Option<BigDecimal> {
    let value = BigDecimal::from_str(raw.trim()).ok()?;
    let limit = BigDecimal::from(10u64.pow(MONEY_MAX_INTEGER_DIGITS as u32));
    if value.abs() >= limit {
        return None;
    }
    Some(value.with_scale_round(MONEY_SCALE, RoundingMode::HalfUp))
}

/// `#` followed by exactly six hex digits.
pub fn is_hex_color(raw: &str) -> bool {
    raw.len() == 7
        && raw.starts_with('#')
        && raw[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn csv(pairs: &[(&str, &str)]) -> NormalizedRecord {
        normalize(&RawRecord::Csv(CsvRow::from_pairs(pairs.iter().copied()))).unwrap()
    }

    fn json(value: JsonValue) -> NormalizedRecord {
        normalize(&RawRecord::Json(value)).unwrap()
    }

    fn money(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_boolean_coercion() {
        for truthy in ["Yes", "yes", "1", "true", " TRUE "] {
            assert!(parse_flag(truthy), "{truthy:?} should be true");
        }
        for falsy in ["no", "", "0", "maybe", "Y"] {
            assert!(!parse_flag(falsy), "{falsy:?} should be false");
        }
    }

    #[test]
    fn test_date_fallback_chain() {
        let iso = parse_date("2024-03-05");
        assert_eq!(iso, NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(parse_date("03/05/2024"), iso);
        assert_eq!(parse_date("not-a-date"), None);
        assert_eq!(parse_date("2024-13-01"), None);
    }

    #[test]
    fn test_unparseable_date_is_dropped_with_warning() {
        let rec = csv(&[("Name", "Lamp"), ("Purchase Date", "not-a-date")]);
        assert_eq!(rec.fields.purchase_date, None);
        assert_eq!(rec.fields.name.as_deref(), Some("Lamp"));
        assert_eq!(rec.warnings.len(), 1);
        assert!(rec.warnings[0].starts_with("purchase_date:"));
    }

    #[test]
    fn test_money_rounding_and_range() {
        assert_eq!(parse_money("19.999"), Some(money("20.00")));
        assert_eq!(parse_money(" 5 "), Some(money("5.00")));
        assert_eq!(parse_money("-3.456"), Some(money("-3.46")));
        assert_eq!(parse_money("99999999.99"), Some(money("99999999.99")));
        assert_eq!(parse_money("100000000"), None);
        assert_eq!(parse_money("twelve"), None);
    }

    #[test]
    fn test_quantity_defaults() {
        assert_eq!(csv(&[("Quantity", "")]).fields.quantity, 1);
        assert_eq!(csv(&[]).fields.quantity, 1);
        assert_eq!(csv(&[("Quantity", "4")]).fields.quantity, 4);
        assert_eq!(csv(&[("Quantity", "0")]).fields.quantity, 0);

        let bad = csv(&[("Quantity", "lots")]);
        assert_eq!(bad.fields.quantity, 1);
        assert_eq!(bad.warnings.len(), 1);

        assert_eq!(csv(&[("Quantity", "-2")]).fields.quantity, 1);
        assert_eq!(json(json!({"quantity": 3})).fields.quantity, 3);
        assert_eq!(json(json!({"quantity": "7"})).fields.quantity, 7);
        assert_eq!(json(json!({"quantity": 2.0})).fields.quantity, 2);
        assert_eq!(json(json!({"quantity": 2.5})).fields.quantity, 1);
    }

    #[test]
    fn test_csv_header_mapping() {
        let rec = csv(&[
            ("Name", "  Cordless Drill "),
            ("Model Number", "DCD771"),
            ("Purchase Price", "129.5"),
            ("Important", "Yes"),
            ("Warranty Expires", "06/30/2026"),
            ("Notes", "   "),
        ]);
        assert_eq!(rec.fields.name.as_deref(), Some("Cordless Drill"));
        assert_eq!(rec.fields.model_number.as_deref(), Some("DCD771"));
        assert_eq!(rec.fields.purchase_price, Some(money("129.50")));
        assert!(rec.fields.important);
        assert_eq!(rec.fields.warranty_expires, NaiveDate::from_ymd_opt(2026, 6, 30));
        assert_eq!(rec.fields.notes, None);
        assert!(rec.warnings.is_empty());
    }

    #[test]
    fn test_csv_headers_are_case_and_underscore_insensitive() {
        let rec = csv(&[("serial_number", "X1"), ("SOLD TO", "Bob")]);
        assert_eq!(rec.fields.serial_number.as_deref(), Some("X1"));
        assert_eq!(rec.fields.sold_to.as_deref(), Some("Bob"));
    }

    #[test]
    fn test_csv_references() {
        let rec = csv(&[
            ("Name", "Drill"),
            ("Location", " Garage "),
            ("Labels", "Tools, Power ,,Tools"),
            ("Purchase Currency", "usd"),
            ("Sold Currency", "dollars"),
        ]);
        assert_eq!(rec.references.location, Some(ReferenceDescriptor::location("Garage")));
        let names: Vec<_> = rec.references.labels.iter().map(|l| l.natural_key()).collect();
        assert_eq!(names, vec!["Tools", "Power"]);
        assert_eq!(
            rec.references.purchase_currency,
            Some(ReferenceDescriptor::currency("USD", None, None))
        );
        assert_eq!(rec.references.sold_currency, None);
        assert_eq!(rec.warnings.len(), 1);
    }

    #[test]
    fn test_blank_location_means_none() {
        let rec = csv(&[("Name", "Lamp"), ("Location", "")]);
        assert_eq!(rec.references.location, None);
    }

    #[test]
    fn test_csv_ignores_identity() {
        let rec = csv(&[("id", "0190a4f2-8a5b-7cc1-9b7e-3f0c2d1e4a55"), ("Name", "x")]);
        assert_eq!(rec.fields.id, None);
    }

    #[test]
    fn test_json_record() {
        let id = crate::new_v7();
        let rec = json(json!({
            "id": id.to_string(),
            "name": "Camera",
            "quantity": 1,
            "insured": true,
            "sold": 0,
            "insured_value": 1200.5,
            "insured_currency": {"id": 9, "code": "eur", "symbol": "€"},
            "location": {"id": 3, "name": "Office"},
            "labels": [{"id": 1, "name": "Photo", "color": "#ff0000"}, "Fragile"],
            "custom_fields": {"lens": "35mm"},
            "created_at": "2020-01-01T00:00:00Z",
            "attachments": [{"id": 1}],
            "maintenance_records": []
        }));
        assert_eq!(rec.fields.id, Some(id));
        assert!(rec.fields.insured);
        assert!(!rec.fields.sold);
        assert_eq!(rec.fields.insured_value, Some(money("1200.50")));
        assert_eq!(rec.fields.custom_fields, Some(json!({"lens": "35mm"})));
        assert_eq!(
            rec.references.insured_currency,
            Some(ReferenceDescriptor::Currency {
                code: "EUR".into(),
                name: "EUR".into(),
                symbol: "€".into(),
            })
        );
        assert_eq!(rec.references.location, Some(ReferenceDescriptor::location("Office")));
        assert_eq!(
            rec.references.labels,
            vec![
                ReferenceDescriptor::label("Photo", Some("#ff0000".into())),
                ReferenceDescriptor::label("Fragile", None),
            ]
        );
        assert!(rec.warnings.is_empty());
    }

    #[test]
    fn test_json_invalid_label_color_falls_back() {
        let rec = json(json!({"name": "x", "labels": [{"name": "Red", "color": "red"}]}));
        assert_eq!(rec.references.labels, vec![ReferenceDescriptor::label("Red", None)]);
        assert_eq!(rec.warnings.len(), 1);
    }

    #[test]
    fn test_json_bad_id_and_custom_fields_are_dropped() {
        let rec = json(json!({"name": "x", "id": 17, "custom_fields": [1, 2]}));
        assert_eq!(rec.fields.id, None);
        assert_eq!(rec.fields.custom_fields, None);
        assert_eq!(rec.warnings.len(), 2);
    }

    #[test]
    fn test_json_nulls_are_absent() {
        let rec = json(json!({"name": "x", "location": null, "purchase_price": null, "labels": null}));
        assert_eq!(rec.references.location, None);
        assert_eq!(rec.fields.purchase_price, None);
        assert!(rec.references.labels.is_empty());
        assert!(rec.warnings.is_empty());
    }

    #[test]
    fn test_non_object_json_fails() {
        let err = normalize(&RawRecord::Json(json!([1, 2]))).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(normalize(&RawRecord::Json(json!("item"))).is_err());
    }

    #[test]
    fn test_overlong_reference_names_are_dropped() {
        let long = "x".repeat(NAME_MAX_LEN + 1);
        let rec = csv(&[("Name", "y"), ("Location", &long), ("Labels", &long)]);
        assert_eq!(rec.references.location, None);
        assert!(rec.references.labels.is_empty());
        assert_eq!(rec.warnings.len(), 2);
    }

    #[test]
    fn test_overlong_product_and_party_fields_are_dropped() {
        let long_product = "m".repeat(PRODUCT_FIELD_MAX_LEN + 1);
        let long_party = "x".repeat(PARTY_MAX_LEN + 1);
        let rec = csv(&[
            ("Name", "Drill"),
            ("Manufacturer", &long_product),
            ("Model Number", &long_product),
            ("Serial Number", "SN-1"),
            ("Purchase From", &long_party),
            ("Sold To", &long_party),
        ]);
        assert_eq!(rec.fields.name.as_deref(), Some("Drill"));
        assert_eq!(rec.fields.manufacturer, None);
        assert_eq!(rec.fields.model_number, None);
        assert_eq!(rec.fields.serial_number.as_deref(), Some("SN-1"));
        assert_eq!(rec.fields.purchase_from, None);
        assert_eq!(rec.fields.sold_to, None);
        assert_eq!(rec.warnings.len(), 4);
        assert!(rec.warnings.iter().any(|w| w.starts_with("sold_to:")));
    }

    #[test]
    fn test_fields_at_their_limit_are_kept() {
        let product = "m".repeat(PRODUCT_FIELD_MAX_LEN);
        let party = "é".repeat(PARTY_MAX_LEN);
        let rec = json(json!({"name": "x", "manufacturer": product, "purchase_from": party}));
        assert_eq!(rec.fields.manufacturer.map(|m| m.chars().count()), Some(PRODUCT_FIELD_MAX_LEN));
        assert_eq!(rec.fields.purchase_from.map(|p| p.chars().count()), Some(PARTY_MAX_LEN));
        assert!(rec.warnings.is_empty());
    }

    #[test]
    fn test_hex_color() {
        assert!(is_hex_color("#3498db"));
        assert!(is_hex_color("#ABCDEF"));
        assert!(!is_hex_color("3498db"));
        assert!(!is_hex_color("#3498dg"));
        assert!(!is_hex_color("#3498d"));
    }
}
