//! Centralized default constants for stash.
//!
//! **This module is the single source of truth** for shared default values
//! and column limits. Crates reference these constants instead of defining
//! their own magic numbers.

// =============================================================================
// COLUMN LIMITS
// =============================================================================

/// Maximum characters in an item, location or label name.
pub const NAME_MAX_LEN: usize = 128;

/// Maximum characters in a currency name.
pub const CURRENCY_NAME_MAX_LEN: usize = 64;

/// Exact length of a currency code.
pub const CURRENCY_CODE_LEN: usize = 3;

/// Maximum characters in a currency symbol.
pub const CURRENCY_SYMBOL_MAX_LEN: usize = 5;

/// Maximum characters in an item's purchase_from / sold_to fields.
pub const PARTY_MAX_LEN: usize = 256;

/// Maximum characters in manufacturer / model / serial fields.
pub const PRODUCT_FIELD_MAX_LEN: usize = 128;

// =============================================================================
// ITEMS
// =============================================================================

/// Quantity assigned when an import omits it or supplies garbage.
pub const DEFAULT_QUANTITY: i32 = 1;

/// Decimal places kept for monetary values.
pub const MONEY_SCALE: i64 = 2;

/// Monetary values must stay below 10^8 (ten digits, two after the point).
pub const MONEY_MAX_INTEGER_DIGITS: u64 = 8;

// =============================================================================
// LABELS
// =============================================================================

/// Color given to labels created without a valid one.
pub const DEFAULT_LABEL_COLOR: &str = "#3498db";

// =============================================================================
// CURRENCIES
// =============================================================================

/// Currencies provisioned by `init_default_currencies`: (code, name, symbol).
pub const DEFAULT_CURRENCIES: &[(&str, &str, &str)] = &[
    ("USD", "US Dollar", "$"),
    ("EUR", "Euro", "€"),
    ("GBP", "British Pound", "£"),
    ("JPY", "Japanese Yen", "¥"),
    ("CNY", "Chinese Yuan", "¥"),
];

// =============================================================================
// IMPORT / EXPORT
// =============================================================================

/// Error messages kept verbatim in an import summary and ImportLog.
pub const MAX_REPORTED_ERRORS: usize = 10;

/// Flat CSV layout shared by the exporter and the importer, in column order.
pub const CSV_HEADERS: [&str; 27] = [
    "Name",
    "Description",
    "Quantity",
    "Important",
    "Purchase Price",
    "Purchase Currency",
    "Purchase Date",
    "Purchase From",
    "Manufacturer",
    "Model Number",
    "Serial Number",
    "Notes",
    "Warranty Expires",
    "Warranty Info",
    "Sold",
    "Sold Date",
    "Sold Price",
    "Sold Currency",
    "Sold To",
    "Insured",
    "Insured Value",
    "Insured Currency",
    "Insurance Details",
    "Location",
    "Labels",
    "Created At",
    "Updated At",
];

/// Prefix of generated export file names.
pub const EXPORT_FILE_PREFIX: &str = "stash_export";

/// Path segment joining the public base URL and an attachment storage path.
pub const MEDIA_URL_PREFIX: &str = "/media/";

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for import log listings.
pub const PAGE_LIMIT: i64 = 50;

/// Largest page a caller may request.
pub const PAGE_LIMIT_MAX: i64 = 500;

/// Default page offset.
pub const PAGE_OFFSET: i64 = 0;
