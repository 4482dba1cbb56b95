//! Structured logging schema and field name constants for stash.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query imports and exports by the same names
//! regardless of which subsystem emitted the event.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied (failed records, coercion fallbacks) |
//! | INFO  | Lifecycle events (startup, shutdown), import/export completions |
//! | DEBUG | Decision points, reference resolution, config choices |
//! | TRACE | Per-record iteration |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across a request.
/// Format: UUIDv7 (time-ordered).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "import", "export", "database"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "orchestrator", "resolver", "normalizer", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "run_import", "resolve_or_create", "export"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Owning user of every entity touched by the operation.
pub const OWNER_ID: &str = "owner_id";

/// Item UUID being written.
pub const ITEM_ID: &str = "item_id";

/// ImportLog UUID tracking the operation.
pub const IMPORT_LOG_ID: &str = "import_log_id";

/// Reference kind ("location", "label", "currency").
pub const REFERENCE_KIND: &str = "reference_kind";

/// Serialization format ("csv", "json").
pub const FORMAT: &str = "format";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// 1-based position of a record in its input.
pub const RECORD_INDEX: &str = "record_index";

/// Number of records in the input.
pub const RECORD_COUNT: &str = "record_count";

/// Items created by an import.
pub const CREATED: &str = "created";

/// Items updated by an import.
pub const UPDATED: &str = "updated";

/// Records that failed during an import.
pub const FAILED: &str = "failed";

/// Coercion warnings produced while normalizing.
pub const WARNING_COUNT: &str = "warning_count";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Final ImportLog status.
pub const STATUS: &str = "status";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
