//! Centralized default values for the Visara SDK.
//!
//! Single source of truth for base URLs, polling cadence, token lifetime,
//! and search thresholds so client code and tests stay in agreement.

// ============================================================================
// API environments
// ============================================================================

/// Base URL for the production API.
pub const PRODUCTION_BASE_URL: &str = "https://app.visara.io/api/v1";

/// Base URL for the staging API.
pub const STAGING_BASE_URL: &str = "https://app.staging-visara.link/api/v1";

// ============================================================================
// HTTP
// ============================================================================

/// Request timeout for API calls, in seconds.
///
/// Covers dataset CRUD, export submission, and status polls. Export result
/// downloads reuse the same client, so the value leaves room for large
/// archives on slow links.
pub const HTTP_TIMEOUT_SECS: u64 = 60;

// ============================================================================
// Export polling
// ============================================================================

/// Seconds to wait between export status polls.
pub const POLL_INTERVAL_SECS: u64 = 10;

/// Overall deadline for an export task to complete, in seconds.
pub const EXPORT_TIMEOUT_SECS: u64 = 300;

/// Dataset statuses that permit a full export.
pub const EXPORTABLE_STATUSES: [&str; 2] = ["READY", "completed"];

// ============================================================================
// Authentication
// ============================================================================

/// Lifetime of a minted JWT, in seconds.
pub const JWT_TTL_SECS: i64 = 600;

/// Issuer claim stamped into every minted JWT.
pub const JWT_ISSUER: &str = "sdk";

// ============================================================================
// Search defaults
// ============================================================================

/// Default lower confidence bound for issue searches.
pub const ISSUE_CONFIDENCE_MIN: f64 = 0.8;

/// Default upper confidence bound for issue searches.
pub const ISSUE_CONFIDENCE_MAX: f64 = 1.0;

/// Default similarity threshold for query-builder similarity filters.
pub const SIMILARITY_THRESHOLD: f64 = 0.8;

/// Widest similarity threshold, used by the dataset-level similarity
/// entry point so results are not narrowed unless the caller asks.
pub const SIMILARITY_THRESHOLD_WIDE: f64 = 0.0;

// ============================================================================
// Export download diagnostics
// ============================================================================

/// Maximum characters of an un-decodable download kept for diagnostics.
pub const DOWNLOAD_EXCERPT_CHARS: usize = 1000;

// ============================================================================
// Environment variable names
// ============================================================================

/// API key identifying the calling principal.
pub const ENV_API_KEY: &str = "VISARA_API_KEY";

/// Shared secret used to sign request tokens.
pub const ENV_API_SECRET: &str = "VISARA_API_SECRET";

/// Deployment selector: "production" (default) or "staging".
pub const ENV_ENVIRONMENT: &str = "VISARA_ENV";

/// Explicit base URL override; takes precedence over `VISARA_ENV`.
pub const ENV_BASE_URL: &str = "VISARA_BASE_URL";

/// Override for [`POLL_INTERVAL_SECS`].
pub const ENV_POLL_INTERVAL_SECS: &str = "VISARA_POLL_INTERVAL_SECS";

/// Override for [`EXPORT_TIMEOUT_SECS`].
pub const ENV_EXPORT_TIMEOUT_SECS: &str = "VISARA_EXPORT_TIMEOUT_SECS";
