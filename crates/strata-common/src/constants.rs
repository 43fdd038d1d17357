//! System-wide constants for StrataDB.
//!
//! Page geometry, reserved key-space prefixes and default limits.

// =============================================================================
// Page Constants
// =============================================================================

/// Default page size in bytes (4 KB).
pub const DEFAULT_PAGE_SIZE: usize = 4 * 1024;

/// Minimum page size in bytes.
///
/// Small pages are only useful for tests that want to exercise free-list
/// node rollover quickly; the meta page must still fit in one page.
pub const MIN_PAGE_SIZE: usize = 128;

/// Maximum page size in bytes (64 KB).
pub const MAX_PAGE_SIZE: usize = 64 * 1024;

/// Page id of the meta page. It is never handed out as a data page, so the
/// same value doubles as the null link in page chains.
pub const META_PAGE_ID: u64 = 0;

/// Size of the "next node" header at the start of every free-list node.
pub const FREE_LIST_HEADER: usize = 8;

/// Size of one page-identifier slot in a free-list node.
pub const FREE_LIST_SLOT_SIZE: usize = 8;

/// Signature stored at the start of the meta page.
pub const DB_SIGNATURE: &[u8; 16] = b"StrataDB-v1\0\0\0\0\0";

// =============================================================================
// Key and Value Limits
// =============================================================================

/// Default maximum encoded key size in bytes.
pub const DEFAULT_MAX_KEY_SIZE: usize = 1000;

/// Default maximum encoded value size in bytes.
pub const DEFAULT_MAX_VALUE_SIZE: usize = 3000;

// =============================================================================
// Table Prefixes
// =============================================================================

/// Key prefix of the internal `@meta` table.
pub const META_TABLE_PREFIX: u32 = 1;

/// Key prefix of the internal `@table` table.
pub const SCHEMA_TABLE_PREFIX: u32 = 2;

/// First prefix handed out to a user table.
pub const TABLE_PREFIX_MIN: u32 = 100;

/// Size of the big-endian table prefix at the start of every key.
pub const TABLE_PREFIX_SIZE: usize = 4;
