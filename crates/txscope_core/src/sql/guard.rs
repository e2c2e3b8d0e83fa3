//! Keyword guard for transient raw SQL.

use crate::error::{StoreError, StoreResult};

/// Keywords forbidden in raw SQL executed with `transient = true`.
///
/// Matching is a case-insensitive substring test; the trailing spaces keep
/// `create`/`alter`/`drop` from matching inside longer identifiers.
pub const NON_TRANSIENT_KEYWORDS: &[&str] =
    &["commit", "flush", "rollback", "alter ", "create ", "drop "];

/// Fails with [`StoreError::TransientSqlRequired`] when `sql` contains a
/// non-transient keyword.
pub fn ensure_transient(sql: &str) -> StoreResult<()> {
    let lowered = sql.to_lowercase();
    match NON_TRANSIENT_KEYWORDS
        .iter()
        .find(|keyword| lowered.contains(*keyword))
    {
        Some(keyword) => Err(StoreError::TransientSqlRequired {
            keyword: keyword.trim().to_string(),
        }),
        None => Ok(()),
    }
}
