//! Deterministic id derivation
//!
//! Natural keys are rendered into a canonical string and hashed with
//! XXH3-128; the big-endian digest is reinterpreted as a UUID. The same
//! natural key always yields the same id, which is what makes "insert if
//! absent" commands idempotent and lets a saga compute the id the read side
//! will later query.

use std::collections::BTreeMap;

use uuid::Uuid;
use xxhash_rust::xxh3::{xxh3_128, xxh3_64};

use super::ActiveMonth;

/// Raw field map of one bank-statement row, keyed by column header
pub type RawRowData = BTreeMap<String, serde_json::Value>;

fn hash_to_uuid(natural_key: &str) -> Uuid {
    Uuid::from_u128(xxh3_128(natural_key.as_bytes()))
}

/// Id of the ledger month of `account_id` for `month`
pub fn account_month_id(account_id: Uuid, month: ActiveMonth) -> Uuid {
    hash_to_uuid(&format!(
        "{}-{}-{}",
        account_id,
        month.month(),
        month.year()
    ))
}

/// Stable hash of a row's raw fields.
///
/// `BTreeMap` serializes with sorted keys, so column order in the source
/// file does not change the hash.
pub fn raw_row_hash(raw_data: &RawRowData) -> Result<u64, serde_json::Error> {
    let canonical = serde_json::to_vec(raw_data)?;
    Ok(xxh3_64(&canonical))
}

/// Id of an imported row inside its file
pub fn data_row_id(import_file_id: Uuid, row_hash: u64) -> Uuid {
    hash_to_uuid(&format!("{}-{}", import_file_id, row_hash))
}

/// Id of the ledger movement created from a verified imported row
pub fn account_movement_id_for_row(import_file_id: Uuid, data_row_id: Uuid) -> Uuid {
    hash_to_uuid(&format!("{}-{}-movement", import_file_id, data_row_id))
}
