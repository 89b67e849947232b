// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Result, anyhow};
use rusqlite::Connection;
use tracing::info;

use crate::integrity::content_hash;
use crate::models::AgreementRecord;
use crate::store;

/// Finds the agreement a document hash belongs to and checks that the
/// stored content still produces that hash.
pub fn verify(conn: &Connection, hash: &str) -> Result<AgreementRecord> {
    let hash = hash.trim().to_lowercase();
    if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(anyhow!("'{}' is not a SHA-256 hex digest", hash));
    }
    let record = store::find_by_hash(conn, &hash)?
        .ok_or_else(|| anyhow!("No agreement matches hash {}", hash))?;
    let recomputed = content_hash(&record)?;
    if recomputed != hash {
        return Err(anyhow!(
            "Agreement {} was modified after hashing (stored {}, now {})",
            record.id,
            hash,
            recomputed
        ));
    }
    info!(id = %record.id, "document hash verified");
    Ok(record)
}

pub fn handle(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let record = verify(conn, sub.get_one::<String>("hash").unwrap())?;
    println!("✅ Authentic document: agreement {}", record.id);
    super::agreements::show(&record, false)
}
