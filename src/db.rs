// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

static APP: Lazy<(&str, &str, &str)> =
    Lazy::new(|| ("com.alphavelocity", "Debtclip", "debtclip"));

/// Environment variable that points the CLI at a specific database file.
pub const DB_ENV: &str = "DEBTCLIP_DB";

pub fn db_path() -> Result<PathBuf> {
    if let Some(p) = std::env::var_os(DB_ENV).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(p));
    }
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("debtclip.sqlite"))
}

pub fn open_or_init() -> Result<Connection> {
    let path = db_path()?;
    debug!(path = %path.display(), "opening agreement database");
    let mut conn =
        Connection::open(&path).with_context(|| format!("Open DB at {}", path.display()))?;
    init_schema(&mut conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let mut conn = Connection::open_in_memory()?;
    init_schema(&mut conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS settings(
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS agreements(
        id TEXT PRIMARY KEY,
        schema_version INTEGER NOT NULL,
        token TEXT UNIQUE,
        contract_id TEXT NOT NULL,
        agency_name TEXT NOT NULL DEFAULT '',
        agency_address TEXT NOT NULL DEFAULT '',
        agency_cnpj TEXT NOT NULL DEFAULT '',
        broker_name TEXT NOT NULL DEFAULT '',
        broker_creci TEXT NOT NULL DEFAULT '',
        creditor_name TEXT NOT NULL,
        creditor_cpf_cnpj TEXT NOT NULL,
        creditor_email TEXT,
        debtor_name TEXT NOT NULL,
        debtor_cpf_cnpj TEXT NOT NULL,
        debtor_email TEXT,
        property_address TEXT NOT NULL,
        property_cep TEXT,
        property_city TEXT,
        property_state TEXT,
        debt_period TEXT,
        principal_amount TEXT NOT NULL, -- decimals kept as unrounded text
        interest_rate TEXT NOT NULL,
        penalty_rate TEXT NOT NULL,
        plan_discount TEXT,
        plan_apply_to_total INTEGER,
        plan_progressive INTEGER,
        plan_generated_at TEXT,
        status TEXT NOT NULL CHECK(status IN ('draft','sent','signed','paid')),
        hash TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT,
        client_ip TEXT,
        signed_at TEXT,
        signed_by TEXT,
        latitude REAL,
        longitude REAL,
        tenant_accepted_option TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_agreements_hash ON agreements(hash);
    CREATE INDEX IF NOT EXISTS idx_agreements_status ON agreements(status);

    CREATE TABLE IF NOT EXISTS installments(
        agreement_id TEXT NOT NULL,
        installment_number INTEGER NOT NULL,
        value TEXT NOT NULL,
        discount TEXT NOT NULL,
        final_value TEXT NOT NULL,
        due_date TEXT NOT NULL,
        PRIMARY KEY(agreement_id, installment_number),
        FOREIGN KEY(agreement_id) REFERENCES agreements(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS payment_options(
        id TEXT NOT NULL,
        agreement_id TEXT NOT NULL,
        position INTEGER NOT NULL,
        method TEXT NOT NULL CHECK(method IN ('pix','boleto','card','link')),
        installments INTEGER NOT NULL,
        installment_value TEXT NOT NULL,
        total_value TEXT NOT NULL,
        discount TEXT NOT NULL,
        due_date TEXT,
        PRIMARY KEY(agreement_id, position),
        FOREIGN KEY(agreement_id) REFERENCES agreements(id) ON DELETE CASCADE
    );
    "#,
    )?;
    Ok(())
}
