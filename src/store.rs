// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! SQLite persistence for agreements, including lifecycle enforcement.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, info};

use crate::integrity::content_hash;
use crate::models::{
    AgreementRecord, AgreementStatus, DebtRecord, GeoLocation, InstallmentPlanEntry, Integrity,
    Parties, PaymentMethod, PaymentOption, PlanSettings, Property,
};
use crate::utils::{parse_date, parse_datetime, parse_decimal};

const SELECT_AGREEMENT: &str = "SELECT id, schema_version, token, contract_id,
    agency_name, agency_address, agency_cnpj, broker_name, broker_creci,
    creditor_name, creditor_cpf_cnpj, creditor_email, debtor_name, debtor_cpf_cnpj, debtor_email,
    property_address, property_cep, property_city, property_state, debt_period,
    principal_amount, interest_rate, penalty_rate,
    plan_discount, plan_apply_to_total, plan_progressive, plan_generated_at,
    status, hash, created_at, updated_at, client_ip, signed_at, signed_by,
    latitude, longitude, tenant_accepted_option
    FROM agreements";

/// Row as stored; decimals and timestamps are still text.
struct RawAgreement {
    id: String,
    schema_version: u32,
    token: Option<String>,
    contract_id: String,
    parties: Parties,
    property: Property,
    debt_period: Option<String>,
    principal: String,
    interest_rate: String,
    penalty_rate: String,
    plan_discount: Option<String>,
    plan_apply_to_total: Option<bool>,
    plan_progressive: Option<bool>,
    plan_generated_at: Option<String>,
    status: String,
    hash: String,
    created_at: String,
    updated_at: Option<String>,
    client_ip: Option<String>,
    signed_at: Option<String>,
    signed_by: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    tenant_accepted_option: Option<String>,
}

fn raw_from_row(r: &Row<'_>) -> rusqlite::Result<RawAgreement> {
    Ok(RawAgreement {
        id: r.get(0)?,
        schema_version: r.get(1)?,
        token: r.get(2)?,
        contract_id: r.get(3)?,
        parties: Parties {
            agency_name: r.get(4)?,
            agency_address: r.get(5)?,
            agency_cnpj: r.get(6)?,
            broker_name: r.get(7)?,
            broker_creci: r.get(8)?,
            creditor_name: r.get(9)?,
            creditor_cpf_cnpj: r.get(10)?,
            creditor_email: r.get(11)?,
            debtor_name: r.get(12)?,
            debtor_cpf_cnpj: r.get(13)?,
            debtor_email: r.get(14)?,
        },
        property: Property {
            address: r.get(15)?,
            cep: r.get(16)?,
            city: r.get(17)?,
            state: r.get(18)?,
        },
        debt_period: r.get(19)?,
        principal: r.get(20)?,
        interest_rate: r.get(21)?,
        penalty_rate: r.get(22)?,
        plan_discount: r.get(23)?,
        plan_apply_to_total: r.get(24)?,
        plan_progressive: r.get(25)?,
        plan_generated_at: r.get(26)?,
        status: r.get(27)?,
        hash: r.get(28)?,
        created_at: r.get(29)?,
        updated_at: r.get(30)?,
        client_ip: r.get(31)?,
        signed_at: r.get(32)?,
        signed_by: r.get(33)?,
        latitude: r.get(34)?,
        longitude: r.get(35)?,
        tenant_accepted_option: r.get(36)?,
    })
}

fn load_installments(conn: &Connection, agreement_id: &str) -> Result<Vec<InstallmentPlanEntry>> {
    let mut stmt = conn.prepare_cached(
        "SELECT installment_number, value, discount, final_value, due_date
         FROM installments WHERE agreement_id=?1 ORDER BY installment_number",
    )?;
    let rows = stmt.query_map(params![agreement_id], |r| {
        Ok((
            r.get::<_, u32>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, String>(4)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (n, value, discount, final_value, due) = row?;
        out.push(InstallmentPlanEntry {
            installment_number: n,
            base_value: parse_decimal(&value)?,
            discount_percent: parse_decimal(&discount)?,
            due_date: parse_date(&due)?,
            final_value: parse_decimal(&final_value)?,
        });
    }
    Ok(out)
}

fn load_payment_options(conn: &Connection, agreement_id: &str) -> Result<Vec<PaymentOption>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, method, installments, installment_value, total_value, discount, due_date
         FROM payment_options WHERE agreement_id=?1 ORDER BY position",
    )?;
    let rows = stmt.query_map(params![agreement_id], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, u32>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, String>(4)?,
            r.get::<_, String>(5)?,
            r.get::<_, Option<String>>(6)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (id, method, installments, iv, tv, discount, due) = row?;
        out.push(PaymentOption {
            id,
            method: method.parse()?,
            installments,
            installment_value: parse_decimal(&iv)?,
            total_value: parse_decimal(&tv)?,
            discount: parse_decimal(&discount)?,
            due_date: due.as_deref().map(parse_date).transpose()?,
        });
    }
    Ok(out)
}

fn hydrate(conn: &Connection, raw: RawAgreement) -> Result<AgreementRecord> {
    let plan_settings = match (raw.plan_discount, raw.plan_generated_at) {
        (Some(discount), Some(generated_at)) => Some(PlanSettings {
            discount_percent: parse_decimal(&discount)?,
            apply_to_total: raw.plan_apply_to_total.unwrap_or(false),
            progressive: raw.plan_progressive.unwrap_or(true),
            generated_at: parse_datetime(&generated_at)?,
        }),
        _ => None,
    };
    let geolocation = match (raw.latitude, raw.longitude) {
        (Some(latitude), Some(longitude)) => Some(GeoLocation {
            latitude,
            longitude,
        }),
        _ => None,
    };
    Ok(AgreementRecord {
        schema_version: raw.schema_version,
        installment_plans: load_installments(conn, &raw.id)?,
        payment_options: load_payment_options(conn, &raw.id)?,
        token: raw.token,
        contract_id: raw.contract_id,
        parties: raw.parties,
        property: raw.property,
        debt_period: raw.debt_period,
        debt: DebtRecord::new(
            parse_decimal(&raw.principal)
                .with_context(|| format!("Invalid principal in agreement {}", raw.id))?,
            parse_decimal(&raw.interest_rate)?,
            parse_decimal(&raw.penalty_rate)?,
        ),
        plan_settings,
        status: raw.status.parse()?,
        integrity: Integrity {
            content_hash: raw.hash,
            created_at: parse_datetime(&raw.created_at)?,
            updated_at: raw.updated_at.as_deref().map(parse_datetime).transpose()?,
            originating_ip: raw.client_ip,
            signed_at: raw.signed_at.as_deref().map(parse_datetime).transpose()?,
            signed_by: raw.signed_by,
            geolocation,
        },
        tenant_accepted_option: raw.tenant_accepted_option,
        id: raw.id,
    })
}

fn fetch_where(conn: &Connection, clause: &str, arg: &str) -> Result<Option<AgreementRecord>> {
    let sql = format!("{} WHERE {}", SELECT_AGREEMENT, clause);
    let raw = conn
        .query_row(&sql, params![arg], raw_from_row)
        .optional()?;
    raw.map(|r| hydrate(conn, r)).transpose()
}

pub fn get(conn: &Connection, id: &str) -> Result<Option<AgreementRecord>> {
    fetch_where(conn, "id=?1", id)
}

pub fn require(conn: &Connection, id: &str) -> Result<AgreementRecord> {
    get(conn, id)?.ok_or_else(|| anyhow!("Agreement '{}' not found", id))
}

pub fn find_by_hash(conn: &Connection, hash: &str) -> Result<Option<AgreementRecord>> {
    fetch_where(conn, "hash=?1", &hash.trim().to_lowercase())
}

pub fn list(conn: &Connection, status: Option<AgreementStatus>) -> Result<Vec<AgreementRecord>> {
    let mut sql = String::from(SELECT_AGREEMENT);
    if status.is_some() {
        sql.push_str(" WHERE status=?1");
    }
    sql.push_str(" ORDER BY created_at DESC, id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = match status {
        Some(s) => stmt
            .query_map(params![s.as_str()], raw_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
        None => stmt
            .query_map([], raw_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
    };
    rows.into_iter().map(|raw| hydrate(conn, raw)).collect()
}

fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

/// Inserts or replaces an agreement with its plan and payment options.
/// The content hash is refreshed from the record's current content.
pub fn save(conn: &mut Connection, record: &mut AgreementRecord) -> Result<()> {
    record.integrity.content_hash = content_hash(record)?;
    let tx = conn.transaction()?;
    let p = &record.parties;
    let settings = record.plan_settings.as_ref();
    let geo = record.integrity.geolocation.as_ref();
    tx.execute(
        "INSERT OR REPLACE INTO agreements(id, schema_version, token, contract_id,
            agency_name, agency_address, agency_cnpj, broker_name, broker_creci,
            creditor_name, creditor_cpf_cnpj, creditor_email, debtor_name, debtor_cpf_cnpj, debtor_email,
            property_address, property_cep, property_city, property_state, debt_period,
            principal_amount, interest_rate, penalty_rate,
            plan_discount, plan_apply_to_total, plan_progressive, plan_generated_at,
            status, hash, created_at, updated_at, client_ip, signed_at, signed_by,
            latitude, longitude, tenant_accepted_option)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,
                 ?21,?22,?23,?24,?25,?26,?27,?28,?29,?30,?31,?32,?33,?34,?35,?36,?37)",
        rusqlite::params![
            record.id,
            record.schema_version,
            record.token,
            record.contract_id,
            p.agency_name,
            p.agency_address,
            p.agency_cnpj,
            p.broker_name,
            p.broker_creci,
            p.creditor_name,
            p.creditor_cpf_cnpj,
            p.creditor_email,
            p.debtor_name,
            p.debtor_cpf_cnpj,
            p.debtor_email,
            record.property.address,
            record.property.cep,
            record.property.city,
            record.property.state,
            record.debt_period,
            record.debt.principal.to_string(),
            record.debt.interest_rate_percent.to_string(),
            record.debt.penalty_rate_percent.to_string(),
            settings.map(|s| s.discount_percent.to_string()),
            settings.map(|s| s.apply_to_total),
            settings.map(|s| s.progressive),
            settings.map(|s| fmt_ts(&s.generated_at)),
            record.status.as_str(),
            record.integrity.content_hash,
            fmt_ts(&record.integrity.created_at),
            record.integrity.updated_at.as_ref().map(fmt_ts),
            record.integrity.originating_ip,
            record.integrity.signed_at.as_ref().map(fmt_ts),
            record.integrity.signed_by,
            geo.map(|g| g.latitude),
            geo.map(|g| g.longitude),
            record.tenant_accepted_option,
        ],
    )?;

    tx.execute(
        "DELETE FROM installments WHERE agreement_id=?1",
        params![record.id],
    )?;
    tx.execute(
        "DELETE FROM payment_options WHERE agreement_id=?1",
        params![record.id],
    )?;
    for e in &record.installment_plans {
        tx.execute(
            "INSERT INTO installments(agreement_id, installment_number, value, discount, final_value, due_date)
             VALUES (?1,?2,?3,?4,?5,?6)",
            params![
                record.id,
                e.installment_number,
                e.base_value.to_string(),
                e.discount_percent.to_string(),
                e.final_value.to_string(),
                e.due_date.to_string()
            ],
        )?;
    }
    for (position, o) in record.payment_options.iter().enumerate() {
        tx.execute(
            "INSERT INTO payment_options(id, agreement_id, position, method, installments,
                installment_value, total_value, discount, due_date)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
            params![
                o.id,
                record.id,
                position as i64,
                o.method.as_str(),
                o.installments,
                o.installment_value.to_string(),
                o.total_value.to_string(),
                o.discount.to_string(),
                o.due_date.map(|d| d.to_string())
            ],
        )?;
    }
    tx.commit()?;
    debug!(id = %record.id, hash = %record.integrity.content_hash, "agreement saved");
    Ok(())
}

pub fn delete(conn: &Connection, id: &str) -> Result<bool> {
    let n = conn.execute("DELETE FROM agreements WHERE id=?1", params![id])?;
    if n > 0 {
        info!(id, "agreement deleted");
    }
    Ok(n > 0)
}

/// Moves an agreement one step along draft → sent → signed → paid.
pub fn transition(
    conn: &mut Connection,
    id: &str,
    target: AgreementStatus,
    signed_by: Option<&str>,
    at: DateTime<Utc>,
) -> Result<AgreementRecord> {
    transition_with(conn, id, target, signed_by, at, |_| Ok(()))
}

/// Signs a sent agreement. The accepted payment method, when given, must be
/// one of the offered options and is written together with the signature.
pub fn sign(
    conn: &mut Connection,
    id: &str,
    signed_by: Option<&str>,
    accepted: Option<PaymentMethod>,
    at: DateTime<Utc>,
) -> Result<AgreementRecord> {
    transition_with(conn, id, AgreementStatus::Signed, signed_by, at, |record| {
        let Some(method) = accepted else {
            return Ok(());
        };
        if !record.payment_options.iter().any(|o| o.method == method) {
            return Err(anyhow!(
                "Agreement {} does not offer {}",
                record.id,
                method.label()
            ));
        }
        record.tenant_accepted_option = Some(method.as_str().to_string());
        Ok(())
    })
}

fn transition_with<F>(
    conn: &mut Connection,
    id: &str,
    target: AgreementStatus,
    signed_by: Option<&str>,
    at: DateTime<Utc>,
    amend: F,
) -> Result<AgreementRecord>
where
    F: FnOnce(&mut AgreementRecord) -> Result<()>,
{
    let mut record = require(conn, id)?;
    if !record.status.can_transition_to(target) {
        return Err(anyhow!(
            "Cannot move agreement {} from {} to {}",
            id,
            record.status,
            target
        ));
    }
    if target == AgreementStatus::Signed {
        let who = signed_by
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| record.parties.debtor_name.clone());
        record.integrity.signed_at = Some(at);
        record.integrity.signed_by = Some(who);
    }
    amend(&mut record)?;
    let from = record.status;
    record.status = target;
    record.integrity.updated_at = Some(at);
    save(conn, &mut record)?;
    info!(id, from = %from, to = %target, "agreement status changed");
    Ok(record)
}
