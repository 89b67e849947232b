// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Result, anyhow};
use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use tracing::info;

use crate::engine::{AgreementSummary, PaymentSummary, payment_summary, summarize};
use crate::integrity::{generate_agreement_token, new_record_id};
use crate::models::{
    AgreementRecord, AgreementStatus, Integrity, Parties, PaymentMethod, Property, SCHEMA_VERSION,
};
use crate::store;
use crate::utils::{fmt_brl, fmt_percent, maybe_print_json, pretty_table};
use crate::validators::{
    format_cep, format_cnpj, format_contract_token, format_creci, require_cpf_cnpj, validate_cep,
    validate_cnpj, validate_contract_token, validate_creci,
};

use super::simulate::{debt_from_args, installment_table};

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("create", sub)) => {
            let record = create(conn, sub)?;
            println!(
                "Created agreement {} ({}) for {}",
                record.id,
                record.token.as_deref().unwrap_or("-"),
                record.parties.debtor_name
            );
            println!("Document hash: {}", record.integrity.content_hash);
        }
        Some(("list", sub)) => list(conn, sub)?,
        Some(("show", sub)) => {
            let id = sub.get_one::<String>("id").unwrap().trim();
            let record = store::require(conn, id)?;
            show(&record, sub.get_flag("json"))?;
        }
        Some(("send", sub)) => move_to(conn, sub, AgreementStatus::Sent)?,
        Some(("sign", sub)) => sign(conn, sub)?,
        Some(("pay", sub)) => move_to(conn, sub, AgreementStatus::Paid)?,
        Some(("rm", sub)) => {
            let id = sub.get_one::<String>("id").unwrap().trim();
            if !store::delete(conn, id)? {
                return Err(anyhow!("Agreement '{}' not found", id));
            }
            println!("Removed agreement {}", id);
        }
        _ => {}
    }
    Ok(())
}

fn opt_arg(sub: &clap::ArgMatches, name: &str) -> Option<String> {
    sub.get_one::<String>(name)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn req_arg(sub: &clap::ArgMatches, name: &str) -> String {
    sub.get_one::<String>(name).unwrap().trim().to_string()
}

pub fn create(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<AgreementRecord> {
    let contract_id = format_contract_token(&req_arg(sub, "contract"));
    validate_contract_token(&contract_id)?;

    let agency_cnpj = opt_arg(sub, "agency_cnpj").unwrap_or_default();
    if !agency_cnpj.is_empty() && !validate_cnpj(&agency_cnpj) {
        return Err(anyhow!("Invalid agency CNPJ '{}'", agency_cnpj));
    }
    let broker_creci = opt_arg(sub, "creci").map(|c| format_creci(&c)).unwrap_or_default();
    if !validate_creci(&broker_creci) {
        return Err(anyhow!("Invalid CRECI '{}'", broker_creci));
    }
    let cep = match opt_arg(sub, "cep") {
        Some(c) if !validate_cep(&c) => return Err(anyhow!("Invalid CEP '{}'", c)),
        Some(c) => Some(format_cep(&c)),
        None => None,
    };

    let debt = debt_from_args(conn, sub)?;
    // rejects negative amounts before anything is stored
    crate::engine::compute_charges(&debt)?;

    let now = Utc::now();
    let mut record = AgreementRecord {
        schema_version: SCHEMA_VERSION,
        id: new_record_id(),
        token: Some(generate_agreement_token(now)),
        contract_id,
        parties: Parties {
            agency_name: opt_arg(sub, "agency").unwrap_or_default(),
            agency_address: opt_arg(sub, "agency_address").unwrap_or_default(),
            agency_cnpj: if agency_cnpj.is_empty() {
                agency_cnpj
            } else {
                format_cnpj(&agency_cnpj)
            },
            broker_name: opt_arg(sub, "broker").unwrap_or_default(),
            broker_creci,
            creditor_name: req_arg(sub, "creditor"),
            creditor_cpf_cnpj: require_cpf_cnpj(&req_arg(sub, "creditor_doc"), "creditor")?,
            creditor_email: opt_arg(sub, "creditor_email"),
            debtor_name: req_arg(sub, "debtor"),
            debtor_cpf_cnpj: require_cpf_cnpj(&req_arg(sub, "debtor_doc"), "debtor")?,
            debtor_email: opt_arg(sub, "debtor_email"),
        },
        property: Property {
            address: req_arg(sub, "property"),
            cep,
            city: opt_arg(sub, "city"),
            state: opt_arg(sub, "state").map(|s| s.to_uppercase()),
        },
        debt_period: opt_arg(sub, "period"),
        debt,
        installment_plans: Vec::new(),
        plan_settings: None,
        payment_options: Vec::new(),
        status: AgreementStatus::Draft,
        integrity: Integrity {
            content_hash: String::new(),
            created_at: now,
            updated_at: None,
            originating_ip: opt_arg(sub, "ip"),
            signed_at: None,
            signed_by: None,
            geolocation: None,
        },
        tenant_accepted_option: None,
    };
    store::save(conn, &mut record)?;
    info!(id = %record.id, contract = %record.contract_id, "agreement created");
    Ok(record)
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let status = sub
        .get_one::<String>("status")
        .map(|s| s.parse::<AgreementStatus>())
        .transpose()?;
    let records = store::list(conn, status)?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &records)? {
        return Ok(());
    }
    let mut rows = Vec::new();
    for r in &records {
        let s = summarize(&r.debt, &r.installment_plans)?;
        rows.push(vec![
            r.id.clone(),
            r.contract_id.clone(),
            r.parties.debtor_name.clone(),
            r.status.label().to_string(),
            fmt_brl(&s.total_final),
            r.integrity.created_at.format("%d/%m/%Y").to_string(),
        ]);
    }
    println!(
        "{}",
        pretty_table(
            &["ID", "Contract", "Debtor", "Status", "Total", "Created"],
            rows
        )
    );
    Ok(())
}

#[derive(Serialize)]
struct AgreementView<'a> {
    agreement: &'a AgreementRecord,
    summary: AgreementSummary,
    payment: Option<PaymentSummary>,
}

/// Agreement with its reconciled totals, as shown to agency and tenant.
pub fn show(record: &AgreementRecord, json: bool) -> Result<()> {
    let view = AgreementView {
        agreement: record,
        summary: summarize(&record.debt, &record.installment_plans)?,
        payment: payment_summary(record)?,
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    let p = &record.parties;
    let s = &view.summary;
    let mut rows = vec![
        vec!["Agreement".into(), record.id.clone()],
        vec!["Token".into(), record.token.clone().unwrap_or_default()],
        vec!["Contract".into(), record.contract_id.clone()],
        vec!["Status".into(), record.status.label().into()],
        vec![
            "Creditor".into(),
            format!("{} ({})", p.creditor_name, p.creditor_cpf_cnpj),
        ],
        vec![
            "Debtor".into(),
            format!("{} ({})", p.debtor_name, p.debtor_cpf_cnpj),
        ],
        vec!["Property".into(), record.property.address.clone()],
        vec!["Principal".into(), fmt_brl(&s.charges.principal)],
        vec![
            "Interest".into(),
            format!(
                "{} ({})",
                fmt_brl(&s.charges.interest_amount),
                fmt_percent(&record.debt.interest_rate_percent)
            ),
        ],
        vec![
            "Penalty".into(),
            format!(
                "{} ({})",
                fmt_brl(&s.charges.penalty_amount),
                fmt_percent(&record.debt.penalty_rate_percent)
            ),
        ],
        vec!["Total with charges".into(), fmt_brl(&s.charges.total_with_charges)],
        vec!["Final total".into(), fmt_brl(&s.total_final)],
        vec!["Savings".into(), fmt_brl(&s.savings)],
    ];
    if let Some(pay) = &view.payment {
        rows.push(vec!["Payment".into(), pay.method_label.clone()]);
    }
    if let (Some(at), Some(by)) = (&record.integrity.signed_at, &record.integrity.signed_by) {
        rows.push(vec!["Signed".into(), format!("{} by {}", at.to_rfc3339(), by)]);
    }
    rows.push(vec!["Hash".into(), record.integrity.content_hash.clone()]);
    println!("{}", pretty_table(&["Field", "Value"], rows));
    if !record.installment_plans.is_empty() {
        println!("{}", installment_table(&record.installment_plans));
    }
    Ok(())
}

fn move_to(conn: &mut Connection, sub: &clap::ArgMatches, target: AgreementStatus) -> Result<()> {
    let id = sub.get_one::<String>("id").unwrap().trim();
    let record = store::transition(conn, id, target, None, Utc::now())?;
    println!("Agreement {} is now {}", record.id, record.status.label());
    Ok(())
}

fn sign(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let id = sub.get_one::<String>("id").unwrap().trim();
    let option = sub
        .get_one::<String>("option")
        .map(|s| s.parse::<PaymentMethod>())
        .transpose()?;
    let signed_by = opt_arg(sub, "signed_by");
    let record = store::sign(conn, id, signed_by.as_deref(), option, Utc::now())?;
    println!(
        "Agreement {} signed by {}",
        record.id,
        record.integrity.signed_by.as_deref().unwrap_or("-")
    );
    Ok(())
}
