// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Result, anyhow};
use chrono::Utc;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::engine::{
    DiscountPolicy, InstallmentPlan, OverrideField, add_installment, apply_manual_override,
    compute_charges, redistribute, remove_installment, reschedule, validate_plan,
};
use crate::models::{AgreementRecord, AgreementStatus, PaymentMethod, PaymentOption};
use crate::store;
use crate::utils::{
    APPLY_TO_TOTAL, DEFAULT_DISCOUNT, maybe_print_json, parse_count, parse_date, parse_decimal,
    pretty_table, setting_bool, setting_decimal,
};

use super::simulate::installment_table;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("generate", sub)) => generate(conn, sub)?,
        Some(("redistribute", sub)) => {
            let count = parse_count(sub.get_one::<String>("count").unwrap())?;
            edit(conn, sub, |plan| redistribute(plan, count))?
        }
        Some(("add", sub)) => edit(conn, sub, add_installment)?,
        Some(("rm", sub)) => {
            let index = entry_index(sub);
            edit(conn, sub, |plan| remove_installment(plan, index))?
        }
        Some(("override", sub)) => {
            let index = entry_index(sub);
            let field: OverrideField = sub.get_one::<String>("field").unwrap().parse()?;
            let value = parse_decimal(sub.get_one::<String>("value").unwrap())?;
            edit(conn, sub, |plan| apply_manual_override(plan, index, field, value))?
        }
        Some(("reschedule", sub)) => {
            let index = entry_index(sub);
            let date = parse_date(sub.get_one::<String>("date").unwrap())?;
            edit(conn, sub, |plan| reschedule(plan, index, date))?
        }
        Some(("validate", sub)) => validate(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn entry_index(sub: &clap::ArgMatches) -> usize {
    *sub.get_one::<u32>("number").unwrap() as usize - 1
}

/// Discount policy from `--discount`, `--apply-to-total` and `--flat`,
/// with the stored defaults filling in what was not given.
pub fn policy_from_args(conn: &Connection, sub: &clap::ArgMatches) -> Result<DiscountPolicy> {
    let discount_percent = match sub.get_one::<String>("discount") {
        Some(raw) => parse_decimal(raw)?,
        None => setting_decimal(conn, DEFAULT_DISCOUNT)?,
    };
    Ok(DiscountPolicy {
        discount_percent,
        apply_to_total: sub.get_flag("apply_to_total") || setting_bool(conn, APPLY_TO_TOTAL)?,
        progressive: !sub.get_flag("flat"),
    })
}

fn ensure_editable(record: &AgreementRecord) -> Result<()> {
    if record.status != AgreementStatus::Draft {
        return Err(anyhow!(
            "Agreement {} is {}; only draft agreements can change their plan",
            record.id,
            record.status
        ));
    }
    Ok(())
}

fn surface_warnings(record: &AgreementRecord, plan: &InstallmentPlan) {
    if plan.policy.apply_to_total {
        warn!(id = %record.id, "discount applied to whole installments");
        eprintln!("Warning: discount applies to the whole installment and reduces principal");
    }
    for v in validate_plan(&plan.entries, &plan.charges) {
        eprintln!("Warning: {}", v);
    }
}

/// Writes a plan back onto the agreement, refreshing the payment options
/// offered over it.
pub fn store_plan(
    conn: &mut Connection,
    mut record: AgreementRecord,
    plan: &InstallmentPlan,
    methods: Option<Vec<PaymentMethod>>,
) -> Result<AgreementRecord> {
    let now = Utc::now();
    let requested =
        methods.unwrap_or_else(|| record.payment_options.iter().map(|o| o.method).collect());
    // one option per method; ids are `method-<millis>`
    let mut methods: Vec<PaymentMethod> = Vec::with_capacity(requested.len());
    for m in requested {
        if !methods.contains(&m) {
            methods.push(m);
        }
    }
    record.payment_options = methods
        .into_iter()
        .map(|m| PaymentOption::for_plan(m, &plan.entries, now.timestamp_millis()))
        .collect::<crate::error::Result<Vec<_>>>()?;
    record.installment_plans = plan.entries.clone();
    record.plan_settings = Some(plan.settings());
    record.integrity.updated_at = Some(now);
    store::save(conn, &mut record)?;
    Ok(record)
}

fn generate(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let id = sub.get_one::<String>("id").unwrap().trim();
    let record = store::require(conn, id)?;
    ensure_editable(&record)?;
    let count = parse_count(sub.get_one::<String>("count").unwrap())?;
    let policy = policy_from_args(conn, sub)?;
    let methods = match sub.get_many::<String>("method") {
        Some(vals) => Some(
            vals.map(|v| v.parse::<PaymentMethod>())
                .collect::<Result<Vec<_>>>()?,
        ),
        None => None,
    };

    let charges = compute_charges(&record.debt)?;
    let plan = InstallmentPlan::generate(charges, count, policy, Utc::now())?;
    surface_warnings(&record, &plan);
    let record = store_plan(conn, record, &plan, methods)?;
    info!(id = %record.id, count, "installment plan generated");
    println!("{}", installment_table(&record.installment_plans));
    Ok(())
}

fn edit<F>(conn: &mut Connection, sub: &clap::ArgMatches, f: F) -> Result<()>
where
    F: FnOnce(&InstallmentPlan) -> crate::error::Result<InstallmentPlan>,
{
    let id = sub.get_one::<String>("id").unwrap().trim();
    let record = store::require(conn, id)?;
    ensure_editable(&record)?;
    let plan = InstallmentPlan::from_record(&record)?
        .ok_or_else(|| anyhow!("Agreement {} has no installment plan; run `plan generate` first", id))?;
    let next = f(&plan)?;
    surface_warnings(&record, &next);
    let record = store_plan(conn, record, &next, None)?;
    println!("{}", installment_table(&record.installment_plans));
    Ok(())
}

fn validate(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let id = sub.get_one::<String>("id").unwrap().trim();
    let record = store::require(conn, id)?;
    let charges = compute_charges(&record.debt)?;
    let violations = validate_plan(&record.installment_plans, &charges);
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &violations)? {
        return Ok(());
    }
    if violations.is_empty() {
        println!("Plan for {} is consistent", id);
    } else {
        let rows = violations.iter().map(|v| vec![v.to_string()]).collect();
        println!("{}", pretty_table(&["Violation"], rows));
    }
    Ok(())
}
