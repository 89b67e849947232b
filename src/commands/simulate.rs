// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;

use crate::engine::{
    AgreementSummary, InstallmentPlan, compute_charges, discount_for_tier_count, summarize,
};
use crate::models::{DebtRecord, InstallmentPlanEntry};
use crate::utils::{
    DEFAULT_INTEREST_RATE, DEFAULT_PENALTY_RATE, fmt_brl, fmt_date_br, fmt_percent,
    maybe_print_json, parse_count, parse_decimal, pretty_table, setting_decimal,
};

use super::plans::policy_from_args;

#[derive(Debug, Serialize)]
pub struct Simulation {
    pub summary: AgreementSummary,
    pub installments: Vec<InstallmentPlanEntry>,
}

/// Reads debt terms from the arguments, falling back to the stored defaults
/// for rates the caller left out.
pub fn debt_from_args(conn: &Connection, sub: &clap::ArgMatches) -> Result<DebtRecord> {
    let principal = parse_decimal(sub.get_one::<String>("principal").unwrap())?;
    let interest = match sub.get_one::<String>("interest") {
        Some(raw) => parse_decimal(raw)?,
        None => setting_decimal(conn, DEFAULT_INTEREST_RATE)?,
    };
    let penalty = match sub.get_one::<String>("penalty") {
        Some(raw) => parse_decimal(raw)?,
        None => setting_decimal(conn, DEFAULT_PENALTY_RATE)?,
    };
    Ok(DebtRecord::new(principal, interest, penalty))
}

pub fn simulate(conn: &Connection, sub: &clap::ArgMatches) -> Result<Simulation> {
    let debt = debt_from_args(conn, sub)?;
    let count = parse_count(sub.get_one::<String>("count").unwrap())?;
    let policy = policy_from_args(conn, sub)?;
    let charges = compute_charges(&debt)?;
    let plan = InstallmentPlan::generate(charges, count, policy, Utc::now())?;
    Ok(Simulation {
        summary: summarize(&debt, &plan.entries)?,
        installments: plan.entries,
    })
}

pub fn handle(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let sim = simulate(conn, sub)?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &sim)? {
        return Ok(());
    }
    let s = &sim.summary;
    println!(
        "{}",
        pretty_table(
            &["Principal", "Interest", "Penalty", "Total", "Discount", "Final", "Savings"],
            vec![vec![
                fmt_brl(&s.charges.principal),
                fmt_brl(&s.charges.interest_amount),
                fmt_brl(&s.charges.penalty_amount),
                fmt_brl(&s.charges.total_with_charges),
                fmt_percent(&s.discount_percent),
                fmt_brl(&s.total_final),
                fmt_brl(&s.savings),
            ]],
        )
    );
    println!("{}", installment_table(&sim.installments));
    Ok(())
}

pub fn installment_table(entries: &[InstallmentPlanEntry]) -> comfy_table::Table {
    let rows = entries
        .iter()
        .map(|e| {
            vec![
                e.installment_number.to_string(),
                fmt_brl(&e.base_value),
                fmt_percent(&e.discount_percent),
                fmt_date_br(&e.due_date),
                fmt_brl(&e.final_value),
            ]
        })
        .collect();
    pretty_table(&["#", "Value", "Discount", "Due", "Final"], rows)
}

const TIER_ROWS: [(&str, u32); 8] = [
    ("1", 1),
    ("2", 2),
    ("3", 3),
    ("4", 4),
    ("5", 5),
    ("6", 6),
    ("7-12", 7),
    (">12", 13),
];

pub fn tiers(sub: &clap::ArgMatches) -> Result<()> {
    let base = parse_decimal(sub.get_one::<String>("discount").unwrap())?;
    let tiers = TIER_ROWS
        .iter()
        .map(|(_, n)| discount_for_tier_count(*n, base))
        .collect::<Result<Vec<_>, _>>()?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &tiers)? {
        return Ok(());
    }
    let rows = TIER_ROWS
        .iter()
        .zip(&tiers)
        .map(|((label, _), t)| {
            vec![
                label.to_string(),
                format!("{}%", t.multiplier_percent),
                fmt_percent(&t.discount_percent),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(&["Installments", "Multiplier", "Discount"], rows)
    );
    Ok(())
}
