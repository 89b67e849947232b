// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Result, anyhow};
use rust_decimal::{Decimal, RoundingStrategy};
use rusqlite::Connection;
use serde_json::json;

use crate::engine::{installment_summary, summarize};
use crate::store;

fn cents(d: &Decimal) -> String {
    format!(
        "{:.2}",
        d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}

pub fn handle(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let id = sub.get_one::<String>("id").unwrap().trim();
    let fmt = sub.get_one::<String>("format").unwrap().to_lowercase();
    let out = sub.get_one::<String>("out").unwrap();
    if fmt != "csv" && fmt != "json" {
        return Err(anyhow!("Unknown format: {} (use csv|json)", fmt));
    }

    let record = store::require(conn, id)?;
    let summary = summarize(&record.debt, &record.installment_plans)?;
    let details = installment_summary(&record.installment_plans);

    match fmt.as_str() {
        "csv" => {
            let mut wtr = csv::Writer::from_path(out)?;
            wtr.write_record([
                "installment",
                "value",
                "discount_percent",
                "discount_amount",
                "final_value",
                "due_date",
            ])?;
            for d in &details {
                wtr.write_record([
                    d.installment_number.to_string(),
                    cents(&d.base_value),
                    d.discount_percent.normalize().to_string(),
                    cents(&d.discount_amount),
                    cents(&d.final_value),
                    d.due_date.to_string(),
                ])?;
            }
            wtr.write_record([
                "total".to_string(),
                cents(&summary.charges.total_with_charges),
                cents(&summary.discount_percent),
                cents(&summary.discount_amount),
                cents(&summary.total_final),
                String::new(),
            ])?;
            wtr.flush()?;
        }
        _ => {
            let doc = json!({
                "id": record.id,
                "token": record.token,
                "contractId": record.contract_id,
                "status": record.status,
                "hash": record.integrity.content_hash,
                "summary": summary,
                "installments": details,
            });
            std::fs::write(out, serde_json::to_string_pretty(&doc)?)?;
        }
    }
    println!("Exported agreement {} to {}", record.id, out);
    Ok(())
}
