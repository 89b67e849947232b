// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use comfy_table::{Cell, Table, presets::UTF8_FULL};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::{Decimal, RoundingStrategy};

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|d| d.with_timezone(&Utc))
        .with_context(|| format!("Invalid timestamp '{}'", s))
}

/// Locale-invariant decimal parsing; `1234.56`, never `1.234,56`.
pub fn parse_decimal(s: &str) -> Result<Decimal> {
    s.trim()
        .parse::<Decimal>()
        .with_context(|| format!("Invalid decimal '{}'", s))
}

pub fn parse_count(s: &str) -> Result<u32> {
    let n: i64 = s
        .trim()
        .parse()
        .with_context(|| format!("Invalid installment count '{}'", s))?;
    u32::try_from(n)
        .ok()
        .filter(|n| *n >= 1)
        .ok_or_else(|| anyhow!("Installment count must be at least 1, got {}", n))
}

/// `R$ 1.234,56`: pt-BR grouping, two fraction digits, half away from zero.
pub fn fmt_brl(d: &Decimal) -> String {
    let r = d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let sign = if r < Decimal::ZERO { "-" } else { "" };
    let s = format!("{:.2}", r.abs());
    let (int, frac) = s.split_once('.').unwrap_or((s.as_str(), "00"));
    let mut grouped = String::with_capacity(int.len() + int.len() / 3);
    for (i, c) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    format!("R$ {}{},{}", sign, grouped, frac)
}

pub fn fmt_date_br(d: &NaiveDate) -> String {
    d.format("%d/%m/%Y").to_string()
}

pub fn fmt_percent(d: &Decimal) -> String {
    format!("{}%", d.round_dp(2).normalize())
}

pub fn pretty_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL);
    t.set_header(headers.iter().map(|h| Cell::new(*h)));
    for r in rows {
        t.add_row(r.into_iter().map(Cell::new));
    }
    t
}

pub fn maybe_print_json<T: serde::Serialize>(
    json_flag: bool,
    jsonl_flag: bool,
    v: &T,
) -> Result<bool> {
    if json_flag {
        println!("{}", serde_json::to_string_pretty(v)?);
        return Ok(true);
    }
    if jsonl_flag {
        // If v is an array, stream each element; else stream single line
        let val = serde_json::to_value(v)?;
        if let Some(arr) = val.as_array() {
            for item in arr {
                println!("{}", serde_json::to_string(item)?);
            }
        } else {
            println!("{}", serde_json::to_string(&val)?);
        }
        return Ok(true);
    }
    Ok(false)
}

// Runtime defaults, stored in the settings table
pub const DEFAULT_INTEREST_RATE: &str = "default_interest_rate";
pub const DEFAULT_PENALTY_RATE: &str = "default_penalty_rate";
pub const DEFAULT_DISCOUNT: &str = "default_discount";
pub const APPLY_TO_TOTAL: &str = "apply_to_total";

pub const KNOWN_SETTINGS: &[(&str, &str)] = &[
    (DEFAULT_INTEREST_RATE, "2"),
    (DEFAULT_PENALTY_RATE, "10"),
    (DEFAULT_DISCOUNT, "10"),
    (APPLY_TO_TOTAL, "false"),
];

fn builtin_default(key: &str) -> Result<&'static str> {
    KNOWN_SETTINGS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
        .ok_or_else(|| anyhow!("Unknown setting '{}'", key))
}

pub fn get_setting(conn: &Connection, key: &str) -> Result<String> {
    let v: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key=?1", params![key], |r| {
            r.get(0)
        })
        .optional()?;
    match v {
        Some(v) => Ok(v),
        None => Ok(builtin_default(key)?.to_string()),
    }
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    builtin_default(key)?;
    let value = value.trim();
    if key == APPLY_TO_TOTAL {
        parse_bool(value)?;
    } else {
        let d = parse_decimal(value)?;
        if d < Decimal::ZERO {
            return Err(anyhow!("Setting '{}' must not be negative", key));
        }
    }
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![key, value],
    )?;
    Ok(())
}

pub fn setting_decimal(conn: &Connection, key: &str) -> Result<Decimal> {
    let raw = get_setting(conn, key)?;
    parse_decimal(&raw).with_context(|| format!("Setting '{}' is not a decimal", key))
}

pub fn setting_bool(conn: &Connection, key: &str) -> Result<bool> {
    parse_bool(&get_setting(conn, key)?)
}

fn parse_bool(s: &str) -> Result<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(anyhow!("Invalid boolean '{}'", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brl_formatting() {
        let d = |s: &str| s.parse::<Decimal>().unwrap();
        assert_eq!(fmt_brl(&d("1234.56")), "R$ 1.234,56");
        assert_eq!(fmt_brl(&d("6720")), "R$ 6.720,00");
        assert_eq!(fmt_brl(&d("0.005")), "R$ 0,01");
        assert_eq!(fmt_brl(&d("999")), "R$ 999,00");
        assert_eq!(fmt_brl(&d("1234567.891")), "R$ 1.234.567,89");
        assert_eq!(fmt_brl(&d("-1500.5")), "R$ -1.500,50");
    }

    #[test]
    fn count_parsing_rejects_non_positive() {
        assert_eq!(parse_count(" 3 ").unwrap(), 3);
        assert!(parse_count("0").is_err());
        assert!(parse_count("-2").is_err());
        assert!(parse_count("x").is_err());
    }
}
