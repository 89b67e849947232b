// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Brazilian document numbers (CPF, CNPJ, CEP, CRECI) and contract ids.

use anyhow::{Result, anyhow};
use once_cell::sync::Lazy;
use regex::Regex;

static NON_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\D").expect("static regex"));
static NON_CRECI: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9-]").expect("static regex"));
static NON_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Z0-9\-_]").expect("static regex"));

pub fn digits(s: &str) -> String {
    NON_DIGIT.replace_all(s, "").into_owned()
}

fn digit_values(s: &str) -> Vec<u32> {
    s.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn all_same(d: &[u32]) -> bool {
    d.windows(2).all(|w| w[0] == w[1])
}

pub fn format_cpf(value: &str) -> String {
    let n: String = digits(value).chars().take(11).collect();
    match n.len() {
        0..=3 => n,
        4..=6 => format!("{}.{}", &n[..3], &n[3..]),
        7..=9 => format!("{}.{}.{}", &n[..3], &n[3..6], &n[6..]),
        _ => format!("{}.{}.{}-{}", &n[..3], &n[3..6], &n[6..9], &n[9..]),
    }
}

pub fn validate_cpf(cpf: &str) -> bool {
    let d = digit_values(&digits(cpf));
    if d.len() != 11 || all_same(&d) {
        return false;
    }
    let check = |len: usize| {
        let sum: u32 = d[..len]
            .iter()
            .enumerate()
            .map(|(i, v)| v * (len as u32 + 1 - i as u32))
            .sum();
        let digit = 11 - (sum % 11);
        if digit >= 10 { 0 } else { digit }
    };
    check(9) == d[9] && check(10) == d[10]
}

pub fn format_cnpj(value: &str) -> String {
    let n: String = digits(value).chars().take(14).collect();
    match n.len() {
        0..=2 => n,
        3..=5 => format!("{}.{}", &n[..2], &n[2..]),
        6..=8 => format!("{}.{}.{}", &n[..2], &n[2..5], &n[5..]),
        9..=12 => format!("{}.{}.{}/{}", &n[..2], &n[2..5], &n[5..8], &n[8..]),
        _ => format!(
            "{}.{}.{}/{}-{}",
            &n[..2],
            &n[2..5],
            &n[5..8],
            &n[8..12],
            &n[12..]
        ),
    }
}

const CNPJ_WEIGHTS_1: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const CNPJ_WEIGHTS_2: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

pub fn validate_cnpj(cnpj: &str) -> bool {
    let d = digit_values(&digits(cnpj));
    if d.len() != 14 || all_same(&d) {
        return false;
    }
    let check = |weights: &[u32]| {
        let sum: u32 = weights.iter().zip(&d).map(|(w, v)| w * v).sum();
        if sum % 11 < 2 { 0 } else { 11 - (sum % 11) }
    };
    check(&CNPJ_WEIGHTS_1) == d[12] && check(&CNPJ_WEIGHTS_2) == d[13]
}

pub fn format_cpf_cnpj(value: &str) -> String {
    if digits(value).len() <= 11 {
        format_cpf(value)
    } else {
        format_cnpj(value)
    }
}

pub fn validate_cpf_cnpj(value: &str) -> bool {
    match digits(value).len() {
        11 => validate_cpf(value),
        14 => validate_cnpj(value),
        _ => false,
    }
}

pub fn format_cep(value: &str) -> String {
    let n: String = digits(value).chars().take(8).collect();
    if n.len() <= 5 {
        n
    } else {
        format!("{}-{}", &n[..5], &n[5..])
    }
}

pub fn validate_cep(value: &str) -> bool {
    digits(value).len() == 8
}

pub fn format_creci(value: &str) -> String {
    NON_CRECI
        .replace_all(value, "")
        .to_uppercase()
        .chars()
        .take(20)
        .collect()
}

/// CRECI is optional; when present it must have 4 to 20 usable characters.
pub fn validate_creci(creci: &str) -> bool {
    if creci.is_empty() {
        return true;
    }
    let cleaned = NON_CRECI.replace_all(creci, "");
    (4..=20).contains(&cleaned.len())
}

pub fn format_contract_token(value: &str) -> String {
    NON_TOKEN.replace_all(&value.to_uppercase(), "").into_owned()
}

pub fn validate_contract_token(token: &str) -> Result<()> {
    if token.trim().chars().count() < 3 {
        return Err(anyhow!("Contract id is required (at least 3 characters)"));
    }
    Ok(())
}

/// Normalizes a CPF/CNPJ, failing with a message naming `who`.
pub fn require_cpf_cnpj(value: &str, who: &str) -> Result<String> {
    if !validate_cpf_cnpj(value) {
        return Err(anyhow!("Invalid CPF/CNPJ for {}: '{}'", who, value.trim()));
    }
    Ok(format_cpf_cnpj(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpf_check_digits() {
        assert!(validate_cpf("529.982.247-25"));
        assert!(validate_cpf("52998224725"));
        assert!(!validate_cpf("529.982.247-24"));
        assert!(!validate_cpf("111.111.111-11"));
        assert!(!validate_cpf("1234"));
    }

    #[test]
    fn cnpj_check_digits() {
        assert!(validate_cnpj("11.222.333/0001-81"));
        assert!(!validate_cnpj("11.222.333/0001-80"));
        assert!(!validate_cnpj("00000000000000"));
    }

    #[test]
    fn progressive_formatting() {
        assert_eq!(format_cpf("5299"), "529.9");
        assert_eq!(format_cpf("52998224725"), "529.982.247-25");
        assert_eq!(format_cnpj("11222333000181"), "11.222.333/0001-81");
        assert_eq!(format_cpf_cnpj("11222333000181"), "11.222.333/0001-81");
        assert_eq!(format_cep("01310100"), "01310-100");
        assert_eq!(format_cep("0131"), "0131");
    }

    #[test]
    fn creci_and_tokens() {
        assert!(validate_creci(""));
        assert!(validate_creci("12345-F"));
        assert!(!validate_creci("1-"));
        assert_eq!(format_creci("crEci 123/sp"), "CRECI123SP");
        assert_eq!(format_contract_token("cont 2024/001_a"), "CONT2024001_A");
        assert!(validate_contract_token("AB").is_err());
        assert!(validate_contract_token("ABC").is_ok());
    }
}
