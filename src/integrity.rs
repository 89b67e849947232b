// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{
    AgreementRecord, DebtRecord, InstallmentPlanEntry, Parties, PaymentOption, Property,
};

/// Fields covered by the content hash. Status, timestamps and signature
/// metadata are left out so lifecycle changes keep the document hash.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HashedContent<'a> {
    id: &'a str,
    token: Option<&'a str>,
    contract_id: &'a str,
    parties: &'a Parties,
    property: &'a Property,
    debt_period: Option<&'a str>,
    debt: &'a DebtRecord,
    installment_plans: &'a [InstallmentPlanEntry],
    payment_options: &'a [PaymentOption],
}

pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

pub fn content_hash(record: &AgreementRecord) -> Result<String> {
    let content = HashedContent {
        id: &record.id,
        token: record.token.as_deref(),
        contract_id: &record.contract_id,
        parties: &record.parties,
        property: &record.property,
        debt_period: record.debt_period.as_deref(),
        debt: &record.debt,
        installment_plans: &record.installment_plans,
        payment_options: &record.payment_options,
    };
    Ok(sha256_hex(&serde_json::to_vec(&content)?))
}

/// `MR3X-ACD-<year>-<six digits>`.
pub fn generate_agreement_token(now: DateTime<Utc>) -> String {
    let n = Uuid::new_v4().as_u128() % 900_000 + 100_000;
    format!("MR3X-ACD-{}-{}", now.year(), n)
}

pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn token_shape() {
        let now = chrono::TimeZone::with_ymd_and_hms(&Utc, 2025, 3, 1, 0, 0, 0).unwrap();
        let token = generate_agreement_token(now);
        let parts: Vec<&str> = token.split('-').collect();
        assert_eq!(&parts[..3], ["MR3X", "ACD", "2025"]);
        assert_eq!(parts[3].len(), 6);
        assert!(parts[3].chars().all(|c| c.is_ascii_digit()));
    }
}
