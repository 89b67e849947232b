// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::engine::checked_sum;
use crate::error::{Result as EngineResult, invalid};

/// Current layout of a persisted [`AgreementRecord`].
pub const SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtRecord {
    #[serde(rename = "principalAmount")]
    pub principal: Decimal,
    #[serde(rename = "interestRate")]
    pub interest_rate_percent: Decimal,
    #[serde(rename = "penaltyRate")]
    pub penalty_rate_percent: Decimal,
}

impl DebtRecord {
    pub fn new(principal: Decimal, interest_rate_percent: Decimal, penalty_rate_percent: Decimal) -> Self {
        Self {
            principal,
            interest_rate_percent,
            penalty_rate_percent,
        }
    }

    /// Builds a record from floating point input, rejecting NaN and infinities.
    pub fn from_f64(principal: f64, interest_rate: f64, penalty_rate: f64) -> EngineResult<Self> {
        let conv = |v: f64, field: &str| {
            Decimal::try_from(v).map_err(|_| invalid(format!("{} must be a finite number, got {}", field, v)))
        };
        Ok(Self::new(
            conv(principal, "principal")?,
            conv(interest_rate, "interest rate")?,
            conv(penalty_rate, "penalty rate")?,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallmentPlanEntry {
    pub installment_number: u32,
    #[serde(rename = "value")]
    pub base_value: Decimal,
    #[serde(rename = "discount")]
    pub discount_percent: Decimal,
    pub due_date: NaiveDate,
    pub final_value: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgreementStatus {
    Draft,
    Sent,
    Signed,
    Paid,
}

impl AgreementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgreementStatus::Draft => "draft",
            AgreementStatus::Sent => "sent",
            AgreementStatus::Signed => "signed",
            AgreementStatus::Paid => "paid",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AgreementStatus::Draft => "Rascunho",
            AgreementStatus::Sent => "Enviado",
            AgreementStatus::Signed => "Assinado",
            AgreementStatus::Paid => "Pago",
        }
    }

    /// The only status this one may move to; `None` once paid.
    pub fn next(&self) -> Option<AgreementStatus> {
        match self {
            AgreementStatus::Draft => Some(AgreementStatus::Sent),
            AgreementStatus::Sent => Some(AgreementStatus::Signed),
            AgreementStatus::Signed => Some(AgreementStatus::Paid),
            AgreementStatus::Paid => None,
        }
    }

    pub fn can_transition_to(&self, target: AgreementStatus) -> bool {
        self.next() == Some(target)
    }
}

impl fmt::Display for AgreementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgreementStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(AgreementStatus::Draft),
            "sent" => Ok(AgreementStatus::Sent),
            "signed" => Ok(AgreementStatus::Signed),
            "paid" => Ok(AgreementStatus::Paid),
            other => Err(anyhow!("Unknown status '{}' (use draft|sent|signed|paid)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Pix,
    Boleto,
    Card,
    Link,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Pix => "pix",
            PaymentMethod::Boleto => "boleto",
            PaymentMethod::Card => "card",
            PaymentMethod::Link => "link",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Pix => "PIX",
            PaymentMethod::Boleto => "Boleto Bancário",
            PaymentMethod::Card => "Cartão de Crédito",
            PaymentMethod::Link => "Link de Pagamento",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pix" => Ok(PaymentMethod::Pix),
            "boleto" => Ok(PaymentMethod::Boleto),
            "card" => Ok(PaymentMethod::Card),
            "link" => Ok(PaymentMethod::Link),
            other => Err(anyhow!("Unknown payment method '{}' (use pix|boleto|card|link)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOption {
    pub id: String,
    pub method: PaymentMethod,
    pub installments: u32,
    pub installment_value: Decimal,
    pub total_value: Decimal,
    pub discount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

impl PaymentOption {
    /// Offers `method` over an existing plan: first installment's value,
    /// percent and due date, plus the plan's final total.
    pub fn for_plan(
        method: PaymentMethod,
        plans: &[InstallmentPlanEntry],
        stamp: i64,
    ) -> EngineResult<Self> {
        let first = plans.first();
        Ok(Self {
            id: format!("{}-{}", method.as_str(), stamp),
            method,
            installments: plans.len() as u32,
            installment_value: first.map(|p| p.final_value).unwrap_or(Decimal::ZERO),
            total_value: checked_sum(plans.iter().map(|p| p.final_value), "payment option total")?,
            discount: first.map(|p| p.discount_percent).unwrap_or(Decimal::ZERO),
            due_date: first.map(|p| p.due_date),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parties {
    #[serde(default)]
    pub agency_name: String,
    #[serde(default)]
    pub agency_address: String,
    #[serde(default)]
    pub agency_cnpj: String,
    #[serde(default)]
    pub broker_name: String,
    #[serde(default)]
    pub broker_creci: String,
    pub creditor_name: String,
    pub creditor_cpf_cnpj: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creditor_email: Option<String>,
    pub debtor_name: String,
    pub debtor_cpf_cnpj: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debtor_email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    #[serde(rename = "propertyAddress")]
    pub address: String,
    #[serde(rename = "propertyCep", default, skip_serializing_if = "Option::is_none")]
    pub cep: Option<String>,
    #[serde(rename = "propertyCity", default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(rename = "propertyState", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integrity {
    #[serde(rename = "hash", default)]
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "ip", default, skip_serializing_if = "Option::is_none")]
    pub originating_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geolocation: Option<GeoLocation>,
}

/// Persisted shape of the plan's discount policy, kept next to the entries
/// so a plan can be regenerated with the policy that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSettings {
    pub discount_percent: Decimal,
    pub apply_to_total: bool,
    pub progressive: bool,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementRecord {
    #[serde(default = "legacy_schema_version")]
    pub schema_version: u32,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub contract_id: String,
    #[serde(flatten)]
    pub parties: Parties,
    #[serde(flatten)]
    pub property: Property,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debt_period: Option<String>,
    #[serde(flatten)]
    pub debt: DebtRecord,
    #[serde(default)]
    pub installment_plans: Vec<InstallmentPlanEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_settings: Option<PlanSettings>,
    #[serde(default)]
    pub payment_options: Vec<PaymentOption>,
    pub status: AgreementStatus,
    #[serde(flatten)]
    pub integrity: Integrity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_accepted_option: Option<String>,
}

fn legacy_schema_version() -> u32 {
    1
}
