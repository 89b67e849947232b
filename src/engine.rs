// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Agreement valuation engine.
//!
//! Pure functions from a [`DebtRecord`] and an installment policy to charges,
//! discount tiers, installment plans and reconciled summaries. Every caller
//! (simulation preview, planner, ledger export, agreement view) goes through
//! these functions so totals never diverge between them. Amounts are kept
//! unrounded; rounding only happens when formatting for display.

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{EngineError, Result, invalid};
use crate::models::{
    AgreementRecord, DebtRecord, InstallmentPlanEntry, PaymentMethod, PlanSettings,
};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Hours between plan generation and the first due date.
pub const FIRST_DUE_AFTER_HOURS: i64 = 48;

/// Slack allowed when comparing sums that went through inexact division.
pub const RECONCILE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeBreakdown {
    pub principal: Decimal,
    pub interest_amount: Decimal,
    pub penalty_amount: Decimal,
    pub total_with_charges: Decimal,
}

fn ensure_non_negative(v: Decimal, field: &str) -> Result<()> {
    if v < Decimal::ZERO {
        return Err(invalid(format!("{} must not be negative, got {}", field, v)));
    }
    Ok(())
}

fn ensure_percent(v: Decimal, field: &str) -> Result<()> {
    if v < Decimal::ZERO || v > HUNDRED {
        return Err(invalid(format!("{} must be within [0, 100], got {}", field, v)));
    }
    Ok(())
}

fn overflow(what: &str) -> EngineError {
    invalid(format!("{} overflows the decimal range", what))
}

/// `value × percent / 100`; overflow is reported as invalid input.
fn percent_of(value: Decimal, percent: Decimal, what: &str) -> Result<Decimal> {
    value
        .checked_mul(percent)
        .and_then(|v| v.checked_div(HUNDRED))
        .ok_or_else(|| overflow(what))
}

pub(crate) fn checked_sum<I>(values: I, what: &str) -> Result<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    values.into_iter().try_fold(Decimal::ZERO, |acc, v| {
        acc.checked_add(v).ok_or_else(|| overflow(what))
    })
}

fn ensure_count(count: u32) -> Result<()> {
    if count == 0 {
        return Err(invalid("installment count must be at least 1"));
    }
    Ok(())
}

/// Interest and penalty are flat, simple rates applied once to the principal.
pub fn compute_charges(debt: &DebtRecord) -> Result<ChargeBreakdown> {
    ensure_non_negative(debt.principal, "principal")?;
    ensure_non_negative(debt.interest_rate_percent, "interest rate")?;
    ensure_non_negative(debt.penalty_rate_percent, "penalty rate")?;

    let interest_amount = percent_of(debt.principal, debt.interest_rate_percent, "interest amount")?;
    let penalty_amount = percent_of(debt.principal, debt.penalty_rate_percent, "penalty amount")?;
    let total_with_charges = checked_sum(
        [debt.principal, interest_amount, penalty_amount],
        "total with charges",
    )?;
    Ok(ChargeBreakdown {
        principal: debt.principal,
        interest_amount,
        penalty_amount,
        total_with_charges,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountTier {
    pub installment_count: u32,
    pub multiplier_percent: u32,
    pub discount_percent: Decimal,
}

/// Share of the base discount kept at a given installment count.
pub fn tier_multiplier_percent(installment_count: u32) -> u32 {
    match installment_count {
        0 | 1 => 100,
        2 => 80,
        3 => 60,
        4 => 50,
        5 => 40,
        6 => 30,
        7..=12 => 20,
        _ => 10,
    }
}

pub fn discount_for_tier_count(
    installment_count: u32,
    base_discount_percent: Decimal,
) -> Result<DiscountTier> {
    ensure_count(installment_count)?;
    ensure_percent(base_discount_percent, "base discount percent")?;

    let multiplier_percent = tier_multiplier_percent(installment_count);
    let discount_percent = percent_of(
        base_discount_percent,
        Decimal::from(multiplier_percent),
        "tier discount",
    )?
    .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
    .clamp(Decimal::ZERO, HUNDRED);
    Ok(DiscountTier {
        installment_count,
        multiplier_percent,
        discount_percent,
    })
}

/// Discount taken from one installment. With `apply_to_total` the whole
/// installment is the base; otherwise only its share of the interest.
fn discount_amount(
    base_value: Decimal,
    discount_percent: Decimal,
    interest_share: Decimal,
    apply_to_total: bool,
) -> Result<Decimal> {
    let discount_base = if apply_to_total { base_value } else { interest_share };
    percent_of(discount_base, discount_percent, "discount amount")
}

fn final_value(base_value: Decimal, discount: Decimal) -> Decimal {
    (base_value - discount).max(Decimal::ZERO)
}

pub fn first_due_date(generated_at: DateTime<Utc>) -> NaiveDate {
    (generated_at + Duration::hours(FIRST_DUE_AFTER_HOURS)).date_naive()
}

/// `offset` calendar months after `first`, day-of-month clamped to the
/// target month's length.
pub fn due_date_after(first: NaiveDate, offset: u32) -> Result<NaiveDate> {
    first
        .checked_add_months(Months::new(offset))
        .ok_or_else(|| invalid(format!("due date {} months after {} is out of range", offset, first)))
}

pub fn build_installment_plan(
    charges: &ChargeBreakdown,
    count: u32,
    discount_percent: Decimal,
    apply_to_total: bool,
    generated_at: DateTime<Utc>,
) -> Result<Vec<InstallmentPlanEntry>> {
    ensure_count(count)?;
    ensure_percent(discount_percent, "discount percent")?;
    ensure_non_negative(charges.total_with_charges, "total with charges")?;
    ensure_non_negative(charges.interest_amount, "interest amount")?;

    let divisor = Decimal::from(count);
    let base_value = charges.total_with_charges / divisor;
    let interest_share = charges.interest_amount / divisor;
    let discount = discount_amount(base_value, discount_percent, interest_share, apply_to_total)?;
    let first = first_due_date(generated_at);

    (0..count)
        .map(|i| -> Result<InstallmentPlanEntry> {
            Ok(InstallmentPlanEntry {
                installment_number: i + 1,
                base_value,
                discount_percent,
                due_date: due_date_after(first, i)?,
                final_value: final_value(base_value, discount),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountPolicy {
    /// Base percent; scaled by [`discount_for_tier_count`] when `progressive`.
    pub discount_percent: Decimal,
    pub apply_to_total: bool,
    pub progressive: bool,
}

impl Default for DiscountPolicy {
    fn default() -> Self {
        Self {
            discount_percent: Decimal::ZERO,
            apply_to_total: false,
            progressive: true,
        }
    }
}

impl DiscountPolicy {
    pub fn effective_percent(&self, count: u32) -> Result<Decimal> {
        if self.progressive {
            Ok(discount_for_tier_count(count, self.discount_percent)?.discount_percent)
        } else {
            ensure_count(count)?;
            ensure_percent(self.discount_percent, "discount percent")?;
            Ok(self.discount_percent)
        }
    }
}

/// A generated plan together with everything needed to regenerate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentPlan {
    pub charges: ChargeBreakdown,
    pub policy: DiscountPolicy,
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<InstallmentPlanEntry>,
}

impl InstallmentPlan {
    pub fn generate(
        charges: ChargeBreakdown,
        count: u32,
        policy: DiscountPolicy,
        generated_at: DateTime<Utc>,
    ) -> Result<Self> {
        let percent = policy.effective_percent(count)?;
        let entries =
            build_installment_plan(&charges, count, percent, policy.apply_to_total, generated_at)?;
        Ok(Self {
            charges,
            policy,
            generated_at,
            entries,
        })
    }

    /// Rehydrates a stored plan for an agreement.
    pub fn from_record(record: &AgreementRecord) -> Result<Option<Self>> {
        let Some(settings) = record.plan_settings.as_ref() else {
            return Ok(None);
        };
        Ok(Some(Self {
            charges: compute_charges(&record.debt)?,
            policy: DiscountPolicy {
                discount_percent: settings.discount_percent,
                apply_to_total: settings.apply_to_total,
                progressive: settings.progressive,
            },
            generated_at: settings.generated_at,
            entries: record.installment_plans.clone(),
        }))
    }

    pub fn settings(&self) -> PlanSettings {
        PlanSettings {
            discount_percent: self.policy.discount_percent,
            apply_to_total: self.policy.apply_to_total,
            progressive: self.policy.progressive,
            generated_at: self.generated_at,
        }
    }

    pub fn total_base(&self) -> Result<Decimal> {
        checked_sum(self.entries.iter().map(|e| e.base_value), "plan base total")
    }

    pub fn total_final(&self) -> Result<Decimal> {
        checked_sum(self.entries.iter().map(|e| e.final_value), "plan final total")
    }

    fn interest_share(&self) -> Decimal {
        if self.entries.is_empty() {
            return Decimal::ZERO;
        }
        self.charges.interest_amount / Decimal::from(self.entries.len() as u64)
    }

    fn entry_index(&self, index: usize) -> Result<usize> {
        if index >= self.entries.len() {
            return Err(invalid(format!(
                "installment index {} out of range (plan has {})",
                index,
                self.entries.len()
            )));
        }
        Ok(index)
    }
}

/// Regenerates the whole plan for `new_count`; manual edits are discarded.
pub fn redistribute(plan: &InstallmentPlan, new_count: u32) -> Result<InstallmentPlan> {
    InstallmentPlan::generate(plan.charges, new_count, plan.policy, plan.generated_at)
}

pub fn add_installment(plan: &InstallmentPlan) -> Result<InstallmentPlan> {
    let count = u32::try_from(plan.entries.len() + 1)
        .map_err(|_| invalid("installment count overflow"))?;
    redistribute(plan, count)
}

/// Drops one entry and renumbers the rest without touching their values.
pub fn remove_installment(plan: &InstallmentPlan, index: usize) -> Result<InstallmentPlan> {
    let index = plan.entry_index(index)?;
    if plan.entries.len() == 1 {
        return Err(invalid("a plan must keep at least one installment"));
    }
    let mut next = plan.clone();
    next.entries.remove(index);
    for (i, entry) in next.entries.iter_mut().enumerate() {
        entry.installment_number = i as u32 + 1;
    }
    Ok(next)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideField {
    Value,
    Discount,
}

impl FromStr for OverrideField {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "value" => Ok(OverrideField::Value),
            "discount" => Ok(OverrideField::Discount),
            other => Err(invalid(format!("unknown field '{}' (use value|discount)", other))),
        }
    }
}

/// Edits one entry and recomputes only its final value. The plan is not
/// rebalanced and its totals are not re-validated; see [`validate_plan`].
pub fn apply_manual_override(
    plan: &InstallmentPlan,
    index: usize,
    field: OverrideField,
    new_value: Decimal,
) -> Result<InstallmentPlan> {
    let index = plan.entry_index(index)?;
    match field {
        OverrideField::Value => ensure_non_negative(new_value, "installment value")?,
        OverrideField::Discount => ensure_percent(new_value, "discount percent")?,
    }

    let interest_share = plan.interest_share();
    let mut next = plan.clone();
    let entry = &mut next.entries[index];
    match field {
        OverrideField::Value => entry.base_value = new_value,
        OverrideField::Discount => entry.discount_percent = new_value,
    }
    let discount = discount_amount(
        entry.base_value,
        entry.discount_percent,
        interest_share,
        plan.policy.apply_to_total,
    )?;
    entry.final_value = final_value(entry.base_value, discount);
    // totals must stay representable for summaries and payment options
    next.total_base()?;
    next.total_final()?;
    Ok(next)
}

pub fn reschedule(plan: &InstallmentPlan, index: usize, due_date: NaiveDate) -> Result<InstallmentPlan> {
    let index = plan.entry_index(index)?;
    let mut next = plan.clone();
    next.entries[index].due_date = due_date;
    Ok(next)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    Empty,
    NonContiguousNumbering {
        position: usize,
        expected: u32,
        found: u32,
    },
    FinalExceedsBase {
        installment_number: u32,
    },
    TotalExceedsCharges {
        total_final: Decimal,
        total_with_charges: Decimal,
    },
    BaseSumMismatch {
        total_base: Decimal,
        total_with_charges: Decimal,
    },
    DiscountEatsPrincipal {
        installment_number: u32,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Empty => write!(f, "plan has no installments"),
            Violation::NonContiguousNumbering {
                position,
                expected,
                found,
            } => write!(
                f,
                "installment at position {} is numbered {} (expected {})",
                position, found, expected
            ),
            Violation::FinalExceedsBase { installment_number } => write!(
                f,
                "installment {} has a final value above its base value",
                installment_number
            ),
            Violation::TotalExceedsCharges {
                total_final,
                total_with_charges,
            } => write!(
                f,
                "final total {:.2} exceeds total with charges {:.2}",
                total_final, total_with_charges
            ),
            Violation::BaseSumMismatch {
                total_base,
                total_with_charges,
            } => write!(
                f,
                "installment values sum to {:.2} but total with charges is {:.2}",
                total_base, total_with_charges
            ),
            Violation::DiscountEatsPrincipal { installment_number } => write!(
                f,
                "installment {} discounts more than its share of interest",
                installment_number
            ),
        }
    }
}

fn saturating_sum(values: impl Iterator<Item = Decimal>) -> Decimal {
    values.fold(Decimal::ZERO, |acc, v| acc.saturating_add(v))
}

/// Strict check of a plan against the charges it was built from. An empty
/// result means every invariant holds.
pub fn validate_plan(entries: &[InstallmentPlanEntry], charges: &ChargeBreakdown) -> Vec<Violation> {
    if entries.is_empty() {
        return vec![Violation::Empty];
    }

    let mut violations = Vec::new();
    let interest_share = charges.interest_amount / Decimal::from(entries.len() as u64);
    for (position, entry) in entries.iter().enumerate() {
        let expected = position as u32 + 1;
        if entry.installment_number != expected {
            violations.push(Violation::NonContiguousNumbering {
                position,
                expected,
                found: entry.installment_number,
            });
        }
        if entry.final_value > entry.base_value {
            violations.push(Violation::FinalExceedsBase {
                installment_number: entry.installment_number,
            });
        }
        if entry.base_value.saturating_sub(entry.final_value)
            > interest_share.saturating_add(RECONCILE_TOLERANCE)
        {
            violations.push(Violation::DiscountEatsPrincipal {
                installment_number: entry.installment_number,
            });
        }
    }

    let total_final = saturating_sum(entries.iter().map(|e| e.final_value));
    if total_final > charges.total_with_charges.saturating_add(RECONCILE_TOLERANCE) {
        violations.push(Violation::TotalExceedsCharges {
            total_final,
            total_with_charges: charges.total_with_charges,
        });
    }
    let total_base = saturating_sum(entries.iter().map(|e| e.base_value));
    if total_base.saturating_sub(charges.total_with_charges).abs() > RECONCILE_TOLERANCE {
        violations.push(Violation::BaseSumMismatch {
            total_base,
            total_with_charges: charges.total_with_charges,
        });
    }
    violations
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementSummary {
    pub charges: ChargeBreakdown,
    pub discount_percent: Decimal,
    pub discount_amount: Decimal,
    pub total_final: Decimal,
    pub savings: Decimal,
}

/// Reconciled totals for an agreement. Without a plan the debtor owes the
/// full total with charges.
pub fn summarize(debt: &DebtRecord, entries: &[InstallmentPlanEntry]) -> Result<AgreementSummary> {
    let charges = compute_charges(debt)?;
    if entries.is_empty() {
        return Ok(AgreementSummary {
            charges,
            discount_percent: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            total_final: charges.total_with_charges,
            savings: Decimal::ZERO,
        });
    }

    let total_final = checked_sum(entries.iter().map(|e| e.final_value), "final total")?;
    let discount_amount = charges
        .total_with_charges
        .checked_sub(total_final)
        .ok_or_else(|| overflow("discount amount"))?;
    let discount_percent = if charges.total_with_charges > Decimal::ZERO {
        discount_amount
            .checked_div(charges.total_with_charges)
            .and_then(|ratio| ratio.checked_mul(HUNDRED))
            .ok_or_else(|| overflow("discount percent"))?
    } else {
        Decimal::ZERO
    };
    Ok(AgreementSummary {
        charges,
        discount_percent,
        discount_amount,
        total_final,
        savings: discount_amount,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentSummary {
    pub installment_number: u32,
    pub base_value: Decimal,
    pub discount_percent: Decimal,
    pub discount_amount: Decimal,
    pub final_value: Decimal,
    pub due_date: NaiveDate,
}

pub fn installment_summary(entries: &[InstallmentPlanEntry]) -> Vec<InstallmentSummary> {
    entries
        .iter()
        .map(|e| InstallmentSummary {
            installment_number: e.installment_number,
            base_value: e.base_value,
            discount_percent: e.discount_percent,
            discount_amount: e.base_value.saturating_sub(e.final_value),
            final_value: e.final_value,
            due_date: e.due_date,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSummary {
    pub method: PaymentMethod,
    pub method_label: String,
    pub installments: usize,
    pub calculation: AgreementSummary,
    pub installment_details: Vec<InstallmentSummary>,
}

/// Tenant-facing view of how the agreement will be paid. Defaults to PIX
/// when no payment option was chosen.
pub fn payment_summary(record: &AgreementRecord) -> Result<Option<PaymentSummary>> {
    if record.installment_plans.is_empty() {
        return Ok(None);
    }
    let method = record
        .payment_options
        .first()
        .map(|o| o.method)
        .unwrap_or(PaymentMethod::Pix);
    Ok(Some(PaymentSummary {
        method,
        method_label: method.label().to_string(),
        installments: record.installment_plans.len(),
        calculation: summarize(&record.debt, &record.installment_plans)?,
        installment_details: installment_summary(&record.installment_plans),
    }))
}
