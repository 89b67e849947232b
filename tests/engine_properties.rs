// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{DateTime, TimeZone, Utc};
use debtclip::engine::{
    DiscountPolicy, InstallmentPlan, build_installment_plan, compute_charges,
    discount_for_tier_count,
};
use debtclip::error::EngineError;
use debtclip::models::DebtRecord;
use proptest::prelude::*;
use rust_decimal::Decimal;

fn generated_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 30, 9, 0, 0).unwrap()
}

fn cents() -> impl Strategy<Value = Decimal> {
    (0i64..100_000_000).prop_map(|c| Decimal::new(c, 2))
}

fn rate() -> impl Strategy<Value = Decimal> {
    (0i64..=5_000).prop_map(|r| Decimal::new(r, 2))
}

fn percent() -> impl Strategy<Value = Decimal> {
    (0i64..=10_000).prop_map(|p| Decimal::new(p, 2))
}

fn tolerance() -> Decimal {
    Decimal::new(1, 2)
}

proptest! {
    #[test]
    fn total_is_principal_plus_flat_charges(p in cents(), i in rate(), pen in rate()) {
        let c = compute_charges(&DebtRecord::new(p, i, pen)).unwrap();
        let hundred = Decimal::ONE_HUNDRED;
        prop_assert_eq!(c.total_with_charges, p + p * i / hundred + p * pen / hundred);
    }

    #[test]
    fn undiscounted_plan_reconciles(p in cents(), i in rate(), pen in rate(), count in 1u32..=48) {
        let c = compute_charges(&DebtRecord::new(p, i, pen)).unwrap();
        let plan = build_installment_plan(&c, count, Decimal::ZERO, false, generated_at()).unwrap();
        prop_assert_eq!(plan.len(), count as usize);
        let total: Decimal = plan.iter().map(|e| e.base_value).sum();
        prop_assert!((total - c.total_with_charges).abs() <= tolerance());
    }

    #[test]
    fn tiers_never_increase(base in percent()) {
        let mut prev = discount_for_tier_count(1, base).unwrap().discount_percent;
        for n in 2..=12 {
            let cur = discount_for_tier_count(n, base).unwrap().discount_percent;
            prop_assert!(cur <= prev);
            prev = cur;
        }
        let beyond = discount_for_tier_count(13, base).unwrap().discount_percent;
        prop_assert!(beyond <= prev);
        for n in [14u32, 24, 60, 360] {
            prop_assert_eq!(discount_for_tier_count(n, base).unwrap().discount_percent, beyond);
        }
    }

    #[test]
    fn plan_generation_is_idempotent(
        p in cents(), i in rate(), pen in rate(), count in 1u32..=24, d in percent(), all in any::<bool>()
    ) {
        let c = compute_charges(&DebtRecord::new(p, i, pen)).unwrap();
        let a = build_installment_plan(&c, count, d, all, generated_at()).unwrap();
        let b = build_installment_plan(&c, count, d, all, generated_at()).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn interest_only_discount_never_touches_principal(
        p in cents(), i in rate(), pen in rate(), count in 1u32..=24, d in percent()
    ) {
        let c = compute_charges(&DebtRecord::new(p, i, pen)).unwrap();
        let share = c.interest_amount / Decimal::from(count);
        let plan = build_installment_plan(&c, count, d, false, generated_at()).unwrap();
        for e in &plan {
            prop_assert!(e.final_value + tolerance() >= e.base_value - share);
        }
    }

    #[test]
    fn discounted_total_never_exceeds_charges(
        p in cents(), i in rate(), pen in rate(), count in 1u32..=24, d in percent(), all in any::<bool>()
    ) {
        let c = compute_charges(&DebtRecord::new(p, i, pen)).unwrap();
        let policy = DiscountPolicy { discount_percent: d, apply_to_total: all, progressive: true };
        let plan = InstallmentPlan::generate(c, count, policy, generated_at()).unwrap();
        prop_assert!(plan.total_final().unwrap() <= c.total_with_charges + tolerance());
        let numbers: Vec<u32> = plan.entries.iter().map(|e| e.installment_number).collect();
        prop_assert_eq!(numbers, (1..=count).collect::<Vec<_>>());
        for w in plan.entries.windows(2) {
            prop_assert!(w[0].due_date < w[1].due_date);
        }
    }
}

#[test]
fn reference_scenario_single_installment() {
    let debt = DebtRecord::new(Decimal::new(600000, 2), Decimal::from(2), Decimal::from(10));
    let c = compute_charges(&debt).unwrap();
    assert_eq!(c.interest_amount, Decimal::from(120));
    assert_eq!(c.penalty_amount, Decimal::from(600));
    assert_eq!(c.total_with_charges, Decimal::from(6720));

    let policy = DiscountPolicy {
        discount_percent: Decimal::from(50),
        apply_to_total: false,
        progressive: true,
    };
    let one = InstallmentPlan::generate(c, 1, policy, generated_at()).unwrap();
    assert_eq!(one.entries[0].final_value, Decimal::from(6660));

    let two = InstallmentPlan::generate(c, 2, policy, generated_at()).unwrap();
    assert_eq!(two.entries[0].discount_percent, Decimal::from(40));
    assert_eq!(two.entries[0].base_value, Decimal::from(3360));
    assert!(two.entries.iter().all(|e| e.final_value == Decimal::from(3336)));
    assert_eq!(two.total_final().unwrap(), Decimal::from(6672));
}

#[test]
fn out_of_domain_input_is_rejected_not_clamped() {
    let c = compute_charges(&DebtRecord::new(Decimal::from(100), Decimal::ONE, Decimal::ONE)).unwrap();
    let err = build_installment_plan(&c, 0, Decimal::ZERO, false, generated_at()).unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
    assert!(build_installment_plan(&c, 1, Decimal::from(-5), false, generated_at()).is_err());
    assert!(build_installment_plan(&c, 1, Decimal::from(101), false, generated_at()).is_err());
    assert!(discount_for_tier_count(2, Decimal::from(-1)).is_err());
    assert!(compute_charges(&DebtRecord::new(Decimal::ONE, Decimal::from(-2), Decimal::ZERO)).is_err());
}
