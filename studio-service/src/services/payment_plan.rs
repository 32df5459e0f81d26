//! Installment schedule generation.
//!
//! Installment `k` (1-based) is due `k` periods after the start date. Each
//! due date is computed from the start date directly, so a plan starting on
//! the 31st stays on the last day of short months instead of drifting.
//! Amounts are truncated to cents and the final installment takes the
//! remainder, so the installments always add up to `total - down_payment`.

use crate::models::PlanFrequency;
use chrono::{Days, Months, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use service_core::error::AppError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("Installment count must be greater than zero")]
    InvalidCount,
    #[error("Plan total must be greater than zero")]
    InvalidTotal,
    #[error("Down payment must not be negative")]
    NegativeDownPayment,
    #[error("Down payment {down} must be less than the plan total {total}")]
    DownPaymentTooLarge { down: Decimal, total: Decimal },
    #[error("Financed amount {financed} is too small to split into {count} installments")]
    InstallmentTooSmall { financed: Decimal, count: i32 },
    #[error("Installment {0} falls outside the supported date range")]
    DateOutOfRange(i32),
}

impl From<PlanError> for AppError {
    fn from(err: PlanError) -> Self {
        AppError::BadRequest(anyhow::Error::new(err))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledInstallment {
    pub number: i32,
    pub amount: Decimal,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanSchedule {
    /// Collected when the plan is created; `None` when zero.
    pub down_payment: Option<Decimal>,
    pub installments: Vec<ScheduledInstallment>,
}

pub fn due_date(start: NaiveDate, frequency: PlanFrequency, number: i32) -> Option<NaiveDate> {
    let n = u32::try_from(number).ok()?;
    match frequency {
        PlanFrequency::Weekly => start.checked_add_days(Days::new(7 * u64::from(n))),
        PlanFrequency::Biweekly => start.checked_add_days(Days::new(14 * u64::from(n))),
        PlanFrequency::Monthly => start.checked_add_months(Months::new(n)),
    }
}

pub fn build_schedule(
    total: Decimal,
    down_payment: Decimal,
    count: i32,
    frequency: PlanFrequency,
    start: NaiveDate,
) -> Result<PlanSchedule, PlanError> {
    if count <= 0 {
        return Err(PlanError::InvalidCount);
    }
    if total <= Decimal::ZERO {
        return Err(PlanError::InvalidTotal);
    }
    if down_payment < Decimal::ZERO {
        return Err(PlanError::NegativeDownPayment);
    }
    if down_payment >= total {
        return Err(PlanError::DownPaymentTooLarge {
            down: down_payment,
            total,
        });
    }

    let financed = total - down_payment;
    let base = (financed / Decimal::from(count))
        .round_dp_with_strategy(2, RoundingStrategy::ToZero);
    if base == Decimal::ZERO {
        return Err(PlanError::InstallmentTooSmall { financed, count });
    }
    let last = financed - base * Decimal::from(count - 1);

    let installments = (1..=count)
        .map(|number| {
            let due_date =
                due_date(start, frequency, number).ok_or(PlanError::DateOutOfRange(number))?;
            let amount = if number == count { last } else { base };
            Ok(ScheduledInstallment {
                number,
                amount,
                due_date,
            })
        })
        .collect::<Result<Vec<_>, PlanError>>()?;

    Ok(PlanSchedule {
        down_payment: (down_payment > Decimal::ZERO).then_some(down_payment),
        installments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn three_monthly_installments_of_one_hundred() {
        let schedule = build_schedule(
            Decimal::new(300, 0),
            Decimal::ZERO,
            3,
            PlanFrequency::Monthly,
            date(2026, 1, 15),
        )
        .unwrap();

        assert_eq!(schedule.down_payment, None);
        let amounts: Vec<_> = schedule.installments.iter().map(|i| i.amount).collect();
        assert_eq!(amounts, vec![Decimal::new(100, 0); 3]);
        let dates: Vec<_> = schedule.installments.iter().map(|i| i.due_date).collect();
        assert_eq!(
            dates,
            vec![date(2026, 2, 15), date(2026, 3, 15), date(2026, 4, 15)]
        );
    }

    #[test]
    fn last_installment_absorbs_rounding() {
        let schedule = build_schedule(
            Decimal::new(100, 0),
            Decimal::ZERO,
            3,
            PlanFrequency::Weekly,
            date(2026, 1, 1),
        )
        .unwrap();

        let amounts: Vec<_> = schedule.installments.iter().map(|i| i.amount).collect();
        assert_eq!(
            amounts,
            vec![
                Decimal::new(3333, 2),
                Decimal::new(3333, 2),
                Decimal::new(3334, 2)
            ]
        );
        let sum: Decimal = amounts.iter().sum();
        assert_eq!(sum, Decimal::new(100, 0));
    }

    #[test]
    fn down_payment_reduces_financed_amount() {
        let schedule = build_schedule(
            Decimal::new(250, 0),
            Decimal::new(50, 0),
            4,
            PlanFrequency::Biweekly,
            date(2026, 3, 2),
        )
        .unwrap();

        assert_eq!(schedule.down_payment, Some(Decimal::new(50, 0)));
        assert!(schedule
            .installments
            .iter()
            .all(|i| i.amount == Decimal::new(50, 0)));
        assert_eq!(schedule.installments[0].due_date, date(2026, 3, 16));
        assert_eq!(schedule.installments[3].due_date, date(2026, 4, 27));
    }

    #[test]
    fn monthly_dates_clamp_to_month_end_without_drift() {
        let schedule = build_schedule(
            Decimal::new(300, 0),
            Decimal::ZERO,
            3,
            PlanFrequency::Monthly,
            date(2026, 1, 31),
        )
        .unwrap();

        let dates: Vec<_> = schedule.installments.iter().map(|i| i.due_date).collect();
        assert_eq!(
            dates,
            vec![date(2026, 2, 28), date(2026, 3, 31), date(2026, 4, 30)]
        );
    }

    #[test]
    fn rejects_invalid_input() {
        let start = date(2026, 1, 1);
        let total = Decimal::new(100, 0);

        assert_eq!(
            build_schedule(total, Decimal::ZERO, 0, PlanFrequency::Monthly, start),
            Err(PlanError::InvalidCount)
        );
        assert_eq!(
            build_schedule(total, total, 2, PlanFrequency::Monthly, start),
            Err(PlanError::DownPaymentTooLarge {
                down: total,
                total
            })
        );
        assert_eq!(
            build_schedule(total, Decimal::new(-1, 0), 2, PlanFrequency::Monthly, start),
            Err(PlanError::NegativeDownPayment)
        );
        assert_eq!(
            build_schedule(Decimal::ZERO, Decimal::ZERO, 2, PlanFrequency::Monthly, start),
            Err(PlanError::InvalidTotal)
        );
    }

    #[test]
    fn rejects_installments_below_one_cent() {
        let result = build_schedule(
            Decimal::new(2, 2),
            Decimal::ZERO,
            3,
            PlanFrequency::Monthly,
            date(2026, 1, 1),
        );

        assert_eq!(
            result,
            Err(PlanError::InstallmentTooSmall {
                financed: Decimal::new(2, 2),
                count: 3
            })
        );
    }

    #[test]
    fn one_cent_per_installment_is_enough() {
        let schedule = build_schedule(
            Decimal::new(3, 2),
            Decimal::ZERO,
            3,
            PlanFrequency::Weekly,
            date(2026, 1, 1),
        )
        .unwrap();

        assert!(schedule
            .installments
            .iter()
            .all(|i| i.amount == Decimal::new(1, 2)));
    }
}
