//! Pay computation for a single salary over a period

use super::model::{WageScale, WageType};
use chrono::{DateTime, Utc};
use ecclesia_core::time::days_in_month;
use ecclesia_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Per-period figures supplied by the payroll manager
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayInputs {
    pub hours_worked: Option<f64>,
    pub commission_earned: Option<f64>,
    #[serde(default)]
    pub bonuses: f64,
    #[serde(default)]
    pub allowances: f64,
    #[serde(default)]
    pub deductions: f64,
    #[serde(default)]
    pub taxes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollCalculation {
    pub base_amount: f64,
    pub gross_amount: f64,
    /// Manual deductions, scale deductions and taxes combined
    pub deductions: f64,
    pub net_amount: f64,
    pub bonuses: f64,
    pub allowances: f64,
    pub taxes: f64,
}

/// Whole days covered by `[start, end]`, rounded up
fn days_in_period(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let seconds = (end - start).num_seconds().max(0) as f64;
    (seconds / 86_400.0).ceil()
}

pub fn calculate_payroll(
    scale: &WageScale,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    inputs: &PayInputs,
) -> AppResult<PayrollCalculation> {
    let base_amount = match scale.wage_type {
        WageType::Salary => {
            scale.amount / f64::from(days_in_month(end)) * days_in_period(start, end)
        }
        WageType::Hourly => {
            let hours = inputs
                .hours_worked
                .filter(|h| *h > 0.0)
                .ok_or_else(|| AppError::invalid_field("hoursWorked", "Hours worked required for hourly workers"))?;
            scale.amount * hours
        }
        WageType::Commission => {
            let earned = inputs.commission_earned.ok_or_else(|| {
                AppError::invalid_field(
                    "commissionEarned",
                    "Commission earned required for commission-based workers",
                )
            })?;
            match scale.commission_rate.filter(|r| *r > 0.0) {
                Some(rate) => earned * rate / 100.0,
                None => earned,
            }
        }
        WageType::Stipend => scale.amount,
    };

    let gross_amount = base_amount + inputs.bonuses + inputs.allowances + scale.benefits;
    let deductions = inputs.deductions + scale.deductions + inputs.taxes;
    Ok(PayrollCalculation {
        base_amount,
        gross_amount,
        deductions,
        net_amount: gross_amount - deductions,
        bonuses: inputs.bonuses,
        allowances: inputs.allowances,
        taxes: inputs.taxes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scale(wage_type: WageType, amount: f64) -> WageScale {
        let now = Utc::now();
        WageScale {
            id: "w1".into(),
            church_id: "c1".into(),
            position_id: None,
            name: "Scale".into(),
            wage_type,
            amount,
            currency: "NGN".into(),
            hours_per_week: None,
            commission_rate: None,
            benefits: 0.0,
            deductions: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    fn april() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 4, 16, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_salary_is_prorated_by_days() {
        let (start, end) = april();
        let calc = calculate_payroll(&scale(WageType::Salary, 3000.0), start, end, &PayInputs::default()).unwrap();
        assert_eq!(calc.base_amount, 1500.0);
        assert_eq!(calc.net_amount, 1500.0);
    }

    #[test]
    fn test_hourly_requires_hours() {
        let (start, end) = april();
        let hourly = scale(WageType::Hourly, 12.5);
        let err = calculate_payroll(&hourly, start, end, &PayInputs::default()).unwrap_err();
        assert_eq!(err.status_code(), 400);

        let inputs = PayInputs {
            hours_worked: Some(10.0),
            ..Default::default()
        };
        assert_eq!(calculate_payroll(&hourly, start, end, &inputs).unwrap().base_amount, 125.0);
    }

    #[test]
    fn test_commission_applies_rate() {
        let (start, end) = april();
        let mut commission = scale(WageType::Commission, 0.0);
        assert!(calculate_payroll(&commission, start, end, &PayInputs::default()).is_err());

        commission.commission_rate = Some(10.0);
        let inputs = PayInputs {
            commission_earned: Some(2000.0),
            ..Default::default()
        };
        assert_eq!(calculate_payroll(&commission, start, end, &inputs).unwrap().base_amount, 200.0);
    }

    #[test]
    fn test_gross_and_net() {
        let (start, end) = april();
        let mut stipend = scale(WageType::Stipend, 500.0);
        stipend.benefits = 50.0;
        stipend.deductions = 20.0;
        let inputs = PayInputs {
            bonuses: 100.0,
            allowances: 25.0,
            deductions: 30.0,
            taxes: 45.0,
            ..Default::default()
        };
        let calc = calculate_payroll(&stipend, start, end, &inputs).unwrap();
        assert_eq!(calc.gross_amount, 675.0);
        assert_eq!(calc.deductions, 95.0);
        assert_eq!(calc.net_amount, 580.0);
    }
}
