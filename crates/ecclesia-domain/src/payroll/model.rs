use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollPosition {
    pub id: String,
    pub church_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(PayrollPosition, "payrollPositions");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WageType {
    #[default]
    Salary,
    Hourly,
    Commission,
    Stipend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WageScale {
    pub id: String,
    pub church_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub wage_type: WageType,
    /// Monthly amount, hourly rate or flat stipend depending on the type
    pub amount: f64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours_per_week: Option<f64>,
    /// Percent of commission earned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commission_rate: Option<f64>,
    #[serde(default)]
    pub benefits: f64,
    #[serde(default)]
    pub deductions: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(WageScale, "wageScales");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Salary {
    pub id: String,
    pub church_id: String,
    pub user_id: String,
    pub position_id: String,
    pub wage_scale_id: String,
    pub start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(Salary, "salaries");

impl Salary {
    /// Whether the assignment covers any part of `[start, end]`
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_date <= end && self.end_date.map_or(true, |e| e >= start)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeriodStatus {
    #[default]
    Pending,
    Processing,
    Paid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollPeriod {
    pub id: String,
    pub church_id: String,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub pay_date: DateTime<Utc>,
    pub status: PeriodStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(PayrollPeriod, "payrollPeriods");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    #[default]
    Pending,
    Paid,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "PENDING",
            RecordStatus::Paid => "PAID",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollRecord {
    pub id: String,
    pub period_id: String,
    pub church_id: String,
    pub user_id: String,
    pub salary_id: String,
    pub gross_amount: f64,
    pub deductions: f64,
    pub net_amount: f64,
    pub status: RecordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(PayrollRecord, "payrollRecords");

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollSummary {
    pub total_records: usize,
    pub paid_records: usize,
    pub pending_records: usize,
    pub total_paid: f64,
    pub total_pending: f64,
}

impl PayrollSummary {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a PayrollRecord>) -> Self {
        records.into_iter().fold(Self::default(), |mut acc, record| {
            acc.total_records += 1;
            match record.status {
                RecordStatus::Paid => {
                    acc.paid_records += 1;
                    acc.total_paid += record.net_amount;
                }
                RecordStatus::Pending => {
                    acc.pending_records += 1;
                    acc.total_pending += record.net_amount;
                }
            }
            acc
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPosition {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub department_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWageScale {
    #[serde(default)]
    pub name: String,
    pub position_id: Option<String>,
    #[serde(rename = "type", default)]
    pub wage_type: WageType,
    #[serde(default)]
    pub amount: f64,
    pub currency: Option<String>,
    pub hours_per_week: Option<f64>,
    pub commission_rate: Option<f64>,
    #[serde(default)]
    pub benefits: f64,
    #[serde(default)]
    pub deductions: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSalary {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub position_id: String,
    #[serde(default)]
    pub wage_scale_id: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPeriod {
    #[serde(default)]
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub pay_date: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn record(status: RecordStatus, net: f64) -> PayrollRecord {
        let now = Utc::now();
        PayrollRecord {
            id: "r".into(),
            period_id: "p".into(),
            church_id: "c".into(),
            user_id: "u".into(),
            salary_id: "s".into(),
            gross_amount: net,
            deductions: 0.0,
            net_amount: net,
            status,
            payment_method: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_summary_splits_paid_and_pending() {
        let records = vec![
            record(RecordStatus::Paid, 100.0),
            record(RecordStatus::Pending, 40.0),
            record(RecordStatus::Paid, 10.5),
        ];
        let summary = PayrollSummary::from_records(&records);
        assert_eq!(summary.total_records, 3);
        assert_eq!(summary.paid_records, 2);
        assert_eq!(summary.pending_records, 1);
        assert_eq!(summary.total_paid, 110.5);
        assert_eq!(summary.total_pending, 40.0);
    }

    #[test]
    fn test_salary_overlap() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 3, 31, 0, 0, 0).unwrap();
        let now = Utc::now();
        let mut salary = Salary {
            id: "s".into(),
            church_id: "c".into(),
            user_id: "u".into(),
            position_id: "p".into(),
            wage_scale_id: "w".into(),
            start_date: start - Duration::days(30),
            end_date: None,
            created_at: now,
            updated_at: now,
        };
        assert!(salary.overlaps(start, end));

        salary.end_date = Some(start - Duration::days(1));
        assert!(!salary.overlaps(start, end));

        salary.start_date = end + Duration::days(1);
        salary.end_date = None;
        assert!(!salary.overlaps(start, end));
    }
}
