use super::calc::{calculate_payroll, PayInputs};
use super::model::{
    NewPeriod, NewPosition, NewSalary, NewWageScale, PayrollPeriod, PayrollPosition, PayrollRecord,
    PayrollSummary, PeriodStatus, RecordStatus, Salary, WageScale,
};
use crate::access::AccessContext;
use crate::tenancy::User;
use chrono::{DateTime, Utc};
use ecclesia_auth::Permission;
use ecclesia_core::{new_id, AppError, AppResult};
use ecclesia_store::{Direction, DocumentStore, Query, Repository};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// A salaried user left out of a generation run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedUser {
    pub user_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub created: Vec<PayrollRecord>,
    pub skipped: Vec<SkippedUser>,
}

#[derive(Clone)]
pub struct PayrollService {
    positions: Repository<PayrollPosition>,
    scales: Repository<WageScale>,
    salaries: Repository<Salary>,
    periods: Repository<PayrollPeriod>,
    records: Repository<PayrollRecord>,
    users: Repository<User>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl PayrollService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            positions: Repository::new(Arc::clone(&store)),
            scales: Repository::new(Arc::clone(&store)),
            salaries: Repository::new(Arc::clone(&store)),
            periods: Repository::new(Arc::clone(&store)),
            records: Repository::new(Arc::clone(&store)),
            users: Repository::new(store),
        }
    }

    pub async fn list_positions(&self, ctx: &AccessContext) -> AppResult<Vec<PayrollPosition>> {
        ctx.require(Permission::ViewPayroll)?;
        Ok(self
            .positions
            .find_many(
                Query::church(ctx.church_id()?)
                    .filter("isActive", true)
                    .order_by("name", Direction::Asc),
            )
            .await?)
    }

    pub async fn create_position(&self, ctx: &AccessContext, input: NewPosition) -> AppResult<PayrollPosition> {
        ctx.require(Permission::ManagePayroll)?;
        let church_id = ctx.church_id()?;
        let name = input.name.trim();
        if name.is_empty() {
            return Err(AppError::invalid_field("name", "Name is required"));
        }
        let now = Utc::now();
        let position = PayrollPosition {
            id: new_id(),
            church_id: church_id.to_string(),
            name: name.to_string(),
            description: non_empty(input.description),
            department_id: non_empty(input.department_id),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.positions.save(&position).await?;
        Ok(position)
    }

    pub async fn list_wage_scales(&self, ctx: &AccessContext) -> AppResult<Vec<WageScale>> {
        ctx.require(Permission::ViewPayroll)?;
        Ok(self
            .scales
            .find_many(Query::church(ctx.church_id()?).order_by("name", Direction::Asc))
            .await?)
    }

    pub async fn create_wage_scale(&self, ctx: &AccessContext, input: NewWageScale) -> AppResult<WageScale> {
        ctx.require(Permission::ManagePayroll)?;
        let church_id = ctx.church_id()?;
        let name = input.name.trim();
        if name.is_empty() {
            return Err(AppError::invalid_field("name", "Name is required"));
        }
        if input.amount < 0.0 || input.benefits < 0.0 || input.deductions < 0.0 {
            return Err(AppError::invalid_field("amount", "Amounts cannot be negative"));
        }
        if input.commission_rate.is_some_and(|r| !(0.0..=100.0).contains(&r)) {
            return Err(AppError::invalid_field("commissionRate", "Commission rate must be between 0 and 100"));
        }
        let position_id = non_empty(input.position_id);
        if let Some(position_id) = position_id.as_deref() {
            self.tenant_position(church_id, position_id).await?;
        }

        let now = Utc::now();
        let scale = WageScale {
            id: new_id(),
            church_id: church_id.to_string(),
            position_id,
            name: name.to_string(),
            wage_type: input.wage_type,
            amount: input.amount,
            currency: non_empty(input.currency)
                .map(|c| c.to_uppercase())
                .unwrap_or_else(|| "NGN".to_string()),
            hours_per_week: input.hours_per_week,
            commission_rate: input.commission_rate,
            benefits: input.benefits,
            deductions: input.deductions,
            created_at: now,
            updated_at: now,
        };
        self.scales.save(&scale).await?;
        Ok(scale)
    }

    async fn tenant_position(&self, church_id: &str, id: &str) -> AppResult<PayrollPosition> {
        self.positions
            .find_by_id(id)
            .await?
            .filter(|p| p.church_id == church_id)
            .ok_or_else(|| AppError::invalid_field("positionId", "Invalid position"))
    }

    pub async fn assign_salary(&self, ctx: &AccessContext, input: NewSalary) -> AppResult<Salary> {
        ctx.require(Permission::ManagePayroll)?;
        let church_id = ctx.church_id()?;
        let member = self
            .users
            .find_by_id(&input.user_id)
            .await?
            .is_some_and(|u| u.belongs_to(church_id));
        if !member {
            return Err(AppError::not_found("User"));
        }
        self.tenant_position(church_id, &input.position_id).await?;
        let scale_ok = self
            .scales
            .find_by_id(&input.wage_scale_id)
            .await?
            .is_some_and(|s| s.church_id == church_id);
        if !scale_ok {
            return Err(AppError::invalid_field("wageScaleId", "Invalid wage scale"));
        }
        if input.end_date.is_some_and(|end| end < input.start_date) {
            return Err(AppError::invalid_field("endDate", "End date must be after start date"));
        }

        let now = Utc::now();
        let salary = Salary {
            id: new_id(),
            church_id: church_id.to_string(),
            user_id: input.user_id,
            position_id: input.position_id,
            wage_scale_id: input.wage_scale_id,
            start_date: input.start_date,
            end_date: input.end_date,
            created_at: now,
            updated_at: now,
        };
        self.salaries.save(&salary).await?;
        tracing::info!(church_id = %church_id, user_id = %salary.user_id, "salary assigned");
        Ok(salary)
    }

    pub async fn list_periods(&self, ctx: &AccessContext) -> AppResult<Vec<PayrollPeriod>> {
        ctx.require(Permission::ViewPayroll)?;
        Ok(self
            .periods
            .find_many(Query::church(ctx.church_id()?).order_by("startDate", Direction::Desc))
            .await?)
    }

    pub async fn create_period(&self, ctx: &AccessContext, input: NewPeriod) -> AppResult<PayrollPeriod> {
        ctx.require(Permission::ManagePayroll)?;
        let church_id = ctx.church_id()?;
        if input.end_date <= input.start_date {
            return Err(AppError::invalid_field("endDate", "End date must be after start date"));
        }
        let name = match input.name.trim() {
            "" => format!(
                "{} - {}",
                input.start_date.format("%Y-%m-%d"),
                input.end_date.format("%Y-%m-%d")
            ),
            name => name.to_string(),
        };
        let now = Utc::now();
        let period = PayrollPeriod {
            id: new_id(),
            church_id: church_id.to_string(),
            name,
            start_date: input.start_date,
            end_date: input.end_date,
            pay_date: input.pay_date.unwrap_or(input.end_date),
            status: PeriodStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.periods.save(&period).await?;
        Ok(period)
    }

    async fn tenant_period(&self, ctx: &AccessContext, period_id: &str) -> AppResult<PayrollPeriod> {
        let church_id = ctx.church_id()?;
        self.periods
            .find_by_id(period_id)
            .await?
            .filter(|p| p.church_id == church_id)
            .ok_or_else(|| AppError::not_found("Payroll period"))
    }

    /// Create a pending record for every user with a salary overlapping the
    /// period; users that already have a record are left alone
    ///
    /// Hourly and commission scales need per-user inputs; users whose inputs
    /// are missing are reported as skipped.
    pub async fn generate_records(
        &self,
        ctx: &AccessContext,
        period_id: &str,
        inputs: HashMap<String, PayInputs>,
    ) -> AppResult<GenerationReport> {
        ctx.require(Permission::ManagePayroll)?;
        let mut period = self.tenant_period(ctx, period_id).await?;
        let church_id = period.church_id.clone();

        let scales: HashMap<String, WageScale> = self
            .scales
            .find_many(Query::church(&church_id))
            .await?
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect();
        let existing = self
            .records
            .find_many(Query::new().filter("periodId", period.id.as_str()))
            .await?;

        // Most recent assignment per user wins
        let mut active: HashMap<String, Salary> = HashMap::new();
        for salary in self
            .salaries
            .find_many(Query::church(&church_id).order_by("startDate", Direction::Asc))
            .await?
            .into_iter()
            .filter(|s| s.overlaps(period.start_date, period.end_date))
        {
            active.insert(salary.user_id.clone(), salary);
        }
        let mut salaried: Vec<Salary> = active.into_values().collect();
        salaried.sort_by(|a, b| a.user_id.cmp(&b.user_id));

        let defaults = PayInputs::default();
        let mut report = GenerationReport {
            created: Vec::new(),
            skipped: Vec::new(),
        };
        for salary in salaried {
            if existing.iter().any(|r| r.user_id == salary.user_id) {
                continue;
            }
            let Some(scale) = scales.get(&salary.wage_scale_id) else {
                report.skipped.push(SkippedUser {
                    user_id: salary.user_id.clone(),
                    reason: "Salary configuration incomplete".to_string(),
                });
                continue;
            };
            let user_inputs = inputs.get(&salary.user_id).unwrap_or(&defaults);
            let calculation =
                match calculate_payroll(scale, period.start_date, period.end_date, user_inputs) {
                    Ok(calculation) => calculation,
                    Err(err) => {
                        report.skipped.push(SkippedUser {
                            user_id: salary.user_id.clone(),
                            reason: err.to_string(),
                        });
                        continue;
                    }
                };

            let now = Utc::now();
            let record = PayrollRecord {
                id: new_id(),
                period_id: period.id.clone(),
                church_id: church_id.clone(),
                user_id: salary.user_id.clone(),
                salary_id: salary.id.clone(),
                gross_amount: calculation.gross_amount,
                deductions: calculation.deductions,
                net_amount: calculation.net_amount,
                status: RecordStatus::Pending,
                payment_method: None,
                paid_at: None,
                created_at: now,
                updated_at: now,
            };
            self.records.save(&record).await?;
            report.created.push(record);
        }

        if !report.created.is_empty() && period.status == PeriodStatus::Pending {
            period.status = PeriodStatus::Processing;
            period.updated_at = Utc::now();
            self.periods.save(&period).await?;
        }
        tracing::info!(
            period_id = %period.id,
            created = report.created.len(),
            skipped = report.skipped.len(),
            "payroll records generated"
        );
        Ok(report)
    }

    pub async fn list_records(&self, ctx: &AccessContext, period_id: Option<&str>) -> AppResult<Vec<PayrollRecord>> {
        ctx.require(Permission::ViewPayroll)?;
        let mut query = Query::church(ctx.church_id()?);
        if let Some(period_id) = period_id.filter(|p| !p.is_empty()) {
            query = query.filter("periodId", period_id);
        }
        Ok(self.records.find_many(query.newest_first()).await?)
    }

    /// Mark a record paid; the period is paid once all its records are
    pub async fn mark_paid(
        &self,
        ctx: &AccessContext,
        record_id: &str,
        payment_method: Option<String>,
    ) -> AppResult<PayrollRecord> {
        ctx.require(Permission::ManagePayroll)?;
        let church_id = ctx.church_id()?;
        let mut record = self
            .records
            .find_by_id(record_id)
            .await?
            .filter(|r| r.church_id == church_id)
            .ok_or_else(|| AppError::not_found("Payroll record"))?;
        if record.status == RecordStatus::Paid {
            return Err(AppError::conflict("Payroll record already paid"));
        }
        let now = Utc::now();
        record.status = RecordStatus::Paid;
        record.payment_method = non_empty(payment_method);
        record.paid_at = Some(now);
        record.updated_at = now;
        self.records.save(&record).await?;

        let outstanding = self
            .records
            .count(
                Query::new()
                    .filter("periodId", record.period_id.as_str())
                    .filter("status", RecordStatus::Pending.as_str()),
            )
            .await?;
        if outstanding == 0 {
            if let Some(mut period) = self.periods.find_by_id(&record.period_id).await? {
                period.status = PeriodStatus::Paid;
                period.updated_at = now;
                self.periods.save(&period).await?;
            }
        }
        Ok(record)
    }

    /// Totals over periods intersecting `[start, end]`
    pub async fn summary(
        &self,
        ctx: &AccessContext,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> AppResult<PayrollSummary> {
        ctx.require(Permission::ViewPayroll)?;
        let church_id = ctx.church_id()?;
        let period_ids: Vec<String> = self
            .periods
            .find_many(Query::church(church_id))
            .await?
            .into_iter()
            .filter(|p| start.map_or(true, |s| p.end_date >= s) && end.map_or(true, |e| p.start_date <= e))
            .map(|p| p.id)
            .collect();
        let records = self.records.find_many(Query::church(church_id)).await?;
        Ok(PayrollSummary::from_records(
            records.iter().filter(|r| period_ids.contains(&r.period_id)),
        ))
    }
}
