//! Staff positions, wage scales, salaries and payroll runs

pub mod calc;
pub mod model;
pub mod service;

pub use calc::{calculate_payroll, PayInputs, PayrollCalculation};
pub use model::{
    NewPeriod, NewPosition, NewSalary, NewWageScale, PayrollPeriod, PayrollPosition, PayrollRecord,
    PayrollSummary, PeriodStatus, RecordStatus, Salary, WageScale, WageType,
};
pub use service::{GenerationReport, PayrollService, SkippedUser};
