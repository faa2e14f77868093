pub mod annuity;
pub mod builder;
pub mod calendar;
pub mod plan;

pub use annuity::{installment, term_for_installment, InstallmentSplit};
pub use builder::build_schedule;
pub use calendar::{AccrualWindow, BillingCalendar};
pub use plan::{PaymentPeriod, PaymentPlan};
