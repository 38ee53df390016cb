//! Types that represent the core data model, such as `Record` and `Category`.
mod amount;
mod category;
mod record;
mod recurrence;
mod summary;
mod user;

pub use amount::{Amount, AmountError};
pub use category::{Category, RecordKind};
pub use record::{NewRecord, Record, RecordUpdate};
pub use recurrence::RecurrenceInterval;
pub use summary::{CalendarDay, CalendarMonth, Month, MonthSummary};
pub use user::{Credentials, Registration, User};
