use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// How often a recurring income or expense repeats.
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceInterval {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

serde_plain::derive_display_from_serialize!(RecurrenceInterval);
serde_plain::derive_fromstr_from_deserialize!(RecurrenceInterval);

impl RecurrenceInterval {
    /// The date one interval after `date`. Monthly and yearly steps land on the last day of the
    /// target month when `date` does not exist there, e.g. Jan 31 + 1 month = Feb 28/29.
    /// Returns `None` only when the result would be out of range for `NaiveDate`.
    pub fn next_after(&self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            RecurrenceInterval::Daily => date.checked_add_days(Days::new(1)),
            RecurrenceInterval::Weekly => date.checked_add_days(Days::new(7)),
            RecurrenceInterval::Monthly => date.checked_add_months(Months::new(1)),
            RecurrenceInterval::Yearly => date.checked_add_months(Months::new(12)),
        }
    }
}
