//! Views derived from the cached income and expense lists: the monthly summary and the calendar.

use crate::model::{Amount, Record};
use anyhow::Context;
use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A calendar month, written `YYYY-MM`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Month {
    first: NaiveDate,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|first| Self { first })
    }

    /// The month that contains `date`.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            first: date.with_day(1).unwrap_or(date),
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.first.year() && date.month() == self.first.month()
    }

    /// Every day of the month in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.first.iter_days().take_while(|d| self.contains(*d))
    }

    pub fn next(&self) -> Option<Month> {
        self.first
            .checked_add_months(Months::new(1))
            .map(|first| Self { first })
    }
}

impl Display for Month {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.first.format("%Y-%m"))
    }
}

impl FromStr for Month {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .with_context(|| format!("Expected a month like 2024-05, got '{s}'"))?;
        let year: i32 = year
            .parse()
            .with_context(|| format!("Bad year in month '{s}'"))?;
        let month: u32 = month
            .parse()
            .with_context(|| format!("Bad month in month '{s}'"))?;
        Month::new(year, month).with_context(|| format!("'{s}' is not a valid month"))
    }
}

impl Serialize for Month {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Month {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Month::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// The incomes and expenses of one month along with their totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthSummary {
    pub month: Month,
    pub incomes: Vec<Record>,
    pub expenses: Vec<Record>,
    pub income_total: Amount,
    pub expense_total: Amount,
    /// Income total minus expense total.
    pub balance: Amount,
}

impl MonthSummary {
    pub fn new<'a>(
        month: Month,
        incomes: impl IntoIterator<Item = &'a Record>,
        expenses: impl IntoIterator<Item = &'a Record>,
    ) -> Self {
        let incomes = in_month(month, incomes);
        let expenses = in_month(month, expenses);
        let income_total: Amount = incomes.iter().map(|r| r.amount).sum();
        let expense_total: Amount = expenses.iter().map(|r| r.amount).sum();
        Self {
            month,
            incomes,
            expenses,
            income_total,
            expense_total,
            balance: income_total - expense_total,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.incomes.is_empty() && self.expenses.is_empty()
    }
}

fn in_month<'a>(month: Month, records: impl IntoIterator<Item = &'a Record>) -> Vec<Record> {
    let mut found: Vec<Record> = records
        .into_iter()
        .filter(|r| month.contains(r.date))
        .cloned()
        .collect();
    found.sort_by_key(|r| (r.date, r.id));
    found
}

/// One day on the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub has_income: bool,
    pub has_expense: bool,
}

/// Marks which days of a month have at least one income and which have at least one expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarMonth {
    pub month: Month,
    pub days: Vec<CalendarDay>,
}

impl CalendarMonth {
    pub fn new<'a>(
        month: Month,
        incomes: impl IntoIterator<Item = &'a Record>,
        expenses: impl IntoIterator<Item = &'a Record>,
    ) -> Self {
        let income_dates: Vec<NaiveDate> = incomes.into_iter().map(|r| r.date).collect();
        let expense_dates: Vec<NaiveDate> = expenses.into_iter().map(|r| r.date).collect();
        let days = month
            .days()
            .map(|date| CalendarDay {
                date,
                has_income: income_dates.contains(&date),
                has_expense: expense_dates.contains(&date),
            })
            .collect();
        Self { month, days }
    }

    /// Renders a compact text calendar, one week per line starting on Monday. Days with income
    /// are marked `+`, days with expenses `-`, days with both `±`.
    pub fn render(&self) -> String {
        let mut out = String::from(" Mon  Tue  Wed  Thu  Fri  Sat  Sun\n");
        let offset = self.month.first_day().weekday().num_days_from_monday() as usize;
        out.push_str(&"     ".repeat(offset));
        for (ix, day) in self.days.iter().enumerate() {
            let mark = match (day.has_income, day.has_expense) {
                (true, true) => '±',
                (true, false) => '+',
                (false, true) => '-',
                (false, false) => ' ',
            };
            out.push_str(&format!(" {:>2}{mark} ", day.date.day()));
            if (ix + offset + 1) % 7 == 0 {
                out.push('\n');
            }
        }
        out.trim_end().to_string()
    }
}
