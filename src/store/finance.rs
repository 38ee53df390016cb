//! The finance slice: cached incomes, expenses and categories.
//!
//! The cache mirrors the server without versioning. Every mutation the server confirms is
//! patched into the cached lists in place from the record the server echoes back.

use crate::model::{Category, Record, RecordKind};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

/// Actions that change the finance slice.
#[derive(Debug, Clone, PartialEq)]
pub enum FinanceAction {
    /// A request was started.
    Pending,
    /// A list was fetched. With `date: None` the full list is replaced, otherwise the
    /// date-filtered list for `date` is replaced and `date` becomes the selected date.
    Fetched {
        kind: RecordKind,
        date: Option<NaiveDate>,
        records: Vec<Record>,
    },
    /// The server created `record`.
    Created { kind: RecordKind, record: Record },
    /// The server updated `record`.
    Updated { kind: RecordKind, record: Record },
    /// The server deleted the record with `id`.
    Deleted { kind: RecordKind, id: u64 },
    CategoriesFetched(Vec<Category>),
    /// Selects the date that the date-filtered lists refer to.
    DateSelected(NaiveDate),
    /// A request failed; holds the server's error payload.
    Rejected(Value),
    /// Drops all cached data.
    Reset,
}

/// The cached lists of one kind of record.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RecordLists {
    /// Everything fetched without a date filter.
    all: Vec<Record>,
    /// The records on the selected date.
    on_date: Vec<Record>,
}

impl RecordLists {
    pub fn all(&self) -> &[Record] {
        &self.all
    }

    pub fn on_date(&self) -> &[Record] {
        &self.on_date
    }

    fn remove(&mut self, id: u64) {
        self.all.retain(|r| r.id != id);
        self.on_date.retain(|r| r.id != id);
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct FinanceState {
    incomes: RecordLists,
    expenses: RecordLists,
    selected_date: Option<NaiveDate>,
    categories: Vec<Category>,
    loading: bool,
    error: Option<Value>,
}

impl FinanceState {
    pub fn lists(&self, kind: RecordKind) -> &RecordLists {
        match kind {
            RecordKind::Income => &self.incomes,
            RecordKind::Expense => &self.expenses,
        }
    }

    fn lists_mut(&mut self, kind: RecordKind) -> &mut RecordLists {
        match kind {
            RecordKind::Income => &mut self.incomes,
            RecordKind::Expense => &mut self.expenses,
        }
    }

    pub fn incomes(&self) -> &[Record] {
        self.incomes.all()
    }

    pub fn expenses(&self) -> &[Record] {
        self.expenses.all()
    }

    pub fn selected_date(&self) -> Option<NaiveDate> {
        self.selected_date
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Categories usable for records of `kind`.
    pub fn categories_of(&self, kind: RecordKind) -> impl Iterator<Item = &Category> {
        self.categories.iter().filter(move |c| c.kind == kind)
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&Value> {
        self.error.as_ref()
    }

    fn select_date(&mut self, date: NaiveDate) {
        if self.selected_date != Some(date) {
            self.selected_date = Some(date);
            self.incomes.on_date.clear();
            self.expenses.on_date.clear();
        }
    }

    fn is_selected(&self, date: NaiveDate) -> bool {
        self.selected_date == Some(date)
    }

    pub fn reduce(&mut self, action: FinanceAction) {
        match action {
            FinanceAction::Pending => {
                self.loading = true;
                self.error = None;
            }
            FinanceAction::Fetched {
                kind,
                date,
                records,
            } => {
                self.loading = false;
                match date {
                    None => self.lists_mut(kind).all = records,
                    Some(date) => {
                        self.select_date(date);
                        self.lists_mut(kind).on_date = records;
                    }
                }
            }
            FinanceAction::Created { kind, record } => {
                self.loading = false;
                let on_selected = self.is_selected(record.date);
                let lists = self.lists_mut(kind);
                if on_selected {
                    lists.on_date.push(record.clone());
                }
                lists.all.push(record);
            }
            FinanceAction::Updated { kind, record } => {
                self.loading = false;
                let on_selected = self.is_selected(record.date);
                let lists = self.lists_mut(kind);
                if let Some(existing) = lists.all.iter_mut().find(|r| r.id == record.id) {
                    *existing = record.clone();
                }
                match lists.on_date.iter().position(|r| r.id == record.id) {
                    Some(ix) if on_selected => lists.on_date[ix] = record,
                    Some(ix) => {
                        let _ = lists.on_date.remove(ix);
                    }
                    None if on_selected => lists.on_date.push(record),
                    None => {}
                }
            }
            FinanceAction::Deleted { kind, id } => {
                self.loading = false;
                self.lists_mut(kind).remove(id);
            }
            FinanceAction::CategoriesFetched(categories) => {
                self.loading = false;
                self.categories = categories;
            }
            FinanceAction::DateSelected(date) => self.select_date(date),
            FinanceAction::Rejected(payload) => {
                self.loading = false;
                self.error = Some(payload);
            }
            FinanceAction::Reset => *self = FinanceState::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Amount;
    use std::str::FromStr;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::from_str(s).unwrap()
    }

    fn record(id: u64, amount: i64, on: &str) -> Record {
        Record {
            id,
            user: Some(1),
            amount: Amount::from(amount),
            description: None,
            date: date(on),
            category: Some(3),
            category_name: Some("Salary".to_string()),
            is_recurring: false,
            recurrence_interval: None,
            next_occurrence: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn fetched(kind: RecordKind, on: Option<&str>, records: Vec<Record>) -> FinanceAction {
        FinanceAction::Fetched {
            kind,
            date: on.map(date),
            records,
        }
    }

    #[test]
    fn test_fetch_replaces_wholesale() {
        let mut state = FinanceState::default();
        state.reduce(fetched(RecordKind::Income, None, vec![record(1, 10, "2024-05-01")]));
        state.reduce(fetched(RecordKind::Income, None, vec![record(2, 20, "2024-05-02")]));
        assert_eq!(state.incomes().len(), 1);
        assert_eq!(state.incomes()[0].id, 2);
        assert!(state.expenses().is_empty());
    }

    #[test]
    fn test_fetch_by_date_selects_date() {
        let mut state = FinanceState::default();
        state.reduce(fetched(
            RecordKind::Expense,
            Some("2024-05-01"),
            vec![record(5, 7, "2024-05-01")],
        ));
        assert_eq!(state.selected_date(), Some(date("2024-05-01")));
        assert_eq!(state.lists(RecordKind::Expense).on_date().len(), 1);
        assert!(state.expenses().is_empty());

        // Selecting another date drops the stale date lists of both kinds.
        state.reduce(FinanceAction::DateSelected(date("2024-05-02")));
        assert!(state.lists(RecordKind::Expense).on_date().is_empty());
    }

    #[test]
    fn test_concurrent_day_fetches_in_any_order() {
        let mut a = FinanceState::default();
        let mut b = FinanceState::default();
        let incomes = fetched(RecordKind::Income, Some("2024-05-01"), vec![record(1, 1, "2024-05-01")]);
        let expenses = fetched(RecordKind::Expense, Some("2024-05-01"), vec![record(2, 2, "2024-05-01")]);
        a.reduce(incomes.clone());
        a.reduce(expenses.clone());
        b.reduce(expenses);
        b.reduce(incomes);
        assert_eq!(a, b);
    }

    #[test]
    fn test_create_appends_to_both_lists_when_date_matches() {
        let mut state = FinanceState::default();
        state.reduce(fetched(RecordKind::Income, None, vec![record(1, 10, "2024-04-01")]));
        state.reduce(FinanceAction::DateSelected(date("2024-05-01")));
        state.reduce(FinanceAction::Created {
            kind: RecordKind::Income,
            record: record(2, 500, "2024-05-01"),
        });
        assert_eq!(state.incomes().len(), 2);
        assert_eq!(state.lists(RecordKind::Income).on_date().len(), 1);

        // different date: only the full list grows
        state.reduce(FinanceAction::Created {
            kind: RecordKind::Income,
            record: record(3, 500, "2024-05-09"),
        });
        assert_eq!(state.incomes().len(), 3);
        assert_eq!(state.lists(RecordKind::Income).on_date().len(), 1);
    }

    #[test]
    fn test_update_patches_in_place() {
        let mut state = FinanceState::default();
        state.reduce(fetched(
            RecordKind::Expense,
            None,
            vec![record(1, 10, "2024-05-01"), record(2, 20, "2024-05-01")],
        ));
        state.reduce(fetched(
            RecordKind::Expense,
            Some("2024-05-01"),
            vec![record(1, 10, "2024-05-01"), record(2, 20, "2024-05-01")],
        ));

        // amount change stays on the selected date
        state.reduce(FinanceAction::Updated {
            kind: RecordKind::Expense,
            record: record(1, 15, "2024-05-01"),
        });
        assert_eq!(state.expenses()[0].amount, Amount::from(15));
        assert_eq!(
            state.lists(RecordKind::Expense).on_date()[0].amount,
            Amount::from(15)
        );

        // moving to another date removes it from the date view
        state.reduce(FinanceAction::Updated {
            kind: RecordKind::Expense,
            record: record(2, 20, "2024-05-03"),
        });
        assert_eq!(state.lists(RecordKind::Expense).on_date().len(), 1);
        assert_eq!(state.expenses()[1].date, date("2024-05-03"));

        // and moving back adds it again
        state.reduce(FinanceAction::Updated {
            kind: RecordKind::Expense,
            record: record(2, 20, "2024-05-01"),
        });
        assert_eq!(state.lists(RecordKind::Expense).on_date().len(), 2);
    }

    #[test]
    fn test_delete_removes_everywhere() {
        let mut state = FinanceState::default();
        state.reduce(fetched(RecordKind::Income, None, vec![record(1, 10, "2024-05-01")]));
        state.reduce(fetched(
            RecordKind::Income,
            Some("2024-05-01"),
            vec![record(1, 10, "2024-05-01")],
        ));
        state.reduce(FinanceAction::Deleted {
            kind: RecordKind::Income,
            id: 1,
        });
        assert!(state.incomes().is_empty());
        assert!(state.lists(RecordKind::Income).on_date().is_empty());
    }

    #[test]
    fn test_rejected_and_reset() {
        let mut state = FinanceState::default();
        state.reduce(FinanceAction::Pending);
        assert!(state.loading());
        state.reduce(FinanceAction::Rejected(serde_json::json!({"amount": ["bad"]})));
        assert!(!state.loading());
        assert!(state.error().is_some());
        state.reduce(FinanceAction::Reset);
        assert_eq!(state, FinanceState::default());
    }
}
