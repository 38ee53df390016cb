use crate::app::App;
use crate::error::{ErrorType, IntoResult, Res, Result};
use crate::model::{
    Amount, CalendarMonth, Category, Month, MonthSummary, NewRecord, Record, RecordKind,
    RecordUpdate,
};
use crate::store::FinanceAction;
use anyhow::bail;
use chrono::NaiveDate;
use serde::Serialize;

/// The incomes and expenses of a single day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayView {
    pub date: NaiveDate,
    pub incomes: Vec<Record>,
    pub expenses: Vec<Record>,
}

impl DayView {
    pub fn income_total(&self) -> Amount {
        self.incomes.iter().map(|r| r.amount).sum()
    }

    pub fn expense_total(&self) -> Amount {
        self.expenses.iter().map(|r| r.amount).sum()
    }
}

impl App {
    /// Fetches the records of `kind` into the cache. With a `date` only that day's records are
    /// fetched, into the date view, and `date` becomes the selected date.
    pub async fn fetch_records(
        &self,
        kind: RecordKind,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Record>> {
        self.fetch_records_inner(kind, date)
            .await
            .pub_result(ErrorType::Request)
    }

    async fn fetch_records_inner(
        &self,
        kind: RecordKind,
        date: Option<NaiveDate>,
    ) -> Res<Vec<Record>> {
        self.store().dispatch(FinanceAction::Pending).await?;
        let result = self.client().list(kind, date).await;
        let records = self.settle(result, FinanceAction::Rejected).await?;
        self.store()
            .dispatch(FinanceAction::Fetched {
                kind,
                date,
                records: records.clone(),
            })
            .await?;
        Ok(records)
    }

    pub async fn create_record(&self, kind: RecordKind, record: &NewRecord) -> Result<Record> {
        self.create_record_inner(kind, record)
            .await
            .pub_result(ErrorType::Request)
    }

    async fn create_record_inner(&self, kind: RecordKind, record: &NewRecord) -> Res<Record> {
        self.store().dispatch(FinanceAction::Pending).await?;
        let result = self.client().create(kind, record).await;
        let created = self.settle(result, FinanceAction::Rejected).await?;
        self.store()
            .dispatch(FinanceAction::Created {
                kind,
                record: created.clone(),
            })
            .await?;
        Ok(created)
    }

    pub async fn update_record(
        &self,
        kind: RecordKind,
        id: u64,
        update: &RecordUpdate,
    ) -> Result<Record> {
        self.update_record_inner(kind, id, update)
            .await
            .pub_result(ErrorType::Request)
    }

    async fn update_record_inner(
        &self,
        kind: RecordKind,
        id: u64,
        update: &RecordUpdate,
    ) -> Res<Record> {
        if update.is_empty() {
            bail!("Nothing to update for {kind} {id}");
        }
        self.store().dispatch(FinanceAction::Pending).await?;
        let result = self.client().update(kind, id, update).await;
        let updated = self.settle(result, FinanceAction::Rejected).await?;
        self.store()
            .dispatch(FinanceAction::Updated {
                kind,
                record: updated.clone(),
            })
            .await?;
        Ok(updated)
    }

    pub async fn delete_record(&self, kind: RecordKind, id: u64) -> Result<()> {
        self.delete_record_inner(kind, id)
            .await
            .pub_result(ErrorType::Request)
    }

    async fn delete_record_inner(&self, kind: RecordKind, id: u64) -> Res<()> {
        self.store().dispatch(FinanceAction::Pending).await?;
        let result = self.client().delete(kind, id).await;
        self.settle(result, FinanceAction::Rejected).await?;
        self.store()
            .dispatch(FinanceAction::Deleted { kind, id })
            .await
    }

    pub async fn fetch_categories(&self) -> Result<Vec<Category>> {
        self.fetch_categories_inner()
            .await
            .pub_result(ErrorType::Request)
    }

    async fn fetch_categories_inner(&self) -> Res<Vec<Category>> {
        self.store().dispatch(FinanceAction::Pending).await?;
        let result = self.client().categories().await;
        let categories = self.settle(result, FinanceAction::Rejected).await?;
        self.store()
            .dispatch(FinanceAction::CategoriesFetched(categories.clone()))
            .await?;
        Ok(categories)
    }

    /// Selects the date that the date views refer to.
    pub async fn select_date(&self, date: NaiveDate) -> Result<()> {
        self.store()
            .dispatch(FinanceAction::DateSelected(date))
            .await
            .pub_result(ErrorType::Internal)
    }

    /// Fetches the incomes and expenses of `date` concurrently.
    pub async fn fetch_day(&self, date: NaiveDate) -> Result<DayView> {
        let (incomes, expenses) = tokio::join!(
            self.fetch_records(RecordKind::Income, Some(date)),
            self.fetch_records(RecordKind::Expense, Some(date)),
        );
        Ok(DayView {
            date,
            incomes: incomes?,
            expenses: expenses?,
        })
    }

    /// Fetches all incomes and expenses concurrently.
    async fn fetch_all(&self) -> Result<()> {
        let (incomes, expenses) = tokio::join!(
            self.fetch_records(RecordKind::Income, None),
            self.fetch_records(RecordKind::Expense, None),
        );
        let _ = incomes?;
        let _ = expenses?;
        Ok(())
    }

    /// Refreshes the cache and summarizes `month` from it.
    pub async fn month_summary(&self, month: Month) -> Result<MonthSummary> {
        self.fetch_all().await?;
        Ok(self
            .store()
            .select(|s| {
                MonthSummary::new(month, s.finance().incomes(), s.finance().expenses())
            })
            .await)
    }

    /// Refreshes the cache and marks the days of `month` that have incomes or expenses.
    pub async fn calendar(&self, month: Month) -> Result<CalendarMonth> {
        self.fetch_all().await?;
        Ok(self
            .store()
            .select(|s| {
                CalendarMonth::new(month, s.finance().incomes(), s.finance().expenses())
            })
            .await)
    }
}
