use crate::api::{ApiClient, ApiRequest, CATEGORIES};
use crate::error::Res;
use crate::model::{Category, NewRecord, Record, RecordKind, RecordUpdate};
use anyhow::Context;
use chrono::NaiveDate;

/// The date format of the `date` query parameter.
const DATE_FORMAT: &str = "%Y-%m-%d";

impl ApiClient {
    /// Lists the records of `kind`, all of them or only those on `date`.
    pub async fn list(&self, kind: RecordKind, date: Option<NaiveDate>) -> Res<Vec<Record>> {
        let mut request = ApiRequest::get(kind.collection_path());
        if let Some(date) = date {
            request = request.query("date", date.format(DATE_FORMAT).to_string());
        }
        let response = self
            .send(request)
            .await
            .with_context(|| format!("Unable to list {kind} records"))?;
        response.json()
    }

    /// Creates a record and returns it as stored by the server.
    pub async fn create(&self, kind: RecordKind, record: &NewRecord) -> Res<Record> {
        let request = ApiRequest::post(kind.collection_path()).json(record)?;
        let response = self
            .send(request)
            .await
            .with_context(|| format!("Unable to create the {kind}"))?;
        response.json()
    }

    /// Changes the set fields of record `id` and returns the updated record.
    pub async fn update(&self, kind: RecordKind, id: u64, update: &RecordUpdate) -> Res<Record> {
        let request = ApiRequest::patch(kind.detail_path(id)).json(update)?;
        let response = self
            .send(request)
            .await
            .with_context(|| format!("Unable to update {kind} {id}"))?;
        response.json()
    }

    pub async fn delete(&self, kind: RecordKind, id: u64) -> Res<()> {
        let _ = self
            .send(ApiRequest::delete(kind.detail_path(id)))
            .await
            .with_context(|| format!("Unable to delete {kind} {id}"))?;
        Ok(())
    }

    pub async fn categories(&self) -> Res<Vec<Category>> {
        let response = self
            .send(ApiRequest::get(CATEGORIES))
            .await
            .context("Unable to list categories")?;
        response.json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TestServer;
    use crate::error::ApiError;
    use crate::model::{Amount, Credentials, RecurrenceInterval};
    use crate::store::{AppState, AuthAction, Store};
    use reqwest::StatusCode;
    use std::str::FromStr;
    use std::sync::Arc;

    async fn client() -> ApiClient {
        let server = Arc::new(TestServer::new());
        let client = ApiClient::new(server, Store::new(AppState::default()));
        let pair = client
            .login(&Credentials::new(TestServer::DEMO_EMAIL, TestServer::DEMO_PASSWORD))
            .await
            .unwrap();
        client
            .store()
            .dispatch(AuthAction::LoggedIn {
                access: pair.access,
                refresh: pair.refresh,
            })
            .await
            .unwrap();
        client
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::from_str(s).unwrap()
    }

    #[tokio::test]
    async fn test_create_list_by_date() {
        let client = client().await;
        let created = client
            .create(RecordKind::Income, &NewRecord::new(500, 3, date("2024-05-01")))
            .await
            .unwrap();
        assert_eq!(created.amount, Amount::from(500));
        assert_eq!(created.category, Some(3));

        let _ = client
            .create(RecordKind::Income, &NewRecord::new(20, 3, date("2024-05-02")))
            .await
            .unwrap();
        let on_date = client
            .list(RecordKind::Income, Some(date("2024-05-01")))
            .await
            .unwrap();
        assert_eq!(on_date, vec![created]);
        assert_eq!(client.list(RecordKind::Income, None).await.unwrap().len(), 2);
        assert!(client.list(RecordKind::Expense, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let client = client().await;
        let created = client
            .create(
                RecordKind::Expense,
                &NewRecord::new(40, 1, date("2024-05-01")).recurring(RecurrenceInterval::Weekly),
            )
            .await
            .unwrap();
        assert_eq!(created.next_occurrence, Some(date("2024-05-08")));

        let update = RecordUpdate {
            amount: Some(Amount::from(45)),
            ..Default::default()
        };
        let updated = client
            .update(RecordKind::Expense, created.id, &update)
            .await
            .unwrap();
        assert_eq!(updated.amount, Amount::from(45));
        assert_eq!(updated.date, created.date);

        client.delete(RecordKind::Expense, created.id).await.unwrap();
        let err = client
            .delete(RecordKind::Expense, created.id)
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<ApiError>().unwrap().status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_validation_error_payload() {
        let client = client().await;
        // category 3 is an income category
        let err = client
            .create(RecordKind::Expense, &NewRecord::new(10, 3, date("2024-05-01")))
            .await
            .unwrap_err();
        let api = err.downcast_ref::<ApiError>().unwrap();
        assert_eq!(api.status(), StatusCode::BAD_REQUEST);
        assert!(api.payload().get("category").is_some());
    }

    #[tokio::test]
    async fn test_categories() {
        let client = client().await;
        let categories = client.categories().await.unwrap();
        assert!(categories.iter().any(|c| c.kind == RecordKind::Income));
        assert!(categories.iter().any(|c| c.kind == RecordKind::Expense));
    }
}
