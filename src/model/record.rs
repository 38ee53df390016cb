use crate::model::{Amount, RecurrenceInterval};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// An income or expense as returned by the server. Incomes and expenses share the same shape;
/// which one a `Record` is depends on the list it was fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    /// The owning user. Assigned by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<u64>,
    pub amount: Amount,
    #[serde(default)]
    pub description: Option<String>,
    pub date: NaiveDate,
    /// The category ID. The server sets this to null if the category is deleted.
    #[serde(default)]
    pub category: Option<u64>,
    /// Computed by the server from `category`.
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub recurrence_interval: Option<RecurrenceInterval>,
    /// Computed by the server for recurring records.
    #[serde(default)]
    pub next_occurrence: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record {
    /// The category name if the server provided one, otherwise the category ID, otherwise `-`.
    pub fn category_label(&self) -> String {
        match (&self.category_name, self.category) {
            (Some(name), _) => name.clone(),
            (None, Some(id)) => format!("#{id}"),
            (None, None) => "-".to_string(),
        }
    }
}

/// The body sent to create an income or expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub amount: Amount,
    pub category: u64,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_interval: Option<RecurrenceInterval>,
}

impl NewRecord {
    pub fn new(amount: impl Into<Amount>, category: u64, date: NaiveDate) -> Self {
        Self {
            amount: amount.into(),
            category,
            date,
            description: None,
            is_recurring: false,
            recurrence_interval: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Marks the record as recurring every `interval`.
    pub fn recurring(mut self, interval: RecurrenceInterval) -> Self {
        self.is_recurring = true;
        self.recurrence_interval = Some(interval);
        self
    }
}

/// A partial update of an income or expense. Fields that are `None` are left unchanged.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_recurring: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_interval: Option<RecurrenceInterval>,
}

impl RecordUpdate {
    pub fn is_empty(&self) -> bool {
        self == &RecordUpdate::default()
    }

    /// Applies the set fields to `record`.
    pub fn apply(&self, record: &mut Record) {
        if let Some(amount) = self.amount {
            record.amount = amount;
        }
        if let Some(category) = self.category {
            record.category = Some(category);
        }
        if let Some(date) = self.date {
            record.date = date;
        }
        if let Some(description) = &self.description {
            record.description = Some(description.clone());
        }
        if let Some(is_recurring) = self.is_recurring {
            record.is_recurring = is_recurring;
        }
        if let Some(interval) = self.recurrence_interval {
            record.recurrence_interval = Some(interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_from_server_json() {
        let value = json!({
            "id": 12,
            "user": 1,
            "amount": "500.00",
            "description": null,
            "date": "2024-05-01",
            "category": 3,
            "category_name": "Salary",
            "is_recurring": true,
            "recurrence_interval": "monthly",
            "next_occurrence": "2024-06-01",
            "created_at": "2024-05-01T10:00:00Z",
            "updated_at": "2024-05-01T10:00:00Z"
        });
        let record: Record = serde_json::from_value(value).unwrap();
        assert_eq!(record.id, 12);
        assert_eq!(record.amount, Amount::from(500));
        assert_eq!(record.category_label(), "Salary");
        assert_eq!(
            record.recurrence_interval,
            Some(RecurrenceInterval::Monthly)
        );
    }

    #[test]
    fn test_new_record_body() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let body = serde_json::to_value(NewRecord::new(500, 3, date)).unwrap();
        assert_eq!(
            body,
            json!({"amount": "500.00", "category": 3, "date": "2024-05-01", "is_recurring": false})
        );
    }

    #[test]
    fn test_update_only_sends_set_fields() {
        let update = RecordUpdate {
            description: Some("bonus".to_string()),
            ..Default::default()
        };
        assert!(!update.is_empty());
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"description": "bonus"})
        );
        assert!(RecordUpdate::default().is_empty());
    }
}
