use serde::{Deserialize, Serialize};

/// Whether a category (or record) is income or expense.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    #[default]
    Income,
    Expense,
}

serde_plain::derive_display_from_serialize!(RecordKind);
serde_plain::derive_fromstr_from_deserialize!(RecordKind);

impl RecordKind {
    /// The collection path on the server, e.g. `incomes/`.
    pub(crate) fn collection_path(&self) -> &'static str {
        match self {
            RecordKind::Income => "incomes/",
            RecordKind::Expense => "expenses/",
        }
    }

    /// The path of a single record on the server, e.g. `incomes/7/`.
    pub(crate) fn detail_path(&self, id: u64) -> String {
        format!("{}{id}/", self.collection_path())
    }

    /// The capitalized singular name, used in messages.
    pub fn title(&self) -> &'static str {
        match self {
            RecordKind::Income => "Income",
            RecordKind::Expense => "Expense",
        }
    }
}

/// A category that incomes or expenses are filed under. Categories are owned by the server and
/// are read-only from the client.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: RecordKind,
}

impl Category {
    pub fn new(id: u64, name: impl Into<String>, kind: RecordKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
        }
    }
}

#[test]
fn test_category_wire_format() {
    let json = r#"{"id": 3, "name": "Salary", "type": "income"}"#;
    let category: Category = serde_json::from_str(json).unwrap();
    assert_eq!(category, Category::new(3, "Salary", RecordKind::Income));
    assert_eq!(RecordKind::Expense.detail_path(7), "expenses/7/");
    assert_eq!(RecordKind::Expense.to_string(), "expense");
}
