//! Command handlers for the goalcrest CLI.
//!
//! This module contains implementations for all CLI subcommands.

mod auth;
mod init;
mod records;
mod views;

use crate::model::Record;
use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info};

pub use auth::{login, logout, refresh, register, reset_password, whoami};
pub use init::init;
pub use records::{add_record, delete_record, list_records, update_record};
pub use views::{calendar, categories, day, summary};

/// The output type for a command. This allows the command to return a consistent message and,
/// optionally, structured data to the command line and to library callers.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    /// Get the `message`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the structured data stored in `structure`.
    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Print the message to `info!` and the structured data (if it exists) as JSON to `debug!`.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}

/// Renders records as aligned lines, one per record.
fn record_lines(records: &[Record]) -> String {
    records
        .iter()
        .map(|r| {
            let recurring = match r.recurrence_interval {
                Some(interval) if r.is_recurring => format!(" ({interval})"),
                _ => String::new(),
            };
            format!(
                "  #{:<5} {}  {:>12}  {:<14} {}{recurring}",
                r.id,
                r.date,
                r.amount.to_commas_string(),
                r.category_label(),
                r.description.as_deref().unwrap_or_default(),
            )
            .trim_end()
            .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `1 income` or `2 incomes`.
fn count(n: usize, singular: &str) -> String {
    if n == 1 {
        format!("{n} {singular}")
    } else {
        format!("{n} {singular}s")
    }
}
