//! Handlers for `goalcrest income ...` and `goalcrest expense ...`.

use crate::app::App;
use crate::args::{AddArgs, DeleteArgs, ListArgs, UpdateArgs};
use crate::commands::{count, record_lines, Out};
use crate::model::{NewRecord, Record, RecordKind};
use crate::{Config, Mode, Result};
use chrono::Local;

/// Lists all records of `kind`, or the ones on a single date.
pub async fn list_records(
    config: Config,
    mode: Mode,
    kind: RecordKind,
    args: &ListArgs,
) -> Result<Out<Vec<Record>>> {
    let app = App::new(&config, mode).await?;
    let records = app.fetch_records(kind, args.date()).await?;
    let scope = match args.date() {
        Some(date) => format!(" on {date}"),
        None => String::new(),
    };
    let message = if records.is_empty() {
        format!("No {kind} records{scope}")
    } else {
        format!(
            "{}{scope}:\n{}",
            count(records.len(), kind.title()),
            record_lines(&records)
        )
    };
    Ok(Out::new(message, records))
}

/// Creates a record. The date defaults to today.
pub async fn add_record(
    config: Config,
    mode: Mode,
    kind: RecordKind,
    args: &AddArgs,
) -> Result<Out<Record>> {
    let app = App::new(&config, mode).await?;
    let date = args.date().unwrap_or_else(|| Local::now().date_naive());
    let mut record = NewRecord::new(args.amount(), args.category(), date);
    if let Some(description) = args.description() {
        record = record.with_description(description);
    }
    if let Some(interval) = args.recurring() {
        record = record.recurring(interval);
    }
    let created = app.create_record(kind, &record).await?;
    let message = format!(
        "Created {} #{} for {} on {}",
        kind,
        created.id,
        created.amount.to_commas_string(),
        created.date
    );
    Ok(Out::new(message, created))
}

pub async fn update_record(
    config: Config,
    mode: Mode,
    kind: RecordKind,
    args: &UpdateArgs,
) -> Result<Out<Record>> {
    let app = App::new(&config, mode).await?;
    let updated = app.update_record(kind, args.id(), &args.update()).await?;
    let message = format!(
        "Updated {} #{}:\n{}",
        kind,
        updated.id,
        record_lines(std::slice::from_ref(&updated))
    );
    Ok(Out::new(message, updated))
}

pub async fn delete_record(
    config: Config,
    mode: Mode,
    kind: RecordKind,
    args: &DeleteArgs,
) -> Result<Out<()>> {
    let app = App::new(&config, mode).await?;
    app.delete_record(kind, args.id()).await?;
    Ok(format!("Deleted {kind} #{}", args.id()).into())
}
