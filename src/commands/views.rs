//! Read-only views: categories, a single day, a month summary and the calendar.

use crate::app::{App, DayView};
use crate::args::{CategoriesArgs, DayArgs, MonthArgs};
use crate::commands::{count, record_lines, Out};
use crate::model::{CalendarMonth, Category, Month, MonthSummary};
use crate::{Config, Mode, Result};
use chrono::Local;

pub async fn categories(
    config: Config,
    mode: Mode,
    args: &CategoriesArgs,
) -> Result<Out<Vec<Category>>> {
    let app = App::new(&config, mode).await?;
    let categories: Vec<Category> = app
        .fetch_categories()
        .await?
        .into_iter()
        .filter(|c| args.kind().map_or(true, |kind| c.kind == kind))
        .collect();
    let lines = categories
        .iter()
        .map(|c| format!("  {:>3}  {:<8} {}", c.id, c.kind, c.name))
        .collect::<Vec<_>>()
        .join("\n");
    let noun = if categories.len() == 1 {
        "category"
    } else {
        "categories"
    };
    let message = format!("{} {noun}:\n{lines}", categories.len());
    Ok(Out::new(message.trim_end(), categories))
}

/// Shows the incomes and expenses of one day, today by default.
pub async fn day(config: Config, mode: Mode, args: &DayArgs) -> Result<Out<DayView>> {
    let app = App::new(&config, mode).await?;
    let date = args.date().unwrap_or_else(|| Local::now().date_naive());
    app.select_date(date).await?;
    let view = app.fetch_day(date).await?;
    let mut message = format!(
        "{date}: income {}, expenses {}",
        view.income_total().to_commas_string(),
        view.expense_total().to_commas_string()
    );
    if !view.incomes.is_empty() {
        message.push_str(&format!("\nIncome\n{}", record_lines(&view.incomes)));
    }
    if !view.expenses.is_empty() {
        message.push_str(&format!("\nExpenses\n{}", record_lines(&view.expenses)));
    }
    Ok(Out::new(message, view))
}

/// Totals for a month, the current month by default.
pub async fn summary(config: Config, mode: Mode, args: &MonthArgs) -> Result<Out<MonthSummary>> {
    let app = App::new(&config, mode).await?;
    let month = args.month().unwrap_or_else(this_month);
    let summary = app.month_summary(month).await?;
    let message = if summary.is_empty() {
        format!("Nothing recorded in {month}")
    } else {
        format!(
            "{month}: income {} ({}), expenses {} ({}), balance {}",
            summary.income_total.to_commas_string(),
            count(summary.incomes.len(), "record"),
            summary.expense_total.to_commas_string(),
            count(summary.expenses.len(), "record"),
            summary.balance.to_commas_string(),
        )
    };
    Ok(Out::new(message, summary))
}

pub async fn calendar(config: Config, mode: Mode, args: &MonthArgs) -> Result<Out<CalendarMonth>> {
    let app = App::new(&config, mode).await?;
    let month = args.month().unwrap_or_else(this_month);
    let calendar = app.calendar(month).await?;
    let message = format!("{month}\n{}", calendar.render());
    Ok(Out::new(message, calendar))
}

fn this_month() -> Month {
    Month::of(Local::now().date_naive())
}
