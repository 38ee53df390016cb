//! These structs provide the CLI interface for the goalcrest CLI.

use crate::model::{Amount, Month, RecordKind, RecordUpdate, RecurrenceInterval};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing::level_filters::LevelFilter;

/// goalcrest: Track your incomes and expenses from the command line.
///
/// This program talks to a goalcrest server. You log in once, after which your session is kept in
/// the goalcrest home directory and silently refreshed when it expires. From there you can add,
/// change and remove incomes and expenses, and look at a day, a month summary or a calendar.
///
/// Set GOALCREST_IN_TEST_MODE to any value to use a built-in, file-backed stand-in for the
/// server. It has a demo account (demo@goalcrest.app / goalcrest-demo) with some sample data.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and initialize the configuration file.
    ///
    /// This is the first command you should run. By default the data directory is
    /// $HOME/goalcrest, pass --goalcrest-home if you want it somewhere else.
    Init(InitArgs),
    /// Log in with your email address and password.
    Login(LoginArgs),
    /// Create a new account and log in with it.
    Register(RegisterArgs),
    /// Forget the saved session.
    Logout,
    /// Show the logged in user.
    Whoami,
    /// Request a password reset email.
    ResetPassword(ResetPasswordArgs),
    /// Exchange the saved refresh credential for a new access credential.
    Refresh,
    /// List, add, update or delete incomes.
    Income(RecordArgs),
    /// List, add, update or delete expenses.
    Expense(RecordArgs),
    /// List the categories that incomes and expenses can be filed under.
    Categories(CategoriesArgs),
    /// Show the incomes and expenses of one day.
    Day(DayArgs),
    /// Show the incomes, expenses and balance of one month.
    Summary(MonthArgs),
    /// Show a calendar of one month with the days that have incomes or expenses marked.
    Calendar(MonthArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where goalcrest configuration and the session are held. Defaults to
    /// ~/goalcrest
    #[arg(long, env = "GOALCREST_HOME", default_value_t = default_goalcrest_home())]
    goalcrest_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, goalcrest_home: PathBuf) -> Self {
        Self {
            log_level,
            goalcrest_home: goalcrest_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn goalcrest_home(&self) -> &DisplayPath {
        &self.goalcrest_home
    }
}

/// (Not shown): Args for the `goalcrest init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The base URL of the goalcrest API server.
    #[arg(long, default_value = "http://localhost:8000/")]
    api_url: String,
}

impl InitArgs {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

/// (Not shown): Args for the `goalcrest login` command. `Debug` does not print the password.
#[derive(Parser, Clone)]
pub struct LoginArgs {
    #[arg(long)]
    email: String,

    #[arg(long, env = "GOALCREST_PASSWORD", hide_env_values = true)]
    password: String,
}

impl LoginArgs {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

/// (Not shown): Args for the `goalcrest register` command. `Debug` does not print the password.
#[derive(Parser, Clone)]
pub struct RegisterArgs {
    #[arg(long)]
    first_name: String,

    #[arg(long)]
    last_name: String,

    #[arg(long)]
    email: String,

    /// At least 8 characters.
    #[arg(long, env = "GOALCREST_PASSWORD", hide_env_values = true)]
    password: String,
}

impl RegisterArgs {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for LoginArgs {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginArgs")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

impl std::fmt::Debug for RegisterArgs {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterArgs")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// (Not shown): Args for the `goalcrest reset-password` command.
#[derive(Debug, Parser, Clone)]
pub struct ResetPasswordArgs {
    #[arg(long)]
    email: String,
}

impl ResetPasswordArgs {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

/// (Not shown): Args for the `goalcrest income` and `goalcrest expense` commands.
#[derive(Debug, Parser, Clone)]
pub struct RecordArgs {
    #[command(subcommand)]
    action: RecordSubcommand,
}

impl RecordArgs {
    pub fn new(action: RecordSubcommand) -> Self {
        Self { action }
    }

    pub fn action(&self) -> &RecordSubcommand {
        &self.action
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum RecordSubcommand {
    /// List all records, or only those of one day.
    List(ListArgs),
    /// Add a record.
    Add(AddArgs),
    /// Change some fields of a record.
    Update(UpdateArgs),
    /// Delete a record.
    Delete(DeleteArgs),
}

/// (Not shown): Args for the `list` subcommand.
#[derive(Debug, Parser, Clone)]
pub struct ListArgs {
    /// Only list the records of this date, e.g. 2024-05-01.
    #[arg(long)]
    date: Option<NaiveDate>,
}

impl ListArgs {
    pub fn new(date: Option<NaiveDate>) -> Self {
        Self { date }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }
}

/// (Not shown): Args for the `add` subcommand.
#[derive(Debug, Parser, Clone)]
pub struct AddArgs {
    /// The amount, e.g. 500 or 1,234.56
    #[arg(long)]
    amount: Amount,

    /// The category ID. See `goalcrest categories`.
    #[arg(long)]
    category: u64,

    /// The date, e.g. 2024-05-01. Defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,

    #[arg(long)]
    description: Option<String>,

    /// Makes the record repeat at this interval.
    #[arg(long, value_enum)]
    recurring: Option<RecurrenceInterval>,
}

impl AddArgs {
    pub fn new(amount: impl Into<Amount>, category: u64, date: Option<NaiveDate>) -> Self {
        Self {
            amount: amount.into(),
            category,
            date,
            description: None,
            recurring: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_recurring(mut self, interval: RecurrenceInterval) -> Self {
        self.recurring = Some(interval);
        self
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn category(&self) -> u64 {
        self.category
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn recurring(&self) -> Option<RecurrenceInterval> {
        self.recurring
    }
}

/// (Not shown): Args for the `update` subcommand. Only the given fields are changed.
#[derive(Debug, Parser, Clone)]
pub struct UpdateArgs {
    /// The ID of the record to change.
    id: u64,

    #[arg(long)]
    amount: Option<Amount>,

    #[arg(long)]
    category: Option<u64>,

    #[arg(long)]
    date: Option<NaiveDate>,

    #[arg(long)]
    description: Option<String>,

    /// Makes the record repeat at this interval.
    #[arg(long, value_enum, conflicts_with = "not_recurring")]
    recurring: Option<RecurrenceInterval>,

    /// Stops the record from repeating.
    #[arg(long)]
    not_recurring: bool,
}

impl UpdateArgs {
    pub fn new(id: u64, update: RecordUpdate) -> Self {
        Self {
            id,
            amount: update.amount,
            category: update.category,
            date: update.date,
            description: update.description,
            recurring: update.recurrence_interval,
            not_recurring: update.is_recurring == Some(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The fields to change.
    pub fn update(&self) -> RecordUpdate {
        let is_recurring = match (self.recurring, self.not_recurring) {
            (Some(_), _) => Some(true),
            (None, true) => Some(false),
            (None, false) => None,
        };
        RecordUpdate {
            amount: self.amount,
            category: self.category,
            date: self.date,
            description: self.description.clone(),
            is_recurring,
            recurrence_interval: self.recurring,
        }
    }
}

/// (Not shown): Args for the `delete` subcommand.
#[derive(Debug, Parser, Clone)]
pub struct DeleteArgs {
    /// The ID of the record to delete.
    id: u64,
}

impl DeleteArgs {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// (Not shown): Args for the `goalcrest categories` command.
#[derive(Debug, Parser, Clone)]
pub struct CategoriesArgs {
    /// Only list income or expense categories.
    #[arg(long, value_enum)]
    kind: Option<RecordKind>,
}

impl CategoriesArgs {
    pub fn new(kind: Option<RecordKind>) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> Option<RecordKind> {
        self.kind
    }
}

/// (Not shown): Args for the `goalcrest day` command.
#[derive(Debug, Parser, Clone)]
pub struct DayArgs {
    /// The date to show, e.g. 2024-05-01. Defaults to today.
    date: Option<NaiveDate>,
}

impl DayArgs {
    pub fn new(date: Option<NaiveDate>) -> Self {
        Self { date }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }
}

/// (Not shown): Args for the `goalcrest summary` and `goalcrest calendar` commands.
#[derive(Debug, Parser, Clone)]
pub struct MonthArgs {
    /// The month to show, e.g. 2024-05. Defaults to the current month.
    month: Option<Month>,
}

impl MonthArgs {
    pub fn new(month: Option<Month>) -> Self {
        Self { month }
    }

    pub fn month(&self) -> Option<Month> {
        self.month
    }
}

fn default_goalcrest_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("goalcrest"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --goalcrest-home or GOALCREST_HOME instead of relying on the \
                default goalcrest home directory. If you continue using the program right now, \
                you may have problems!",
            );
            PathBuf::from("goalcrest")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_debug_hides_password() {
        let args = Args::try_parse_from([
            "goalcrest",
            "login",
            "--email",
            "demo@goalcrest.app",
            "--password",
            "hunter2-secret",
        ])
        .unwrap();
        let printed = format!("{args:?}");
        assert!(printed.contains("demo@goalcrest.app"));
        assert!(!printed.contains("hunter2-secret"));

        let args = Args::try_parse_from([
            "goalcrest",
            "register",
            "--first-name",
            "Ada",
            "--last-name",
            "Lovelace",
            "--email",
            "ada@example.com",
            "--password",
            "hunter2-secret",
        ])
        .unwrap();
        assert!(!format!("{args:?}").contains("hunter2-secret"));
    }

    #[test]
    fn test_parse_income_add() {
        let args = Args::try_parse_from([
            "goalcrest",
            "--goalcrest-home",
            "/tmp/gc",
            "income",
            "add",
            "--amount",
            "1,500.25",
            "--category",
            "3",
            "--date",
            "2024-05-01",
            "--recurring",
            "monthly",
        ])
        .unwrap();
        assert_eq!(args.common().goalcrest_home().path(), Path::new("/tmp/gc"));
        let Command::Income(record_args) = args.command() else {
            panic!("expected the income command, got {:?}", args.command());
        };
        let RecordSubcommand::Add(add) = record_args.action() else {
            panic!("expected add, got {:?}", record_args.action());
        };
        assert_eq!(add.amount(), Amount::from_str("1500.25").unwrap());
        assert_eq!(add.category(), 3);
        assert_eq!(add.recurring(), Some(RecurrenceInterval::Monthly));
    }

    #[test]
    fn test_update_args_to_update() {
        let args = Args::try_parse_from([
            "goalcrest",
            "expense",
            "update",
            "7",
            "--description",
            "lunch",
            "--not-recurring",
        ])
        .unwrap();
        let Command::Expense(record_args) = args.command() else {
            panic!("expected the expense command");
        };
        let RecordSubcommand::Update(update) = record_args.action() else {
            panic!("expected update");
        };
        assert_eq!(update.id(), 7);
        let update = update.update();
        assert_eq!(update.description.as_deref(), Some("lunch"));
        assert_eq!(update.is_recurring, Some(false));
        assert!(update.amount.is_none());
    }

    #[test]
    fn test_recurring_conflicts_with_not_recurring() {
        let result = Args::try_parse_from([
            "goalcrest",
            "income",
            "update",
            "1",
            "--recurring",
            "weekly",
            "--not-recurring",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_month() {
        let args = Args::try_parse_from(["goalcrest", "summary", "2024-05"]).unwrap();
        let Command::Summary(month_args) = args.command() else {
            panic!("expected summary");
        };
        assert_eq!(month_args.month().unwrap().to_string(), "2024-05");
        assert!(Args::try_parse_from(["goalcrest", "calendar", "May"]).is_err());
    }
}
