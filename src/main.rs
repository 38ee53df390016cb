use clap::Parser;
use std::process::ExitCode;
use goalcrest::args::{Args, Command, RecordSubcommand};
use goalcrest::model::RecordKind;
use goalcrest::{commands, Config, Mode, Result};
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            if let Some(payload) = e.payload() {
                error!("The server said: {payload}");
            }
            ExitCode::FAILURE
        }
    }
}


pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().goalcrest_home().path();

    // This allows for testing the program without a running API server. When
    // GOALCREST_IN_TEST_MODE is set and non-zero in length, then the mode will be Mode::Testing,
    // otherwise it will be Mode::Http.
    let mode = Mode::from_env();

    // Route to appropriate command handler
    let _: () = match args.command() {
        Command::Init(init_args) => commands::init(home, init_args.api_url()).await?.print(),

        Command::Login(login_args) => {
            let config = Config::load(home).await?;
            commands::login(config, mode, login_args).await?.print()
        }

        Command::Register(register_args) => {
            let config = Config::load(home).await?;
            commands::register(config, mode, register_args)
                .await?
                .print()
        }

        Command::Logout => commands::logout(Config::load(home).await?, mode)
            .await?
            .print(),

        Command::Whoami => commands::whoami(Config::load(home).await?, mode)
            .await?
            .print(),

        Command::ResetPassword(reset_args) => {
            let config = Config::load(home).await?;
            commands::reset_password(config, mode, reset_args)
                .await?
                .print()
        }

        Command::Refresh => commands::refresh(Config::load(home).await?, mode)
            .await?
            .print(),

        Command::Income(record_args) => {
            let config = Config::load(home).await?;
            records(config, mode, RecordKind::Income, record_args.action()).await?
        }

        Command::Expense(record_args) => {
            let config = Config::load(home).await?;
            records(config, mode, RecordKind::Expense, record_args.action()).await?
        }

        Command::Categories(categories_args) => {
            let config = Config::load(home).await?;
            commands::categories(config, mode, categories_args)
                .await?
                .print()
        }

        Command::Day(day_args) => {
            let config = Config::load(home).await?;
            commands::day(config, mode, day_args).await?.print()
        }

        Command::Summary(month_args) => {
            let config = Config::load(home).await?;
            commands::summary(config, mode, month_args).await?.print()
        }

        Command::Calendar(month_args) => {
            let config = Config::load(home).await?;
            commands::calendar(config, mode, month_args).await?.print()
        }
    };
    Ok(())
}

async fn records(
    config: Config,
    mode: Mode,
    kind: RecordKind,
    action: &RecordSubcommand,
) -> Result<()> {
    match action {
        RecordSubcommand::List(args) => commands::list_records(config, mode, kind, args)
            .await?
            .print(),
        RecordSubcommand::Add(args) => commands::add_record(config, mode, kind, args)
            .await?
            .print(),
        RecordSubcommand::Update(args) => commands::update_record(config, mode, kind, args)
            .await?
            .print(),
        RecordSubcommand::Delete(args) => commands::delete_record(config, mode, kind, args)
            .await?
            .print(),
    }
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_CRATE_NAME"),
                level,
                env!("CARGO_BIN_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
