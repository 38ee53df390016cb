//! A client for the goalcrest personal finance API: log in, record incomes and expenses, and
//! look at them by day, by month or on a calendar.

mod api;
pub mod app;
pub mod args;
pub mod commands;
mod config;
mod error;
pub mod model;
pub mod store;
mod utils;

#[cfg(test)]
mod test;

pub use api::Mode;
pub use app::App;
pub use config::Config;
pub use error::Error;
pub use error::ErrorType;
pub use error::Result;
