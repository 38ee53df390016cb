//! Implements the `Transport` trait with an in-memory server for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the
//! whole app, top-to-bottom, without a goalcrest server. It answers the same endpoints, with the
//! same status codes and error payloads, as the real server.

use crate::api::{
    ApiRequest, ApiResponse, Transport, CATEGORIES, LOGIN, ME, REFRESH, REFRESH_COOKIE,
    RESET_PASSWORD, USERS,
};
use crate::error::Res;
use crate::model::{Amount, Category, Record, RecordKind, RecordUpdate, RecurrenceInterval, User};
use crate::utils;
use anyhow::Context;
use chrono::{NaiveDate, Utc};
use reqwest::{Method, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

type Reply = std::result::Result<ApiResponse, ApiResponse>;

const REQUIRED: &str = "This field is required.";

/// An implementation of the `Transport` trait that does not use the network. It holds all data in
/// memory and, optionally, in a JSON file so that separate runs of the program share data.
pub struct TestServer {
    backend: Mutex<Backend>,
    requests: Mutex<Vec<(Method, String)>>,
    path: Option<PathBuf>,
}

impl TestServer {
    /// The email address of the user that every new server starts with.
    pub const DEMO_EMAIL: &'static str = "demo@goalcrest.app";
    /// The password of the demo user.
    pub const DEMO_PASSWORD: &'static str = "goalcrest-demo";

    /// A server with the seed categories and the demo user, but no incomes or expenses.
    pub fn new() -> Self {
        Self::from_backend(Backend::new(), None)
    }

    /// A server whose data lives in the JSON file at `path`. If the file does not exist, it is
    /// created with the seed data and some sample incomes and expenses for the demo user.
    pub async fn persistent(path: impl Into<PathBuf>) -> Res<Self> {
        let path = path.into();
        let backend = if path.is_file() {
            debug!("Loading test server data from {}", path.display());
            utils::deserialize(&path).await?
        } else {
            let backend = Backend::with_samples();
            save(&path, &backend).await?;
            backend
        };
        Ok(Self::from_backend(backend, Some(path)))
    }

    fn from_backend(backend: Backend, path: Option<PathBuf>) -> Self {
        Self {
            backend: Mutex::new(backend),
            requests: Mutex::new(Vec::new()),
            path,
        }
    }

    fn backend(&self) -> MutexGuard<'_, Backend> {
        self.backend.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Invalidates every access credential, as if they had all expired.
    pub fn expire_access_tokens(&self) {
        self.backend().access_tokens.clear();
    }

    /// Invalidates every refresh credential.
    pub fn revoke_refresh_tokens(&self) {
        self.backend().refresh_tokens.clear();
    }

    /// How many times the refresh endpoint was called.
    pub fn refresh_count(&self) -> usize {
        self.request_count("POST", REFRESH)
    }

    /// How many requests were made with `method` to `path`, e.g. `("GET", "incomes/")`.
    pub fn request_count(&self, method: &str, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(m, p)| m.as_str() == method && p == path)
            .count()
    }
}

impl Default for TestServer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Transport for TestServer {
    async fn send(&self, request: ApiRequest) -> Res<ApiResponse> {
        let path = request.path().trim_start_matches('/').to_string();
        debug!("test server: {} {path}", request.method());
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((request.method().clone(), path.clone()));

        // The lock must not be held across the file write below.
        let (response, snapshot) = {
            let mut backend = self.backend();
            let response = backend
                .handle(request.method(), &path, &request)
                .unwrap_or_else(|e| e);
            let changed = *request.method() != Method::GET && response.status().is_success();
            let snapshot = match (&self.path, changed) {
                (Some(_), true) => Some(backend.clone()),
                _ => None,
            };
            (response, snapshot)
        };

        if let (Some(path), Some(snapshot)) = (&self.path, snapshot) {
            save(path, &snapshot).await?;
        }
        Ok(response)
    }
}

async fn save(path: &Path, backend: &Backend) -> Res<()> {
    let json = serde_json::to_string_pretty(backend).context("Unable to serialize test data")?;
    utils::write(path, json).await
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Account {
    user: User,
    password: String,
}

/// Everything the server knows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Backend {
    accounts: Vec<Account>,
    categories: Vec<Category>,
    incomes: Vec<Record>,
    expenses: Vec<Record>,
    /// Access credential to user ID.
    access_tokens: HashMap<String, u64>,
    /// Refresh credential to user ID.
    refresh_tokens: HashMap<String, u64>,
    last_record_id: u64,
}

impl Backend {
    fn new() -> Self {
        let categories = load_csv(CATEGORY_DATA).unwrap_or_else(|e| {
            warn!("Unable to load the seed categories: {e:#}");
            Vec::new()
        });
        let demo = Account {
            user: User {
                id: 1,
                first_name: "Demo".to_string(),
                last_name: "User".to_string(),
                email: TestServer::DEMO_EMAIL.to_string(),
            },
            password: TestServer::DEMO_PASSWORD.to_string(),
        };
        Self {
            accounts: vec![demo],
            categories,
            ..Self::default()
        }
    }

    fn with_samples() -> Self {
        let mut backend = Self::new();
        let samples: Vec<SampleRow> = load_csv(SAMPLE_DATA).unwrap_or_else(|e| {
            warn!("Unable to load the sample records: {e:#}");
            Vec::new()
        });
        for sample in samples {
            let Ok(amount) = Amount::from_str(&sample.amount) else {
                warn!("Skipping sample record with bad amount '{}'", sample.amount);
                continue;
            };
            let fields = RecordUpdate {
                amount: Some(amount),
                category: Some(sample.category),
                date: Some(sample.date),
                description: sample.description,
                is_recurring: Some(sample.recurrence.is_some()),
                recurrence_interval: sample.recurrence,
            };
            let _ = backend.insert_record(sample.kind, 1, &fields);
        }
        backend
    }

    fn handle(&mut self, method: &Method, path: &str, request: &ApiRequest) -> Reply {
        match path {
            LOGIN => {
                allow(method, Method::POST)?;
                self.login(request)
            }
            REFRESH => {
                allow(method, Method::POST)?;
                self.refresh(request)
            }
            USERS => {
                allow(method, Method::POST)?;
                self.register(request)
            }
            ME => {
                allow(method, Method::GET)?;
                let user = self.authenticate(request)?;
                let account = self.account(user).ok_or_else(not_found)?;
                Ok(reply(StatusCode::OK, &account.user))
            }
            RESET_PASSWORD => {
                allow(method, Method::POST)?;
                let body = object(request)?;
                match body.get("email").and_then(Value::as_str) {
                    Some(email) if !email.is_empty() => {
                        Ok(ApiResponse::new(StatusCode::NO_CONTENT, Value::Null))
                    }
                    _ => Err(bad_request(json!({ "email": [REQUIRED] }))),
                }
            }
            CATEGORIES => {
                allow(method, Method::GET)?;
                let _ = self.authenticate(request)?;
                Ok(reply(StatusCode::OK, &self.categories))
            }
            _ => self.handle_records(method, path, request),
        }
    }

    fn handle_records(&mut self, method: &Method, path: &str, request: &ApiRequest) -> Reply {
        let (kind, rest) = [RecordKind::Income, RecordKind::Expense]
            .into_iter()
            .find_map(|kind| {
                path.strip_prefix(kind.collection_path())
                    .map(|rest| (kind, rest))
            })
            .ok_or_else(not_found)?;

        if rest.is_empty() {
            let user = self.authenticate(request)?;
            return if *method == Method::GET {
                // An unparseable date is ignored rather than rejected.
                let date = request
                    .query_value("date")
                    .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
                let records: Vec<&Record> = self
                    .records(kind)
                    .iter()
                    .filter(|r| r.user == Some(user))
                    .filter(|r| date.is_none_or(|d| r.date == d))
                    .collect();
                Ok(reply(StatusCode::OK, &records))
            } else if *method == Method::POST {
                let fields = self.parse_fields(kind, request, false)?;
                let record = self.insert_record(kind, user, &fields);
                Ok(reply(StatusCode::CREATED, &record))
            } else {
                Err(not_allowed(method))
            };
        }

        let id: u64 = rest
            .strip_suffix('/')
            .and_then(|id| id.parse().ok())
            .ok_or_else(not_found)?;
        let user = self.authenticate(request)?;
        let ix = self
            .records(kind)
            .iter()
            .position(|r| r.id == id && r.user == Some(user))
            .ok_or_else(not_found)?;
        if *method == Method::GET {
            Ok(reply(StatusCode::OK, &self.records(kind)[ix]))
        } else if *method == Method::PATCH {
            let fields = self.parse_fields(kind, request, true)?;
            let name = fields.category.and_then(|c| self.category_name(c));
            let record = &mut self.records_mut(kind)[ix];
            fields.apply(record);
            if fields.category.is_some() {
                record.category_name = name;
            }
            set_next_occurrence(record);
            record.updated_at = Some(Utc::now());
            Ok(reply(StatusCode::OK, &*record))
        } else if *method == Method::DELETE {
            let _ = self.records_mut(kind).remove(ix);
            Ok(ApiResponse::new(StatusCode::NO_CONTENT, Value::Null))
        } else {
            Err(not_allowed(method))
        }
    }

    fn login(&mut self, request: &ApiRequest) -> Reply {
        let body = object(request)?;
        let mut errors = Map::new();
        let email = required_str(&body, "email", &mut errors);
        let password = required_str(&body, "password", &mut errors);
        if !errors.is_empty() {
            return Err(bad_request(Value::Object(errors)));
        }
        let user = self
            .accounts
            .iter()
            .find(|a| a.user.email.eq_ignore_ascii_case(&email) && a.password == password)
            .map(|a| a.user.id)
            .ok_or_else(|| {
                error(
                    StatusCode::UNAUTHORIZED,
                    json!({"detail": "No active account found with the given credentials"}),
                )
            })?;
        let access = self.issue_access(user);
        let refresh = new_token("refresh");
        let _ = self.refresh_tokens.insert(refresh.clone(), user);
        Ok(reply(
            StatusCode::OK,
            &json!({ "access": access, "refresh": refresh }),
        )
        .with_cookie(REFRESH_COOKIE, refresh))
    }

    fn refresh(&mut self, request: &ApiRequest) -> Reply {
        let from_body = request
            .body()
            .and_then(|b| b.get("refresh"))
            .and_then(Value::as_str);
        let token = request
            .cookie_value(REFRESH_COOKIE)
            .or(from_body)
            .ok_or_else(|| bad_request(json!({ "refresh": [REQUIRED] })))?;
        let user = *self.refresh_tokens.get(token).ok_or_else(|| {
            error(
                StatusCode::UNAUTHORIZED,
                json!({"detail": "Token is invalid or expired", "code": "token_not_valid"}),
            )
        })?;
        let access = self.issue_access(user);
        Ok(reply(StatusCode::OK, &json!({ "access": access })))
    }

    fn register(&mut self, request: &ApiRequest) -> Reply {
        let body = object(request)?;
        let mut errors = Map::new();
        let first_name = required_str(&body, "first_name", &mut errors);
        let last_name = required_str(&body, "last_name", &mut errors);
        let email = required_str(&body, "email", &mut errors);
        let password = required_str(&body, "password", &mut errors);
        let re_password = required_str(&body, "re_password", &mut errors);

        if !email.is_empty() && !errors.contains_key("email") {
            if !is_email(&email) {
                add_error(&mut errors, "email", "Enter a valid email address.");
            } else if self
                .accounts
                .iter()
                .any(|a| a.user.email.eq_ignore_ascii_case(&email))
            {
                add_error(
                    &mut errors,
                    "email",
                    "user with this Email Address already exists.",
                );
            }
        }
        if !password.is_empty() && password.chars().count() < 8 {
            add_error(
                &mut errors,
                "password",
                "This password is too short. It must contain at least 8 characters.",
            );
        }
        if !errors.is_empty() {
            return Err(bad_request(Value::Object(errors)));
        }
        if password != re_password {
            return Err(bad_request(
                json!({"non_field_errors": ["The two password fields didn't match."]}),
            ));
        }

        let id = self.accounts.iter().map(|a| a.user.id).max().unwrap_or(0) + 1;
        let user = User {
            id,
            first_name,
            last_name,
            email,
        };
        self.accounts.push(Account {
            user: user.clone(),
            password,
        });
        Ok(reply(StatusCode::CREATED, &user))
    }

    fn authenticate(&self, request: &ApiRequest) -> std::result::Result<u64, ApiResponse> {
        let token = request.bearer().ok_or_else(|| {
            error(
                StatusCode::UNAUTHORIZED,
                json!({"detail": "Authentication credentials were not provided."}),
            )
        })?;
        self.access_tokens
            .get(token.as_str())
            .copied()
            .ok_or_else(|| {
                error(
                    StatusCode::UNAUTHORIZED,
                    json!({
                        "detail": "Given token not valid for any token type",
                        "code": "token_not_valid"
                    }),
                )
            })
    }

    fn issue_access(&mut self, user: u64) -> String {
        let access = new_token("access");
        let _ = self.access_tokens.insert(access.clone(), user);
        access
    }

    fn account(&self, user: u64) -> Option<&Account> {
        self.accounts.iter().find(|a| a.user.id == user)
    }

    fn records(&self, kind: RecordKind) -> &[Record] {
        match kind {
            RecordKind::Income => &self.incomes,
            RecordKind::Expense => &self.expenses,
        }
    }

    fn records_mut(&mut self, kind: RecordKind) -> &mut Vec<Record> {
        match kind {
            RecordKind::Income => &mut self.incomes,
            RecordKind::Expense => &mut self.expenses,
        }
    }

    fn category_name(&self, id: u64) -> Option<String> {
        self.categories
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.clone())
    }

    /// Stores a new record built from already validated `fields`.
    fn insert_record(&mut self, kind: RecordKind, user: u64, fields: &RecordUpdate) -> Record {
        self.last_record_id += 1;
        let now = Utc::now();
        let mut record = Record {
            id: self.last_record_id,
            user: Some(user),
            amount: Amount::ZERO,
            description: None,
            date: now.date_naive(),
            category: None,
            category_name: fields.category.and_then(|c| self.category_name(c)),
            is_recurring: false,
            recurrence_interval: None,
            next_occurrence: None,
            created_at: Some(now),
            updated_at: Some(now),
        };
        fields.apply(&mut record);
        set_next_occurrence(&mut record);
        self.records_mut(kind).push(record.clone());
        record
    }

    /// Validates the record fields in the request body. With `partial` every field is optional,
    /// otherwise `amount` is required.
    fn parse_fields(
        &self,
        kind: RecordKind,
        request: &ApiRequest,
        partial: bool,
    ) -> std::result::Result<RecordUpdate, ApiResponse> {
        let body = object(request)?;
        let mut errors = Map::new();
        let mut fields = RecordUpdate::default();

        match body.get("amount") {
            None if !partial => add_error(&mut errors, "amount", REQUIRED),
            None => {}
            Some(Value::Null) => add_error(&mut errors, "amount", "This field may not be null."),
            Some(v) => match parse_amount(v) {
                Ok(amount) => fields.amount = Some(amount),
                Err(message) => add_error(&mut errors, "amount", message),
            },
        }

        match body.get("category") {
            None | Some(Value::Null) => {}
            Some(Value::Number(n)) => match n.as_u64() {
                Some(id) if self.categories.iter().any(|c| c.id == id && c.kind == kind) => {
                    fields.category = Some(id)
                }
                _ => add_error(
                    &mut errors,
                    "category",
                    &format!("Invalid pk \"{n}\" - object does not exist."),
                ),
            },
            Some(other) => add_error(
                &mut errors,
                "category",
                &format!("Incorrect type. Expected pk value, received {}.", type_name(other)),
            ),
        }

        match body.get("date") {
            None => {}
            Some(v) => match v
                .as_str()
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            {
                Some(date) => fields.date = Some(date),
                None => add_error(
                    &mut errors,
                    "date",
                    "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.",
                ),
            },
        }

        match body.get("description") {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) => fields.description = Some(s.clone()),
            Some(_) => add_error(&mut errors, "description", "Not a valid string."),
        }

        match body.get("is_recurring") {
            None => {}
            Some(Value::Bool(b)) => fields.is_recurring = Some(*b),
            Some(_) => add_error(&mut errors, "is_recurring", "Must be a valid boolean."),
        }

        match body.get("recurrence_interval") {
            None | Some(Value::Null) => {}
            Some(v) => {
                let s = v.as_str().unwrap_or_default();
                match RecurrenceInterval::from_str(s) {
                    Ok(interval) => fields.recurrence_interval = Some(interval),
                    Err(_) => add_error(
                        &mut errors,
                        "recurrence_interval",
                        &format!("\"{s}\" is not a valid choice."),
                    ),
                }
            }
        }

        if errors.is_empty() {
            Ok(fields)
        } else {
            Err(bad_request(Value::Object(errors)))
        }
    }
}

/// The server only computes the next occurrence once, when a recurring record first gets one.
fn set_next_occurrence(record: &mut Record) {
    if record.is_recurring && record.next_occurrence.is_none() {
        record.next_occurrence = record
            .recurrence_interval
            .and_then(|interval| interval.next_after(record.date));
    }
}

fn parse_amount(value: &Value) -> std::result::Result<Amount, &'static str> {
    let amount = match value {
        Value::String(s) => Amount::from_str(s).ok(),
        Value::Number(n) => Amount::from_str(&n.to_string()).ok(),
        _ => None,
    }
    .ok_or("A valid number is required.")?;
    if amount.value().scale() > 2 {
        return Err("Ensure that there are no more than 2 decimal places.");
    }
    if amount.value().abs() >= Decimal::from(100_000_000) {
        return Err("Ensure that there are no more than 8 digits before the decimal point.");
    }
    Ok(amount)
}

fn is_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

fn object(request: &ApiRequest) -> std::result::Result<Map<String, Value>, ApiResponse> {
    match request.body() {
        None => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(other) => Err(bad_request(json!({
            "non_field_errors": [format!(
                "Invalid data. Expected a dictionary, but got {}.",
                type_name(other)
            )]
        }))),
    }
}

/// Takes a required, non-blank string field, recording an error if it is missing.
fn required_str(body: &Map<String, Value>, field: &str, errors: &mut Map<String, Value>) -> String {
    match body.get(field) {
        None | Some(Value::Null) => {
            add_error(errors, field, REQUIRED);
            String::new()
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            add_error(errors, field, "This field may not be blank.");
            String::new()
        }
        Some(Value::String(s)) => s.trim().to_string(),
        Some(_) => {
            add_error(errors, field, "Not a valid string.");
            String::new()
        }
    }
}

fn add_error(errors: &mut Map<String, Value>, field: &str, message: &str) {
    match errors.get_mut(field) {
        Some(Value::Array(messages)) => messages.push(Value::from(message)),
        _ => {
            let _ = errors.insert(field.to_string(), json!([message]));
        }
    }
}

fn allow(method: &Method, allowed: Method) -> std::result::Result<(), ApiResponse> {
    if *method == allowed {
        Ok(())
    } else {
        Err(not_allowed(method))
    }
}

fn new_token(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}

fn reply(status: StatusCode, body: &impl Serialize) -> ApiResponse {
    ApiResponse::new(status, serde_json::to_value(body).unwrap_or_default())
}

fn error(status: StatusCode, body: Value) -> ApiResponse {
    ApiResponse::new(status, body)
}

fn bad_request(body: Value) -> ApiResponse {
    error(StatusCode::BAD_REQUEST, body)
}

fn not_found() -> ApiResponse {
    error(StatusCode::NOT_FOUND, json!({"detail": "Not found."}))
}

fn not_allowed(method: &Method) -> ApiResponse {
    error(
        StatusCode::METHOD_NOT_ALLOWED,
        json!({ "detail": format!("Method \"{method}\" not allowed.") }),
    )
}

/// Loads rows of type `T` from CSV data with a header row.
fn load_csv<T: DeserializeOwned>(csv_data: &str) -> Res<Vec<T>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(Cursor::new(csv_data.as_bytes()));
    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let row: T = result.context("Bad seed data")?;
        rows.push(row);
    }
    Ok(rows)
}

#[derive(Deserialize)]
struct SampleRow {
    kind: RecordKind,
    amount: String,
    category: u64,
    date: NaiveDate,
    description: Option<String>,
    recurrence: Option<RecurrenceInterval>,
}

/// Seed category data.
const CATEGORY_DATA: &str = r##"id,name,type
1,Groceries,expense
2,Rent,expense
3,Salary,income
4,Freelance,income
5,Transport,expense
6,Utilities,expense
7,Dining Out,expense
8,Investments,income
9,Gifts,income
10,Health,expense
"##;

/// Sample incomes and expenses for the demo user.
const SAMPLE_DATA: &str = r##"kind,amount,category,date,description,recurrence
income,3200.00,3,2024-04-01,April salary,monthly
expense,1200.00,2,2024-04-01,Rent,monthly
expense,87.43,1,2024-04-03,Whole Foods Market,
expense,52.30,5,2024-04-05,Shell gas station,
income,450.00,4,2024-04-12,Logo design,
expense,142.67,6,2024-04-16,Electric bill,
expense,42.30,7,2024-04-20,Olive Garden,
income,25.00,9,2024-04-20,,
expense,63.21,1,2024-04-24,Trader Joe's,
"##;
