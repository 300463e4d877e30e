// Pair Ledger - Web Server
// JSON API over the ledger core with Axum

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use chrono::{Local, NaiveDate};
use clap::Parser;
use pair_ledger::logging::init_logging;
use pair_ledger::validation::parse_date;
use pair_ledger::{
    calendar_period_of, period_label, ActivityEntry, CategoryList, ExpenseForm, ExpenseRecord, GenerateOutcome,
    Ledger, LedgerConfig, LedgerError, PeriodKey, PeriodMode, PeriodStats, RemittanceForm, RemittanceRecord,
    RemittanceStats, SqliteStore, TrendPoint,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

#[derive(Parser, Debug)]
#[command(name = "pair-ledger-server")]
#[command(about = "JSON API for the pair ledger")]
struct Args {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database (overrides the config file)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Log level (debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    #[arg(long, default_value = "0.0.0.0:3000")]
    addr: String,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    ledger: Arc<Mutex<Ledger<SqliteStore>>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self { success: true, data }
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
enum ApiError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Mutex lock error")]
    LockError,
}

impl<T> From<std::sync::PoisonError<T>> for ApiError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        ApiError::LockError
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            ApiError::Ledger(LedgerError::InvalidInput { .. }) => (StatusCode::BAD_REQUEST, self.to_string()),

            ApiError::Ledger(LedgerError::NotFound { .. }) => (StatusCode::NOT_FOUND, self.to_string()),

            ApiError::Ledger(LedgerError::StoreUnavailable(_)) => {
                tracing::error!(error = %self, "Store error");
                (StatusCode::SERVICE_UNAVAILABLE, "Record store unavailable".to_string())
            }

            ApiError::Ledger(LedgerError::Config(_)) | ApiError::LockError => {
                tracing::error!(error = %self, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "success": false,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

// ============================================================================
// Request / response types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct PeriodQuery {
    period: Option<PeriodKey>,
    mode: Option<PeriodMode>,
}

#[derive(Debug, Deserialize)]
struct ResolveQuery {
    /// YYYY-MM-DD, defaults to today
    date: Option<String>,
    mode: Option<PeriodMode>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Step {
    Previous,
    Next,
}

#[derive(Debug, Default, Deserialize)]
struct SelectRequest {
    period: Option<PeriodKey>,
    step: Option<Step>,
}

#[derive(Serialize)]
struct SelectResponse {
    selected: PeriodKey,
    /// False when a step found no period with data
    moved: bool,
}

#[derive(Debug, Deserialize)]
struct CategoryRequest {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateRequest {
    period: Option<PeriodKey>,
    /// Rent only; defaults to the configured amount
    amount: Option<f64>,
}

#[derive(Serialize)]
struct PeriodResponse {
    key: PeriodKey,
    label: String,
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Serialize)]
struct StatsResponse {
    label: String,
    /// e.g. "あづ → ひも", empty when settled
    settlement_label: String,
    #[serde(flatten)]
    stats: PeriodStats,
}

#[derive(Serialize)]
struct ExpenseResponse {
    #[serde(flatten)]
    record: ExpenseRecord,
    participant_name: String,
    /// Who economically bears the expense
    bearer_name: String,
}

#[derive(Serialize)]
struct RemittancesResponse {
    label: String,
    records: Vec<RemittanceRecord>,
    stats: RemittanceStats,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Lock the ledger and apply pending snapshots
fn lock(state: &AppState) -> std::result::Result<MutexGuard<'_, Ledger<SqliteStore>>, ApiError> {
    let mut ledger = state.ledger.lock()?;
    ledger.sync();
    Ok(ledger)
}

fn expense_response(config: &LedgerConfig, record: ExpenseRecord) -> ExpenseResponse {
    let bearer = record.bearer(&config.advance_category);
    ExpenseResponse {
        participant_name: config.participant_name(record.participant).to_string(),
        bearer_name: config.participant_name(bearer).to_string(),
        record,
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/periods?mode=payroll|calendar
async fn get_periods(State(state): State<AppState>, Query(query): Query<PeriodQuery>) -> ApiResult<Vec<PeriodResponse>> {
    let ledger = lock(&state)?;
    let mode = query.mode.unwrap_or(PeriodMode::Payroll);

    let periods = ledger
        .available_periods(mode, today())
        .into_iter()
        .map(|key| {
            let range = mode.range(key);
            PeriodResponse {
                key,
                label: period_label(key, mode),
                start: range.start,
                end: range.end,
            }
        })
        .collect();

    Ok(Json(ApiResponse::ok(periods)))
}

/// GET /api/resolve?date=YYYY-MM-DD&mode=payroll|calendar
async fn resolve_period(State(state): State<AppState>, Query(query): Query<ResolveQuery>) -> ApiResult<PeriodResponse> {
    let ledger = lock(&state)?;
    let mode = query.mode.unwrap_or(PeriodMode::Payroll);
    let date = match query.date {
        Some(date) => parse_date("date", &date)?,
        None => today(),
    };

    let (key, range) = ledger.resolve_period(date, mode);
    Ok(Json(ApiResponse::ok(PeriodResponse {
        key,
        label: period_label(key, mode),
        start: range.start,
        end: range.end,
    })))
}

/// POST /api/select - Pick a payroll period or step from the current one
async fn select_period(
    State(state): State<AppState>,
    Json(request): Json<SelectRequest>,
) -> ApiResult<SelectResponse> {
    let mut ledger = lock(&state)?;
    if let Some(period) = request.period {
        ledger.select_period(period);
    }

    let moved = match request.step {
        Some(Step::Previous) => ledger.select_previous(today()).is_some(),
        Some(Step::Next) => ledger.select_next(today()).is_some(),
        None => request.period.is_some(),
    };

    Ok(Json(ApiResponse::ok(SelectResponse {
        selected: ledger.selected_period(),
        moved,
    })))
}

/// GET /api/stats?period=YYYY-MM
async fn get_stats(State(state): State<AppState>, Query(query): Query<PeriodQuery>) -> ApiResult<StatsResponse> {
    let ledger = lock(&state)?;
    let period = query.period.unwrap_or_else(|| ledger.selected_period());
    let stats = ledger.stats(period);
    let names = &ledger.config().participants;

    Ok(Json(ApiResponse::ok(StatsResponse {
        label: period_label(period, PeriodMode::Payroll),
        settlement_label: stats.settlement.direction.label(&names.first, &names.second),
        stats,
    })))
}

/// GET /api/expenses?period=YYYY-MM
async fn get_expenses(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
) -> ApiResult<Vec<ExpenseResponse>> {
    let ledger = lock(&state)?;
    let period = query.period.unwrap_or_else(|| ledger.selected_period());

    let expenses = ledger
        .expenses_in(period)
        .into_iter()
        .map(|record| expense_response(ledger.config(), record.clone()))
        .collect();

    Ok(Json(ApiResponse::ok(expenses)))
}

/// POST /api/expenses
async fn add_expense(State(state): State<AppState>, Json(form): Json<ExpenseForm>) -> ApiResult<ExpenseResponse> {
    let mut ledger = lock(&state)?;
    let record = ledger.add_expense(form)?;
    Ok(Json(ApiResponse::ok(expense_response(ledger.config(), record))))
}

/// PUT /api/expenses/:id
async fn edit_expense(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(form): Json<ExpenseForm>,
) -> ApiResult<ExpenseResponse> {
    let mut ledger = lock(&state)?;
    let record = ledger.edit_expense(&id, form)?;
    Ok(Json(ApiResponse::ok(expense_response(ledger.config(), record))))
}

/// DELETE /api/expenses/:id
async fn delete_expense(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<ExpenseRecord> {
    let mut ledger = lock(&state)?;
    Ok(Json(ApiResponse::ok(ledger.delete_expense(&id)?)))
}

/// GET /api/categories
async fn get_categories(State(state): State<AppState>) -> ApiResult<CategoryList> {
    let ledger = lock(&state)?;
    Ok(Json(ApiResponse::ok(ledger.categories().clone())))
}

/// POST /api/categories
async fn add_category(
    State(state): State<AppState>,
    Json(request): Json<CategoryRequest>,
) -> ApiResult<CategoryList> {
    let mut ledger = lock(&state)?;
    let categories = ledger.add_category(&request.name)?.clone();
    Ok(Json(ApiResponse::ok(categories)))
}

/// DELETE /api/categories/:name
async fn remove_category(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<CategoryList> {
    // Decode URL-encoded category name
    let decoded_name = urlencoding::decode(&name)
        .unwrap_or_else(|_| name.clone().into())
        .into_owned();

    let mut ledger = lock(&state)?;
    let categories = ledger.remove_category(&decoded_name)?.clone();
    Ok(Json(ApiResponse::ok(categories)))
}

/// GET /api/remittances?period=YYYY-MM (calendar month)
async fn get_remittances(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
) -> ApiResult<RemittancesResponse> {
    let ledger = lock(&state)?;
    let period = query.period.unwrap_or_else(|| calendar_period_of(today()));

    Ok(Json(ApiResponse::ok(RemittancesResponse {
        label: period_label(period, PeriodMode::Calendar),
        records: ledger.remittances_in(period).into_iter().cloned().collect(),
        stats: ledger.remittance_stats(period),
    })))
}

/// POST /api/remittances
async fn add_remittance(
    State(state): State<AppState>,
    Json(form): Json<RemittanceForm>,
) -> ApiResult<RemittanceRecord> {
    let mut ledger = lock(&state)?;
    Ok(Json(ApiResponse::ok(ledger.add_remittance(form)?)))
}

/// DELETE /api/remittances/:id
async fn delete_remittance(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<String> {
    let mut ledger = lock(&state)?;
    ledger.delete_remittance(&id)?;
    Ok(Json(ApiResponse::ok(id)))
}

/// POST /api/remittances/rent
async fn generate_rent(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<RemittanceRecord> {
    let mut ledger = lock(&state)?;
    let period = request.period.unwrap_or_else(|| calendar_period_of(today()));

    let record = match request.amount {
        Some(amount) => ledger.generate_rent_entry_for_amount(period, amount)?,
        None => ledger.generate_rent_entry(period)?,
    };
    Ok(Json(ApiResponse::ok(record)))
}

/// POST /api/remittances/settlement
async fn generate_settlement(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<GenerateOutcome> {
    let mut ledger = lock(&state)?;
    let period = request.period.unwrap_or_else(|| ledger.selected_period());
    Ok(Json(ApiResponse::ok(ledger.generate_settlement_entry(period)?)))
}

/// GET /api/trend
async fn get_trend(State(state): State<AppState>) -> ApiResult<Vec<TrendPoint>> {
    let ledger = lock(&state)?;
    Ok(Json(ApiResponse::ok(ledger.trend(today()))))
}

/// GET /api/activity
async fn get_activity(State(state): State<AppState>) -> ApiResult<Vec<ActivityEntry>> {
    let ledger = lock(&state)?;
    Ok(Json(ApiResponse::ok(ledger.activity_log()?)))
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = LedgerConfig::load_or_default(args.config.as_deref())?;
    if let Some(db) = args.db {
        config.database_path = db;
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }
    init_logging(&config.log_level);

    let store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;
    tracing::info!(path = %config.database_path.display(), "Database opened");

    let ledger = Ledger::new(store, config, today())?;

    // Create shared state
    let state = AppState {
        ledger: Arc::new(Mutex::new(ledger)),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/periods", get(get_periods))
        .route("/resolve", get(resolve_period))
        .route("/select", post(select_period))
        .route("/stats", get(get_stats))
        .route("/expenses", get(get_expenses).post(add_expense))
        .route("/expenses/:id", delete(delete_expense).put(edit_expense))
        .route("/categories", get(get_categories).post(add_category))
        .route("/categories/:name", delete(remove_category))
        .route("/remittances", get(get_remittances).post(add_remittance))
        .route("/remittances/:id", delete(delete_remittance))
        .route("/remittances/rent", post(generate_rent))
        .route("/remittances/settlement", post(generate_settlement))
        .route("/trend", get(get_trend))
        .route("/activity", get(get_activity))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()));

    let listener = tokio::net::TcpListener::bind(&args.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", args.addr))?;

    println!("🚀 Pair Ledger API running on http://{}", args.addr);
    println!("   Stats: http://{}/api/stats", args.addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
