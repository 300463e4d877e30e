// Pair Ledger - CLI
// Every subcommand goes through the `Ledger` facade over the SQLite store.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use pair_ledger::logging::init_logging;
use pair_ledger::validation::parse_date;
use pair_ledger::{
    calendar_period_of, load_csv, period_label, ExpenseForm, ExpenseRecord, GenerateOutcome, Ledger,
    LedgerConfig, PeriodKey, PeriodMode, RemittanceForm, RemittanceRecord, SqliteStore,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pair-ledger")]
#[command(about = "Two-person shared expense ledger with payroll-period settlement")]
#[command(version)]
struct Cli {
    /// JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database (overrides the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log level (debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct ExpenseArgs {
    /// YYYY-MM-DD
    #[arg(long)]
    date: String,

    #[arg(long)]
    amount: String,

    /// Display name or first/second
    #[arg(long)]
    person: String,

    #[arg(long)]
    category: String,

    #[arg(long, default_value = "")]
    description: String,

    #[arg(long)]
    memo: Option<String>,
}

impl From<ExpenseArgs> for ExpenseForm {
    fn from(args: ExpenseArgs) -> Self {
        ExpenseForm {
            date: args.date,
            description: args.description,
            amount: args.amount,
            participant: args.person,
            category: args.category,
            memo: args.memo,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List periods that have data, newest first
    Periods {
        /// payroll (expenses) or calendar (remittances)
        #[arg(long, default_value = "payroll")]
        mode: PeriodMode,
    },
    /// Period key and date range owning a date
    Resolve {
        /// YYYY-MM-DD, defaults to today
        #[arg(long)]
        date: Option<String>,
        #[arg(long, default_value = "payroll")]
        mode: PeriodMode,
    },
    /// Totals, category breakdown and settlement for a payroll period
    Stats {
        /// YYYY-MM, defaults to the current payroll period
        #[arg(long)]
        period: Option<PeriodKey>,
        /// Step to the closest older period with data
        #[arg(long, conflicts_with = "next")]
        prev: bool,
        /// Step to the closest newer period with data
        #[arg(long)]
        next: bool,
    },
    /// Add an expense
    Add(ExpenseArgs),
    /// Replace an expense
    Edit {
        id: String,
        #[command(flatten)]
        expense: ExpenseArgs,
    },
    /// Delete an expense
    Delete { id: String },
    /// List the expenses of a payroll period
    List {
        #[arg(long)]
        period: Option<PeriodKey>,
    },
    /// Show or change the category list
    Categories {
        #[command(subcommand)]
        action: Option<CategoryAction>,
    },
    /// Record a manual remittance (negative amount = received)
    Remit {
        #[arg(long)]
        date: String,
        #[arg(long, allow_hyphen_values = true)]
        amount: String,
        /// "partner" or an institution name
        #[arg(long, default_value = "partner")]
        target: String,
        #[arg(long)]
        memo: Option<String>,
    },
    /// List remittances of a calendar month with per-target totals
    Remittances {
        #[arg(long)]
        period: Option<PeriodKey>,
        #[command(subcommand)]
        action: Option<RemittanceAction>,
    },
    /// Generate (or regenerate) the rent entry for a calendar month
    Rent {
        #[arg(long)]
        period: Option<PeriodKey>,
        /// Overrides the configured rent
        #[arg(long)]
        amount: Option<f64>,
    },
    /// Mirror a payroll period's settlement into the remittances
    Settle {
        #[arg(long)]
        period: Option<PeriodKey>,
    },
    /// Last six payroll periods
    Trend,
    /// Activity log, newest first
    Log {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Import expenses from CSV (date,description,amount,person,category,memo)
    Import { csv: PathBuf },
}

#[derive(Subcommand, Debug)]
enum CategoryAction {
    Add { name: String },
    Remove { name: String },
}

#[derive(Subcommand, Debug)]
enum RemittanceAction {
    Delete { id: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = LedgerConfig::load_or_default(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    init_logging(&config.log_level);

    let today = Local::now().date_naive();
    let store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;
    let mut ledger = Ledger::new(store, config, today)?;

    run(&mut ledger, cli.command, today)
}

fn run(ledger: &mut Ledger<SqliteStore>, command: Command, today: NaiveDate) -> Result<()> {
    match command {
        Command::Periods { mode } => {
            println!("📅 Periods ({})", mode.as_str());
            for key in ledger.available_periods(mode, today) {
                println!("   {}", period_label(key, mode));
            }
        }
        Command::Resolve { date, mode } => {
            let date = match date {
                Some(date) => parse_date("date", &date)?,
                None => today,
            };
            let (key, range) = ledger.resolve_period(date, mode);
            println!("📅 {} → {} ({})", date, key, mode.as_str());
            println!("   {} 〜 {}", range.start, range.end);
        }
        Command::Stats { period, prev, next } => {
            if let Some(period) = period {
                ledger.select_period(period);
            }
            let stepped = if prev {
                ledger.select_previous(today)
            } else if next {
                ledger.select_next(today)
            } else {
                Some(ledger.selected_period())
            };
            if stepped.is_none() {
                println!("ℹ️  No further period with data, staying on {}", ledger.selected_period());
            }
            let selected = ledger.selected_period();
            print_stats(ledger, selected);
        }
        Command::Add(args) => {
            let record = ledger.add_expense(args.into())?;
            println!("✓ Added expense {}", record.id);
            print_expense(ledger.config(), &record);
        }
        Command::Edit { id, expense } => {
            let record = ledger.edit_expense(&id, expense.into())?;
            println!("✓ Updated expense {}", record.id);
            print_expense(ledger.config(), &record);
        }
        Command::Delete { id } => {
            let record = ledger.delete_expense(&id)?;
            println!("✓ Deleted expense {}", record.id);
        }
        Command::List { period } => {
            let period = period.unwrap_or_else(|| ledger.selected_period());
            let expenses = ledger.expenses_in(period);

            println!("🧾 {} - {} expenses", period_label(period, PeriodMode::Payroll), expenses.len());
            for record in expenses {
                print_expense(ledger.config(), record);
            }
        }
        Command::Categories { action } => {
            match action {
                Some(CategoryAction::Add { name }) => {
                    ledger.add_category(&name)?;
                    println!("✓ Added category {}", name);
                }
                Some(CategoryAction::Remove { name }) => {
                    ledger.remove_category(&name)?;
                    println!("✓ Removed category {}", name);
                }
                None => {}
            }

            let categories = ledger.categories();
            println!("📂 Categories (v{})", categories.version);
            for name in categories.iter() {
                let marker = if name == ledger.config().advance_category { "  (advance)" } else { "" };
                println!("   {}{}", name, marker);
            }
        }
        Command::Remit { date, amount, target, memo } => {
            let record = ledger.add_remittance(RemittanceForm { date, amount, target, memo })?;
            println!("✓ Added remittance {}", record.id);
            print_remittance(&record);
        }
        Command::Remittances { period, action } => {
            if let Some(RemittanceAction::Delete { id }) = action {
                ledger.delete_remittance(&id)?;
                println!("✓ Deleted remittance {}", id);
                return Ok(());
            }

            let period = period.unwrap_or_else(|| calendar_period_of(today));
            let stats = ledger.remittance_stats(period);

            println!("💸 Remittances {}", period_label(period, PeriodMode::Calendar));
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            for record in ledger.remittances_in(period) {
                print_remittance(record);
            }
            println!("\n📊 By target");
            for total in &stats.per_target {
                println!("   {:<20} {}", total.target, yen(total.amount));
            }
            println!("   Outgoing: {}", yen(stats.total_outgoing));
            println!("   Incoming: {}", yen(stats.total_incoming));
        }
        Command::Rent { period, amount } => {
            let period = period.unwrap_or_else(|| calendar_period_of(today));
            let record = match amount {
                Some(amount) => ledger.generate_rent_entry_for_amount(period, amount)?,
                None => ledger.generate_rent_entry(period)?,
            };
            println!("✓ Rent entry for {}", period);
            print_remittance(&record);
        }
        Command::Settle { period } => {
            let period = period.unwrap_or_else(|| ledger.selected_period());
            match ledger.generate_settlement_entry(period)? {
                GenerateOutcome::Generated { record } => {
                    println!("✓ Settlement entry for {}", period);
                    print_remittance(&record);
                }
                GenerateOutcome::NothingToSettle => {
                    println!("✅ Nothing to settle for {}", period);
                }
            }
        }
        Command::Trend => {
            let config = ledger.config();
            println!("📈 Trend");
            println!(
                "   {:<8} {:>12} {:>12} {:>12}",
                "period", "total", config.participants.first, config.participants.second
            );
            for point in ledger.trend(today) {
                println!(
                    "   {:<8} {:>12} {:>12} {:>12}",
                    point.period.to_string(),
                    yen(point.total),
                    yen(point.display_totals.first),
                    yen(point.display_totals.second)
                );
            }
        }
        Command::Log { limit } => {
            println!("📜 Activity");
            for entry in ledger.activity_log()?.into_iter().take(limit) {
                println!(
                    "   {}  {:<8} {}",
                    entry.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                    entry.action.as_str(),
                    entry.details
                );
            }
        }
        Command::Import { csv } => {
            println!("📂 Loading CSV...");
            let forms = load_csv(&csv)?;
            println!("✓ Loaded {} rows", forms.len());

            let summary = ledger.import_expenses(forms)?;
            println!("✓ Imported {} expenses across {} periods", summary.imported, summary.periods);
            if summary.skipped_duplicates > 0 {
                println!("✓ Duplicates skipped: {}", summary.skipped_duplicates);
            }
        }
    }

    Ok(())
}

fn yen(amount: f64) -> String {
    format!("¥{:.0}", amount)
}

fn print_stats(ledger: &Ledger<SqliteStore>, period: PeriodKey) {
    let config = ledger.config();
    let stats = ledger.stats(period);

    println!("📊 {}", period_label(period, PeriodMode::Payroll));
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("   {:<12} {}", config.participants.first, yen(stats.display_totals.first));
    println!("   {:<12} {}", config.participants.second, yen(stats.display_totals.second));
    println!("   Shared total: {} (half {})", yen(stats.normal_total), yen(stats.half));

    if !stats.category_breakdown.is_empty() {
        println!("\n📂 Categories");
        for category in &stats.category_breakdown {
            println!("   {:<12} {}", category.name, yen(category.amount));
        }
    }

    println!();
    if stats.settlement.is_settled() {
        println!("✅ Nothing to settle");
    } else {
        println!(
            "⚖️  {} {}",
            stats
                .settlement
                .direction
                .label(&config.participants.first, &config.participants.second),
            yen(stats.settlement.amount)
        );
    }
}

fn print_expense(config: &LedgerConfig, record: &ExpenseRecord) {
    let bearer = record.bearer(&config.advance_category);
    let bearer_note = if bearer != record.participant {
        format!("  (for {})", config.participant_name(bearer))
    } else {
        String::new()
    };

    println!(
        "   {}  {:<8} {:>10}  {:<10} {}{}  [{}]",
        record.date,
        config.participant_name(record.participant),
        yen(record.amount),
        record.category,
        record.description,
        bearer_note,
        record.id
    );
}

fn print_remittance(record: &RemittanceRecord) {
    let auto = if record.auto { " (auto)" } else { "" };
    println!(
        "   {}  {:>10}  {:<16} {}{}  [{}]",
        record.date,
        yen(record.amount),
        record.target.label(),
        record.memo,
        auto,
        record.id
    );
}
