use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use fintrack::types::{
    AnalysisFilter, NewBudget, NewTransaction, TransactionFilter, TransactionType,
};
use fintrack::{ApiClient, ApiError, ClientConfig, FileSessionStore};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fintrack", version, about = "Client for the finance tracker API")]
struct Cli {
    /// Base URL of the API server.
    #[arg(long, env = "FINTRACK_API_URL", default_value = fintrack::config::DEFAULT_BASE_URL)]
    api_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new account.
    Register {
        username: String,
        email: String,
        password: String,
    },
    /// Log in and store the session tokens.
    Login { username: String, password: String },
    /// Discard the stored session.
    Logout,
    /// List, record, or delete transactions.
    #[command(subcommand)]
    Transactions(TransactionsCommand),
    /// List or create monthly budgets.
    #[command(subcommand)]
    Budgets(BudgetsCommand),
    /// Income/expense totals for one month.
    Summary {
        /// Month in YYYY-MM form.
        month: String,
    },
    /// Spending trend and category breakdown.
    Analysis(AnalysisArgs),
    /// Convert an amount between currencies.
    Convert {
        amount: f64,
        from_currency: String,
        to_currency: String,
    },
    /// Download the transaction history as CSV.
    Export {
        /// Write the CSV to a file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum TransactionsCommand {
    List(ListArgs),
    Add(AddTransactionArgs),
    Delete { id: i64 },
}

#[derive(Args)]
struct ListArgs {
    #[arg(long)]
    start_date: Option<NaiveDate>,
    #[arg(long)]
    end_date: Option<NaiveDate>,
    /// income or expense.
    #[arg(long = "type")]
    transaction_type: Option<TransactionType>,
    #[arg(long)]
    category: Option<String>,
}

#[derive(Args)]
struct AddTransactionArgs {
    amount: f64,
    category: String,
    /// income or expense.
    #[arg(long = "type", default_value = "expense")]
    transaction_type: TransactionType,
    #[arg(long)]
    description: Option<String>,
}

#[derive(Subcommand)]
enum BudgetsCommand {
    List,
    Add {
        /// Month in YYYY-MM form.
        month: String,
        limit: f64,
    },
}

#[derive(Args)]
struct AnalysisArgs {
    #[arg(long)]
    start_date: Option<NaiveDate>,
    #[arg(long)]
    end_date: Option<NaiveDate>,
    #[arg(long)]
    category: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), ApiError> {
    let store = FileSessionStore::from_env().ok_or_else(|| {
        ApiError::Config("HOME is not set; cannot locate the session file".to_string())
    })?;
    let config = ClientConfig::default().with_base_url(cli.api_url);
    let client = ApiClient::new(config, store)?;

    match cli.command {
        Command::Register {
            username,
            email,
            password,
        } => {
            let user = client.register(&username, &email, &password).await?;
            println!("registered {} <{}>", user.username, user.email);
        }
        Command::Login { username, password } => {
            client.login(&username, &password).await?;
            println!("logged in as {username}");
        }
        Command::Logout => {
            client.logout();
            println!("logged out");
        }
        Command::Transactions(command) => run_transactions(&client, command).await?,
        Command::Budgets(command) => run_budgets(&client, command).await?,
        Command::Summary { month } => {
            let summary = client.monthly_summary(&month).await?;
            println!("{}", summary.month);
            println!("  income    {:>12.2}", summary.income);
            println!("  expenses  {:>12.2}", summary.expenses);
            println!("  net       {:>12.2}", summary.net_balance);
        }
        Command::Analysis(args) => {
            let filter = AnalysisFilter {
                start_date: args.start_date,
                end_date: args.end_date,
                category: args.category,
            };
            let analysis = client.spending_analysis(&filter).await?;
            println!("monthly trend:");
            for (label, value) in analysis
                .monthly_trend
                .labels
                .iter()
                .zip(&analysis.monthly_trend.values)
            {
                println!("  {label}  {value:>12.2}");
            }
            println!("by category:");
            for (label, value) in analysis
                .category_breakdown
                .labels
                .iter()
                .zip(&analysis.category_breakdown.values)
            {
                println!("  {label}  {value:>12.2}");
            }
            println!("recent:");
            for tx in &analysis.recent_transactions {
                print_transaction(tx);
            }
        }
        Command::Convert {
            amount,
            from_currency,
            to_currency,
        } => {
            let conversion = client
                .convert_currency(amount, &from_currency, &to_currency)
                .await?;
            println!(
                "{amount} {from_currency} = {:.2} {to_currency}",
                conversion.converted_amount
            );
        }
        Command::Export { output } => {
            let csv = client.export_transactions().await?;
            match output {
                Some(path) => {
                    std::fs::write(&path, csv).map_err(|err| {
                        ApiError::Config(format!("cannot write {}: {err}", path.display()))
                    })?;
                    println!("wrote {}", path.display());
                }
                None => print!("{csv}"),
            }
        }
    }
    Ok(())
}

async fn run_transactions(
    client: &ApiClient<FileSessionStore>,
    command: TransactionsCommand,
) -> Result<(), ApiError> {
    match command {
        TransactionsCommand::List(args) => {
            let filter = TransactionFilter {
                start_date: args.start_date,
                end_date: args.end_date,
                transaction_type: args.transaction_type,
                category: args.category,
            };
            let transactions = client.transactions(&filter).await?;
            for tx in &transactions {
                print_transaction(tx);
            }
            if transactions.is_empty() {
                println!("no transactions");
            }
        }
        TransactionsCommand::Add(args) => {
            let transaction = NewTransaction {
                transaction_date: Utc::now(),
                amount: args.amount,
                category: args.category,
                transaction_type: args.transaction_type,
                description: args.description,
            };
            let created = client.create_transaction(&transaction).await?;
            println!("created transaction {}", created.id);
        }
        TransactionsCommand::Delete { id } => {
            client.delete_transaction(id).await?;
            println!("deleted transaction {id}");
        }
    }
    Ok(())
}

async fn run_budgets(
    client: &ApiClient<FileSessionStore>,
    command: BudgetsCommand,
) -> Result<(), ApiError> {
    match command {
        BudgetsCommand::List => {
            let budgets = client.budgets().await?;
            for budget in &budgets {
                println!(
                    "{}  limit {:>10.2}  spent {:>10.2}  remaining {:>10.2}",
                    budget.month,
                    budget.limit,
                    budget.spent_amount.unwrap_or(0.0),
                    budget.remaining_amount.unwrap_or(budget.limit),
                );
            }
            if budgets.is_empty() {
                println!("no budgets");
            }
        }
        BudgetsCommand::Add { month, limit } => {
            let created = client.create_budget(&NewBudget { month, limit }).await?;
            println!("created budget for {}", created.month);
        }
    }
    Ok(())
}

fn print_transaction(tx: &fintrack::types::Transaction) {
    println!(
        "{:>6}  {}  {:>12.2}  {:<7}  {}  {}",
        tx.id,
        tx.transaction_date.format("%Y-%m-%d"),
        tx.amount,
        tx.transaction_type,
        tx.category,
        tx.description.as_deref().unwrap_or("-"),
    );
}
