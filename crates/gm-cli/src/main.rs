use anyhow::Result;
use clap::{Parser, Subcommand};
use uuid::Uuid;

mod commands;

#[derive(Parser)]
#[command(name = "gm")]
#[command(about = "Gophermart operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// User provisioning
    User {
        #[command(subcommand)]
        cmd: UserCmd,
    },

    /// Order registry commands
    Order {
        #[command(subcommand)]
        cmd: OrderCmd,
    },

    /// Print a user's balance as JSON
    Balance {
        #[arg(long)]
        user: Uuid,
    },

    /// Debit a user's balance against one of their orders
    Withdraw {
        #[arg(long)]
        user: Uuid,

        /// Order number the withdrawal is booked against
        #[arg(long)]
        order: String,

        /// Amount as decimal text (e.g. 12.50), at most six fractional digits
        #[arg(long)]
        sum: String,
    },

    /// Reconciliation worker commands
    Reconcile {
        #[command(subcommand)]
        cmd: ReconcileCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply embedded SQL migrations (idempotent)
    Migrate,
}

#[derive(Subcommand)]
enum UserCmd {
    /// Create a user and its zeroed balance row
    Create {
        #[arg(long)]
        login: String,

        /// Explicit user id; a fresh v4 id is generated when omitted
        #[arg(long)]
        id: Option<Uuid>,
    },
}

#[derive(Subcommand)]
enum OrderCmd {
    /// Register an order number for a user (validated before connecting)
    Submit {
        #[arg(long)]
        user: Uuid,

        #[arg(long)]
        number: String,
    },

    /// Print a user's orders as JSON, oldest first
    List {
        #[arg(long)]
        user: Uuid,
    },
}

#[derive(Subcommand)]
enum ReconcileCmd {
    /// Run a single reconciliation tick and print the report as JSON
    Tick {
        /// Base URL of the accrual service
        #[arg(long, env = gm_config::ENV_ACCRUAL_SYSTEM_ADDRESS)]
        accrual: String,

        /// Bound on each accrual request and each storage write
        #[arg(long, default_value_t = 10_000)]
        io_timeout_ms: u64,

        /// Max in-flight accrual queries
        #[arg(long, default_value_t = 4)]
        concurrency: usize,

        /// Max non-terminal orders pulled
        #[arg(long, default_value_t = 1_000)]
        batch_limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    gm_config::load_dotenv();
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = gm_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = gm_db::status(&pool).await?;
                    println!("db_ok={} has_orders_table={}", s.ok, s.has_orders_table);
                }
                DbCmd::Migrate => {
                    gm_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::User { cmd } => match cmd {
            UserCmd::Create { login, id } => commands::orders::user_create(&login, id).await?,
        },

        Commands::Order { cmd } => match cmd {
            OrderCmd::Submit { user, number } => commands::orders::submit(user, &number).await?,
            OrderCmd::List { user } => commands::orders::list(user).await?,
        },

        Commands::Balance { user } => commands::ledger::balance(user).await?,

        Commands::Withdraw { user, order, sum } => {
            commands::ledger::withdraw(user, &order, &sum).await?
        }

        Commands::Reconcile { cmd } => match cmd {
            ReconcileCmd::Tick {
                accrual,
                io_timeout_ms,
                concurrency,
                batch_limit,
            } => {
                commands::reconcile::tick(&accrual, io_timeout_ms, concurrency, batch_limit)
                    .await?
            }
        },
    }

    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();
}
