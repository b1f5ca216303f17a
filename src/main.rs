use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use budget_ledger::cli::{
    handle_account_command, handle_audit_command, handle_budget_command, handle_category_command,
    handle_period_command, handle_transaction_command, handle_verify_command, AccountCommands,
    BudgetCommands, CategoryCommands, PeriodCommands, TransactionCommands,
};
use budget_ledger::config::{LedgerPaths, Settings};
use budget_ledger::logging::init_tracing;
use budget_ledger::models::OwnerId;
use budget_ledger::Ledger;

#[derive(Parser)]
#[command(
    name = "ledger",
    version,
    about = "Monthly budget ledger with category rollover",
    long_about = "Track account balances, record income, expenses and transfers, \
                  compare allocated against actual spending per category, and \
                  roll each category's remainder into the next month."
)]
struct Cli {
    /// Owner ID to act as; defaults to the owner created by 'ledger init'
    #[arg(long, global = true, env = "BUDGET_LEDGER_OWNER")]
    owner: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the ledger and create a default owner
    Init,

    /// Show current configuration and paths
    Config,

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Category management commands
    #[command(subcommand)]
    Category(CategoryCommands),

    /// Budget allocation commands
    #[command(subcommand)]
    Budget(BudgetCommands),

    /// Transaction commands
    #[command(subcommand)]
    Txn(TransactionCommands),

    /// Budget period commands
    #[command(subcommand)]
    Period(PeriodCommands),

    /// Show recent changes from the audit log
    Audit {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Check balances, periods, transfers and summaries against history
    Verify,
}

fn resolve_owner(flag: Option<String>, settings: &Settings) -> Result<OwnerId> {
    match flag {
        Some(raw) => raw
            .parse::<OwnerId>()
            .with_context(|| format!("'{}' is not a valid owner ID", raw)),
        None => settings
            .owner_id
            .context("No owner configured. Run 'ledger init' or pass --owner"),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let paths = LedgerPaths::new()?;
    let mut settings = Settings::load_or_create(&paths)?;
    init_tracing(&settings.log_level);

    let Some(command) = cli.command else {
        println!("ledger - monthly budget ledger");
        println!();
        println!("Run 'ledger --help' for usage information.");
        return Ok(());
    };

    match command {
        Commands::Init => {
            paths.ensure_directories()?;
            let owner = match settings.owner_id {
                Some(owner) => owner,
                None => {
                    let owner = OwnerId::new();
                    settings.owner_id = Some(owner);
                    owner
                }
            };
            settings.save(&paths)?;
            Ledger::open(&paths, settings)?;

            println!("Initialized ledger at: {}", paths.base_dir().display());
            println!("Owner ID: {}", owner.as_uuid());
        }
        Commands::Config => {
            println!("Ledger configuration");
            println!("====================");
            println!("Base directory: {}", paths.base_dir().display());
            println!("Ledger file:    {}", paths.ledger_file().display());
            println!("Settings file:  {}", paths.settings_file().display());
            println!("Audit log:      {}", paths.audit_log().display());
            println!(
                "Initialized:    {}",
                if paths.is_initialized() { "yes" } else { "no (run 'ledger init')" }
            );
            println!();
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        command => {
            let owner = resolve_owner(cli.owner, &settings)?;
            let ledger = Ledger::open(&paths, settings)?;
            match command {
                Commands::Account(cmd) => handle_account_command(&ledger, owner, cmd)?,
                Commands::Category(cmd) => handle_category_command(&ledger, owner, cmd)?,
                Commands::Budget(cmd) => handle_budget_command(&ledger, owner, cmd)?,
                Commands::Txn(cmd) => handle_transaction_command(&ledger, owner, cmd)?,
                Commands::Period(cmd) => handle_period_command(&ledger, owner, cmd)?,
                Commands::Audit { limit } => handle_audit_command(&ledger, owner, limit)?,
                Commands::Verify => handle_verify_command(&ledger, owner)?,
                Commands::Init | Commands::Config => {}
            }
        }
    }

    Ok(())
}
