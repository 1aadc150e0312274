use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, miette};
use simledger::application::engine::TransactionEngine;
use simledger::domain::money::MinorAmount;
use simledger::domain::order::OrderKind;
use simledger::domain::ports::StoreRef;
use simledger::domain::transaction::TxKind;
use simledger::domain::user::ExternalId;
use simledger::infrastructure::in_memory::InMemoryLedgerStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Admin tool for the number-reselling ledger.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Credit a user's balance; amount in major units, e.g. "150.00"
    Credit { external_id: i64, amount: String },
    /// Show a user's balance
    Balance { external_id: i64 },
    /// List a user's transactions, most recent first
    History { external_id: i64 },
    /// List a user's orders, most recent first
    Orders {
        external_id: i64,
        /// List rentals instead of purchases
        #[arg(long)]
        rentals: bool,
    },
}

#[cfg(feature = "storage-rocksdb")]
fn build_store(db_path: Option<PathBuf>) -> Result<StoreRef> {
    use simledger::infrastructure::rocksdb::RocksDbLedgerStore;

    match db_path {
        Some(path) => {
            let store = RocksDbLedgerStore::open(path).into_diagnostic()?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(InMemoryLedgerStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn build_store(db_path: Option<PathBuf>) -> Result<StoreRef> {
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Arc::new(InMemoryLedgerStore::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = build_store(cli.db_path)?;
    let engine = TransactionEngine::new(Arc::clone(&store));

    match cli.command {
        Command::Credit {
            external_id,
            amount,
        } => {
            let amount = MinorAmount::from_major_str(&amount).into_diagnostic()?;
            if !amount.is_positive() {
                return Err(miette!("credit amount must be positive"));
            }
            let external = ExternalId(external_id);
            let user = store
                .get_or_create_user(external, &external_id.to_string(), None)
                .await
                .into_diagnostic()?;
            let applied = engine
                .charge_or_deposit(user, amount, TxKind::Deposit, "manual admin credit")
                .await
                .into_diagnostic()?;
            if !applied {
                return Err(miette!("credit was not applied"));
            }
            let balance = store.get_balance(user).await.into_diagnostic()?;
            println!("credited {amount} to user {external_id}; balance is now {balance}");
        }
        Command::Balance { external_id } => {
            let balance = match store
                .get_user(ExternalId(external_id))
                .await
                .into_diagnostic()?
            {
                Some(user) => user.balance,
                None => MinorAmount::ZERO,
            };
            println!("balance of user {external_id}: {balance}");
        }
        Command::History { external_id } => {
            let Some(user) = store
                .get_user(ExternalId(external_id))
                .await
                .into_diagnostic()?
            else {
                println!("no such user: {external_id}");
                return Ok(());
            };
            for tx in store.list_transactions(user.id).await.into_diagnostic()? {
                println!(
                    "{}  {:<8}  {:>12}  {}",
                    tx.created_at.format("%Y-%m-%d %H:%M:%S"),
                    tx.kind,
                    tx.amount.to_string(),
                    tx.details
                );
            }
        }
        Command::Orders {
            external_id,
            rentals,
        } => {
            let Some(user) = store
                .get_user(ExternalId(external_id))
                .await
                .into_diagnostic()?
            else {
                println!("no such user: {external_id}");
                return Ok(());
            };
            let kind = if rentals {
                OrderKind::Rental
            } else {
                OrderKind::Purchase
            };
            for order in store.list_orders(user.id, kind).await.into_diagnostic()? {
                let expiry = order
                    .expires_at
                    .map(|t| format!(", expires {}", t.format("%Y-%m-%d %H:%M")))
                    .unwrap_or_default();
                println!(
                    "{}  {:<10}  {}  {:?}{expiry}",
                    order.created_at.format("%Y-%m-%d %H:%M:%S"),
                    order.service,
                    order.phone_number,
                    order.status,
                );
            }
        }
    }

    Ok(())
}
