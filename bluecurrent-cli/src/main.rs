//! Blue Current CLI
//!
//! Runs one client operation and prints the result as JSON.
//!
//! # Usage
//!
//! ```bash
//! export BLUECURRENT_USERNAME=user@example.com
//! export BLUECURRENT_PASSWORD=secret
//!
//! # Live data over the socket
//! bluecurrent charge-points
//! bluecurrent status BCU101
//!
//! # Physical actions
//! bluecurrent set-status BCU101 --disable
//! bluecurrent unlock BCU101
//!
//! # History over REST
//! bluecurrent transactions BCU101 --limit 50
//! ```

use clap::{Parser, Subcommand};
use futures_util::{pin_mut, StreamExt};
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use bluecurrent_client::{BlueCurrentClient, ClientConfig};

/// Blue Current charging cloud client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Account username
    #[arg(short, long, env = "BLUECURRENT_USERNAME")]
    username: String,

    /// Account password
    #[arg(short, long, env = "BLUECURRENT_PASSWORD", hide_env_values = true)]
    password: String,

    /// REST base URL
    #[arg(long, env = "BLUECURRENT_API_URL", default_value = bluecurrent_client::config::DEFAULT_API_URL)]
    api_url: String,

    /// Socket URL
    #[arg(long, env = "BLUECURRENT_SOCKET_URL", default_value = bluecurrent_client::config::DEFAULT_SOCKET_URL)]
    socket_url: String,

    /// Log level; RUST_LOG takes precedence when set
    #[arg(
        short,
        long,
        default_value = "warn",
        value_parser = ["trace", "debug", "info", "warn", "error"]
    )]
    log_level: String,

    #[command(subcommand)]
    command: Operation,
}

#[derive(Subcommand, Debug)]
enum Operation {
    /// Account information
    Account,
    /// Registered charge cards
    ChargeCards,
    /// Charge points of the account
    ChargePoints,
    /// Settings of one charge point
    Settings { evse_id: String },
    /// Grid currents of one charge point
    GridStatus { evse_id: String },
    /// Charging sessions of one charge point
    Sessions { evse_id: String },
    /// Live status of one charge point
    Status { evse_id: String },
    /// Sustainability figures of the account
    Sustainability,
    /// Make a charge point operative, or inoperative with --disable
    SetStatus {
        evse_id: String,
        #[arg(long)]
        disable: bool,
    },
    /// Unlock the connector of a charge point
    Unlock { evse_id: String },
    /// Soft-reset a charge point
    Reset { evse_id: String },
    /// Charge point status from the REST endpoint
    ChargePointStatus { evse_id: String },
    /// Contracts of the account
    Contracts,
    /// Grids of the account
    Grids,
    /// Transactions of a charge point, newest first
    Transactions {
        evse_id: String,
        /// Stop after this many transactions
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        oldest_first: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Setup logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(log_filter(&args.log_level))
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = ClientConfig::new()
        .with_api_url(&args.api_url)
        .with_socket_url(&args.socket_url);
    let client = BlueCurrentClient::with_config(&args.username, &args.password, config);

    client.connect().await?;
    let result = run(&client, args.command).await;
    client.disconnect().await;

    println!("{}", serde_json::to_string_pretty(&result?)?);
    Ok(())
}

fn log_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

async fn run(
    client: &BlueCurrentClient,
    operation: Operation,
) -> Result<Value, bluecurrent_client::ClientError> {
    debug!(?operation, "Running operation");
    let value = match operation {
        Operation::Account => Value::Object(client.get_account().await?),
        Operation::ChargeCards => client.get_charge_cards().await?,
        Operation::ChargePoints => client.get_charge_points().await?,
        Operation::Settings { evse_id } => client.get_charge_point_settings(&evse_id).await?,
        Operation::GridStatus { evse_id } => client.get_grid_status(&evse_id).await?,
        Operation::Sessions { evse_id } => Value::Object(client.get_sessions(&evse_id).await?),
        Operation::Status { evse_id } => Value::Object(client.get_status(&evse_id).await?),
        Operation::Sustainability => Value::Object(client.get_sustainability_status().await?),
        Operation::SetStatus { evse_id, disable } => {
            Value::Object(client.set_status(&evse_id, !disable).await?)
        }
        Operation::Unlock { evse_id } => Value::Object(client.unlock_connector(&evse_id).await?),
        Operation::Reset { evse_id } => Value::Object(client.soft_reset(&evse_id).await?),
        Operation::ChargePointStatus { evse_id } => {
            client.get_charge_point_status(&evse_id).await?
        }
        Operation::Contracts => client.get_contracts().await?,
        Operation::Grids => client.get_grids().await?,
        Operation::Transactions {
            evse_id,
            limit,
            oldest_first,
        } => {
            let transactions = client.iterate_transactions(&evse_id, !oldest_first);
            pin_mut!(transactions);

            let mut collected = Vec::new();
            while limit.map_or(true, |limit| collected.len() < limit) {
                match transactions.next().await {
                    Some(transaction) => collected.push(transaction?),
                    None => break,
                }
            }
            Value::Array(collected)
        }
    };
    Ok(value)
}
