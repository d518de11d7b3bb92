use anyhow::{bail, Result};
use civic_core::{generate_transaction_id, Amount, TransactionType};
use clap::{Parser, Subcommand};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "civic-cli")]
#[command(about = "CLI client for the civic ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8080)
    #[arg(long, global = true, default_value = "http://127.0.0.1:8080")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record a payment as a new block
    Submit {
        /// Paying user
        #[arg(long)]
        user: String,
        /// tax_payment, crowdfunding or donation
        #[arg(long = "type")]
        kind: TransactionType,
        /// Decimal amount, at most two fractional digits
        #[arg(long)]
        amount: Amount,
        #[arg(long)]
        category: Option<String>,
        /// Required for crowdfunding
        #[arg(long)]
        campaign: Option<String>,
        /// Generated by the node when omitted
        #[arg(long)]
        transaction_id: Option<String>,
    },
    /// Audit the node's chain and record the result
    Verify {
        #[arg(long)]
        verified_by: Option<String>,
    },
    /// Totals and per-type counts
    Stats,
    /// Latest blocks, optionally filtered
    Blocks {
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Matches transaction id, block hash or category
        #[arg(long)]
        search: Option<String>,
        #[arg(long = "type")]
        kind: Option<TransactionType>,
    },
    /// Print a fresh transaction id without contacting the node
    Txid,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Submission {
    #[serde(skip_serializing_if = "Option::is_none")]
    transaction_id: Option<String>,
    user_id: String,
    #[serde(rename = "type")]
    kind: TransactionType,
    amount: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    campaign_id: Option<String>,
}

async fn print_response(res: reqwest::Response) -> Result<()> {
    let status = res.status();
    let body = res.text().await?;
    debug!(%status, "node responded");
    println!("{}", render_body(status, &body)?);
    Ok(())
}

/// Pretty JSON for successes; failures keep their status even when the body
/// is not the node's `{"error": ..}` shape.
fn render_body(status: StatusCode, body: &str) -> Result<String> {
    if !status.is_success() {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| body.trim().to_string());
        if message.is_empty() {
            bail!("{status}");
        }
        bail!("{status}: {message}");
    }
    let value: Value = serde_json::from_str(body)?;
    Ok(serde_json::to_string_pretty(&value)?)
}

fn blocks_query(search: Option<String>, kind: Option<TransactionType>, limit: usize) -> Vec<(&'static str, String)> {
    let mut query = vec![("limit", limit.to_string())];
    if let Some(search) = search {
        query.push(("search", search));
    }
    if let Some(kind) = kind {
        query.push(("type", kind.to_string()));
    }
    query
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let node = cli.node.trim_end_matches('/');
    let client = reqwest::Client::new();
    match cli.cmd {
        Command::Submit {
            user,
            kind,
            amount,
            category,
            campaign,
            transaction_id,
        } => {
            let body = Submission {
                transaction_id,
                user_id: user,
                kind,
                amount,
                category,
                campaign_id: campaign,
            };
            print_response(client.post(format!("{node}/blocks")).json(&body).send().await?).await?;
        }
        Command::Verify { verified_by } => {
            let mut req = client.post(format!("{node}/chain/verify"));
            if let Some(who) = verified_by {
                req = req.query(&[("verifiedBy", who)]);
            }
            print_response(req.send().await?).await?;
        }
        Command::Stats => {
            print_response(client.get(format!("{node}/stats")).send().await?).await?;
        }
        Command::Blocks { limit, search, kind } => {
            let req = client
                .get(format!("{node}/blocks"))
                .query(&blocks_query(search, kind, limit));
            print_response(req.send().await?).await?;
        }
        Command::Txid => println!("{}", generate_transaction_id()),
    }
    Ok(())
}
