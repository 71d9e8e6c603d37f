use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use vault_core::{ActionKind, CoreConfig, CoreEvent, CoreRuntime};

#[derive(Parser)]
#[command(name = "vault-cli")]
#[command(about = "Inbox sync client for the vault backend")]
struct Cli {
    /// REST API base URL
    #[arg(long, default_value = "http://localhost:8000/api/v1")]
    api_base: String,

    /// Push endpoint base URL
    #[arg(long, default_value = "ws://localhost:8000")]
    push_base: String,

    /// User/session identifier for the push connection
    #[arg(long, short = 'u', default_value = "1")]
    user: String,

    /// Bearer token (falls back to $VAULT_TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Pretty-print JSON output
    #[arg(long, short)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the inbox snapshot and print it
    List,

    /// Connect the push channel and print inbox changes until interrupted
    Watch,

    /// Dismiss a pending item
    Dismiss {
        /// Item ID (e.g. mem_42)
        item_id: String,
    },

    /// Accept a merge suggestion for an item
    AcceptMerge {
        item_id: String,
    },

    /// Reject a merge suggestion for an item
    RejectMerge {
        item_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let mut config = CoreConfig::new(cli.user.clone())
        .with_api_base(cli.api_base.clone())
        .with_push_base(cli.push_base.clone());
    if let Some(token) = cli.token.clone().or_else(|| std::env::var("VAULT_TOKEN").ok()) {
        config = config.with_bearer_token(token);
    }

    let mut runtime = CoreRuntime::new(config);

    match cli.command {
        Commands::List => {
            let handle = runtime.start().await?;
            let (items, clusters) = {
                let store = handle.store().lock();
                (
                    store
                        .pending_items()
                        .into_iter()
                        .cloned()
                        .collect::<Vec<_>>(),
                    store.clusters().to_vec(),
                )
            };
            let output = serde_json::json!({
                "count": items.len(),
                "items": items,
                "clusters": clusters,
            });
            print_json(&output, cli.pretty)?;
            runtime.shutdown().await;
        }

        Commands::Watch => {
            let handle = runtime.start().await?;
            let mut events = runtime
                .take_events()
                .expect("events receiver already taken");
            info!(count = handle.count(), "inbox loaded; watching for changes");

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    event = events.recv() => {
                        let Some(event) = event else { break };
                        match event {
                            CoreEvent::InboxChanged { count } => {
                                println!("inbox changed: {count} pending");
                            }
                            CoreEvent::ActionFailed { item_id, error } => {
                                eprintln!("action on {item_id} failed: {error}");
                            }
                            CoreEvent::FetchFailed { error } => {
                                eprintln!("refresh failed: {error}");
                            }
                            CoreEvent::ConnectionChanged(status) => {
                                println!("push channel: {status:?}");
                            }
                        }
                    }
                }
            }
            runtime.shutdown().await;
        }

        Commands::Dismiss { item_id } => {
            submit(&mut runtime, &item_id, ActionKind::Dismiss, cli.pretty).await?;
        }
        Commands::AcceptMerge { item_id } => {
            submit(&mut runtime, &item_id, ActionKind::AcceptMerge, cli.pretty).await?;
        }
        Commands::RejectMerge { item_id } => {
            submit(&mut runtime, &item_id, ActionKind::RejectMerge, cli.pretty).await?;
        }
    }

    Ok(())
}

async fn submit(
    runtime: &mut CoreRuntime,
    item_id: &str,
    kind: ActionKind,
    pretty: bool,
) -> Result<()> {
    let handle = runtime.start().await?;
    let outcome = handle.submit(item_id, kind, None).await?;
    let output = serde_json::json!({
        "item_id": item_id,
        "outcome": format!("{outcome:?}"),
        "pending": handle.count(),
    });
    print_json(&output, pretty)?;
    runtime.shutdown().await;
    Ok(())
}

fn print_json(value: &serde_json::Value, pretty: bool) -> Result<()> {
    if pretty {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", serde_json::to_string(value)?);
    }
    Ok(())
}
