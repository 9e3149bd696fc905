use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use hpit::{
    config::HubSettings,
    logger::init_tracing,
    runner::{run_plugin, RunOptions},
};
use hpit_client::{http_transport::HttpTransport, Callback, Message, Plugin};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "hpit",
    about = "Subscribe to, poll and answer HPIT hub messages",
    version = "0.2.0"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Log level override (e.g. error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Also write a daily rolling log file into this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// .env file with HPIT_* settings. Defaults to ./.env when present
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Poll the hub and log every message until Ctrl-C
    Run(RunArgs),

    /// Print the subscriptions the hub knows for this entity
    Subscriptions,

    /// Send one response for a message id
    Respond {
        message_id: String,
        /// JSON payload
        payload: String,
    },

    /// Print the JSON schema of a hub message
    Schema,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Event names to subscribe to on start
    #[arg(long = "subscribe", value_name = "EVENT")]
    subscriptions: Vec<String>,

    /// Answer every message with its own payload
    #[arg(long, default_value_t = false)]
    echo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.global.log_level, cli.global.log_dir.clone())?;

    match cli.command {
        Commands::Schema => {
            let schema = schemars::schema_for!(Message);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
        command => connect_and_run(command, &cli.global).await,
    }
}

/// Every command that needs settings, credentials and a transport.
async fn connect_and_run(command: Commands, global: &GlobalArgs) -> anyhow::Result<()> {
    let settings = HubSettings::load(global.env_file.as_deref())?;
    let identity = settings.identity()?;
    let transport = HttpTransport::new(settings.url_root.clone(), settings.request_timeout())
        .context("could not build http client")?;
    info!(url_root = %transport.url_root(), entity_id = %identity.entity_id(), "hpit starting");

    match command {
        Commands::Run(args) => {
            let (stop_tx, stop_rx) = watch::channel(());
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => info!("🛑 Ctrl-C received, stopping"),
                    Err(e) => error!("could not listen for Ctrl-C: {e}"),
                }
                let _ = stop_tx.send(());
            });
            let options = RunOptions {
                subscriptions: args.subscriptions,
                echo: args.echo,
                poll_wait: settings.poll_wait(),
            };
            run_plugin(transport, identity, options, stop_rx).await
        }
        Commands::Subscriptions => {
            let mut plugin = Plugin::new(identity, Vec::<String>::new(), transport).await?;
            for (name, callback) in plugin.list_subscriptions().await? {
                let state = match callback {
                    Callback::Handler(_) => "handled",
                    Callback::Unresolved => "unresolved",
                    Callback::Invalid(_) => "invalid",
                };
                println!("{name}\t{state}");
            }
            Ok(())
        }
        Commands::Respond { message_id, payload } => {
            let payload: Value = serde_json::from_str(&payload).context("payload is not valid JSON")?;
            let plugin = Plugin::new(identity, Vec::<String>::new(), transport).await?;
            plugin.send_response(&message_id, &payload).await?;
            println!("✅ Response sent for {message_id}");
            Ok(())
        }
        Commands::Schema => unreachable!("schema is printed before connecting"),
    }
}
