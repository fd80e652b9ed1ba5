//! fixsim binary.
//!
//! # Usage
//!
//! ```bash
//! # Broker acknowledging every order
//! fixsim broker --listen 127.0.0.1:9877 --auto-ack
//!
//! # Hub between client and broker
//! fixsim hub --listen 127.0.0.1:9876 --broker 127.0.0.1:9877
//!
//! # Client scenario
//! fixsim client --connect 127.0.0.1:9876 --script scenarios/new_order.fix
//! ```

use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use fixsim_core::{HubConfig, RunnerConfig, SessionId};
use fixsim_server::{
    Broker, BrokerConfig, ClientConfig, DEFAULT_AUDIT_FILE, DEFAULT_BROKER_ADDR, DEFAULT_HUB_ADDR,
    DEFAULT_HUB_COMP_ID, FileAuditSink, Hub, HubServerConfig, ServerError, TransportConfig,
    audit_channel,
};
use tokio::sync::oneshot;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Scenario-driven FIX test harness
#[derive(Parser, Debug)]
#[command(name = "fixsim")]
#[command(about = "Scripted FIX client, broker and correlation-rewriting hub")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Audit trail file
    #[arg(long, global = true, default_value = DEFAULT_AUDIT_FILE)]
    audit_file: PathBuf,

    /// Heartbeat interval in seconds
    #[arg(long, global = true, default_value = "30")]
    heartbeat: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a scenario as the order sender
    Client {
        /// Hub address
        #[arg(short, long, default_value = DEFAULT_HUB_ADDR)]
        connect: String,

        /// Scenario script
        #[arg(short, long)]
        script: PathBuf,

        /// Our SenderCompID
        #[arg(long, default_value = "CLIENT")]
        sender: String,

        /// The hub's CompID
        #[arg(long, default_value = DEFAULT_HUB_COMP_ID)]
        target: String,

        /// Prefix for rewritten ClOrdIDs
        #[arg(long, default_value = fixsim_core::DEFAULT_SIM_ID)]
        sim_id: String,

        /// Per-step wait in seconds, overriding the role default
        #[arg(long)]
        expect_timeout: Option<u64>,
    },

    /// Accept the hub and answer orders
    Broker {
        /// Address to accept the hub on
        #[arg(short, long, default_value = DEFAULT_BROKER_ADDR)]
        listen: String,

        /// Scenario script; without one the broker serves until Ctrl-C
        #[arg(short, long)]
        script: Option<PathBuf>,

        /// Our SenderCompID
        #[arg(long, default_value = "BROKER")]
        sender: String,

        /// The hub's CompID
        #[arg(long, default_value = DEFAULT_HUB_COMP_ID)]
        target: String,

        /// Acknowledge every NewOrderSingle
        #[arg(long)]
        auto_ack: bool,

        /// Per-step wait in seconds, overriding the role default
        #[arg(long)]
        expect_timeout: Option<u64>,
    },

    /// Relay between client and broker, rewriting ClOrdID
    Hub {
        /// Address to accept the client on
        #[arg(short, long, default_value = DEFAULT_HUB_ADDR)]
        listen: String,

        /// Broker address
        #[arg(short, long, default_value = DEFAULT_BROKER_ADDR)]
        broker: String,

        /// The hub's CompID
        #[arg(long, default_value = DEFAULT_HUB_COMP_ID)]
        comp_id: String,

        /// Client CompID
        #[arg(long, default_value = "CLIENT")]
        client_comp_id: String,

        /// Broker CompID
        #[arg(long, default_value = "BROKER")]
        broker_comp_id: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{}", err);
            ExitCode::from(err.exit_code())
        },
    }
}

async fn run(args: Args) -> Result<(), ServerError> {
    let file = FileAuditSink::open(&args.audit_file).map_err(|e| {
        ServerError::Config(format!("cannot open {}: {}", args.audit_file.display(), e))
    })?;
    let (audit, consumer) = audit_channel(Arc::new(file));
    let (stop_audit, audit_stopped) = oneshot::channel::<()>();
    let consumer = tokio::spawn(consumer.run_until(async {
        let _ = audit_stopped.await;
    }));
    let audit = Arc::new(audit);

    let transport = TransportConfig {
        heartbeat_interval: Duration::from_secs(args.heartbeat),
        ..TransportConfig::default()
    };

    let result = match args.command {
        Command::Client { connect, script, sender, target, sim_id, expect_timeout } => {
            let config = ClientConfig {
                connect,
                session: SessionId::new(sender, target),
                sim_id,
                script,
                runner: RunnerConfig {
                    expect_timeout: expect_timeout.map(Duration::from_secs),
                    ..RunnerConfig::default()
                },
                transport,
            };
            fixsim_server::run_client(config, audit).await.map(|report| {
                tracing::info!(steps = report.steps_executed, elapsed = ?report.elapsed, "DONE");
            })
        },

        Command::Broker { listen, script, sender, target, auto_ack, expect_timeout } => {
            let defaults = BrokerConfig::default();
            let config = BrokerConfig {
                listen,
                session: SessionId::new(sender, target),
                script,
                auto_ack,
                runner: RunnerConfig {
                    expect_timeout: expect_timeout.map(Duration::from_secs),
                    ..defaults.runner
                },
                transport,
            };
            match Broker::bind(config, audit).await {
                Ok(broker) => broker.run().await.map(|report| {
                    if let Some(report) = report {
                        tracing::info!(steps = report.steps_executed, elapsed = ?report.elapsed, "DONE");
                    }
                }),
                Err(err) => Err(err),
            }
        },

        Command::Hub { listen, broker, comp_id, client_comp_id, broker_comp_id } => {
            let config = HubServerConfig {
                listen,
                broker_connect: broker,
                comp_id,
                relay: HubConfig { client_comp_id, broker_comp_id },
                transport,
            };
            match Hub::bind(config, audit).await {
                Ok(hub) => hub.run().await,
                Err(err) => Err(err),
            }
        },
    };

    // Session tasks may still hold sinks; stop the consumer explicitly.
    let _ = stop_audit.send(());
    if let Err(e) = consumer.await {
        tracing::warn!("audit consumer failed: {}", e);
    }
    result
}
