//! attach-baseline - command line entry point.
//!
//! Attaches a compliance baseline to a cluster and prints its compliance status.

use std::process::ExitCode;

use baseline_attach::workflow::{EXIT_FAILURE, EXIT_FAULT};
use baseline_attach::{cli::Args, run_and_report, session, Config, VcenterClient, Workflow};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit status after a second Ctrl-C (128 + SIGINT)
const EXIT_INTERRUPTED: i32 = 130;

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Sequential workflow: one thread is enough
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(async_main(args)))
}

async fn async_main(args: Args) -> ExitCode {
    // Initialize logging; stdout is reserved for operator messages
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "baseline_attach=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match Config::from_args(args) {
        Ok(config) => config,
        Err(e) => {
            println!("Error - {}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    info!(
        "Loaded configuration: server={} cluster={} target={}",
        config.server_url, config.cluster_name, config.target_version
    );

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("Interrupted, releasing session (press Ctrl-C again to exit immediately)");
        interrupt.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(EXIT_INTERRUPTED);
        }
    });

    let login = VcenterClient::connect(
        config.server_url.clone(),
        &config.username,
        &config.password,
        config.verify_tls,
    );
    let login = tokio::select! {
        biased;
        _ = cancel.cancelled() => return interrupted(),
        result = login => result,
    };
    let client = match login {
        Ok(client) => client,
        Err(e) => {
            error!(
                server = %config.server_url,
                credentials_rejected = e.is_auth(),
                "Failed to log in: {}",
                e
            );
            println!("Error - {}", e);
            return ExitCode::from(EXIT_FAULT);
        }
    };

    let job = &Workflow::from_config(&config, config.waiter(cancel.clone()));
    let mut stdout = std::io::stdout();
    let out = &mut stdout;
    match session::scoped(&client, &cancel, move |api| run_and_report(job, api, out)).await {
        Some(code) => ExitCode::from(code),
        None => interrupted(),
    }
}

fn interrupted() -> ExitCode {
    println!("Error - Interrupted");
    ExitCode::from(EXIT_FAULT)
}
