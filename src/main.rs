/*!
 * Application Supervisor - Main Entry Point
 *
 * Reads console commands from stdin, writes one JSON response per line to
 * stdout and reaps exited applications in the background.
 */

use anyhow::Context;
use app_supervisor::api::{self, ConsoleCommand, ConsoleResponse};
use app_supervisor::{init_tracing, Supervisor, SupervisorConfig};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = SupervisorConfig::from_env();
    std::fs::create_dir_all(&config.storage_root).with_context(|| {
        format!(
            "failed to create storage root {}",
            config.storage_root.display()
        )
    })?;
    // tokio::time::interval panics on a zero period
    let reap_interval = config.reap_interval.max(Duration::from_millis(1));
    let supervisor = Arc::new(Supervisor::new(config));

    let reaper = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(reap_interval);
            loop {
                ticker.tick().await;
                let supervisor = Arc::clone(&supervisor);
                match tokio::task::spawn_blocking(move || supervisor.reap_exited()).await {
                    Ok(reaped) if reaped > 0 => debug!(reaped = reaped, "Reaper sweep"),
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "Reaper task failed"),
                }
            }
        })
    };

    info!("Supervisor ready; type 'help' for commands");

    tokio::select! {
        result = console_loop(Arc::clone(&supervisor)) => {
            if let Err(e) = &result {
                error!(error = %e, "Console loop failed");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received");
        }
    }

    reaper.abort();
    let stopped = {
        let supervisor = Arc::clone(&supervisor);
        tokio::task::spawn_blocking(move || supervisor.shutdown())
            .await
            .context("shutdown task failed")?
    };
    info!(stopped = stopped, "Supervisor exiting");
    Ok(())
}

async fn console_loop(supervisor: Arc<Supervisor>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }

        let (response, quit) = match ConsoleCommand::parse(&line) {
            Ok(command) => {
                let quit = command == ConsoleCommand::Quit;
                let supervisor = Arc::clone(&supervisor);
                let response = tokio::task::spawn_blocking(move || api::execute(&supervisor, &command))
                    .await
                    .context("command task failed")?;
                (response, quit)
            }
            Err(e) => (
                ConsoleResponse::failure("parse", json!({ "message": e.to_string() })),
                false,
            ),
        };

        let mut out = response.to_line();
        out.push('\n');
        stdout.write_all(out.as_bytes()).await?;
        stdout.flush().await?;

        if quit {
            break;
        }
    }
    Ok(())
}
