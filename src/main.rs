use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use hallbook::config::Config;
use hallbook::console::{self, Command, Session};
use hallbook::index::AvailabilityIndex;
use hallbook::store::{BookingStore, JournalStore};
use hallbook::sync::spawn_sync;
use hallbook::workflow::Submitter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let config = Config::from_env()?;
    hallbook::observability::init(config.metrics_port);

    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;
    let journal_path = config.journal_path();
    let store: Arc<dyn BookingStore> = Arc::new(JournalStore::open(&journal_path)?);

    let index = Arc::new(AvailabilityIndex::new());
    let sync = spawn_sync(index.clone(), store.clone());

    info!("hallbook ready");
    info!("  journal: {}", journal_path.display());
    info!("  halls: {}", config.halls.join(", "));
    info!("  hours: {} in {}-minute slots", config.policy.window(), config.policy.step_minutes);
    info!("  metrics: {}", config.metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    let submitter = Submitter::new(index, store, config.halls.clone(), config.policy)
        .with_timeout(config.create_timeout);
    let today = chrono::Local::now().date_naive();
    let mut session = Session::new(config, submitter, today);

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    stdout.write_all(b"type `help` for commands\n").await?;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        let output = match console::parse_line(&line) {
            Ok(None) => continue,
            Ok(Some(Command::Quit)) => break,
            Ok(Some(cmd)) => session.execute(cmd).await,
            Err(e) => format!("error: {e}"),
        };
        if !output.is_empty() {
            stdout.write_all(output.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
        }
    }

    // Dropping the last store handle closes its change channel and ends the sync loop.
    drop(session);
    if let Err(e) = sync.await {
        tracing::warn!("sync task failed: {e}");
    }
    info!("hallbook stopped");
    Ok(())
}
