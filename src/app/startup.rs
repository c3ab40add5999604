//! Application startup and the end-to-end run

use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::app::cli::Args;
use crate::app::config::AppConfig;
use crate::core::error_handling::log_error_with_context;
use crate::core::logging::init_logging;
use crate::core::shutdown::ShutdownCoordinator;
use crate::local::{DirTransport, FsProducerEngine};
use crate::notifications::api::{AsyncNotificationManager, Event, EventFilter};
use crate::ops::{BackupTask, OpRegistry};
use crate::orchestrator::{BackupOrchestrator, NoopLifecycle, NoopScheduler};
use crate::producer::{build_queue, Producer};
use crate::transport::RunStatus;

/// Parse arguments, initialise logging, and drive one backup run.
///
/// Returns the process exit code: 0 on success, 1 on a transport abort,
/// 2 on a setup failure, 130 when the run was cancelled.
pub fn startup() -> i32 {
    let args = Args::parse();

    let config = match AppConfig::load(args.config_file.as_deref()) {
        Ok(mut config) => {
            config.apply_cli(&args);
            config
        }
        Err(err) => {
            // Logging is not up yet; this one goes to stderr directly.
            eprintln!("backrelay: {}", err);
            return 2;
        }
    };

    if let Err(err) = init_logging(
        config.logging.level.as_deref(),
        config.logging.format.as_deref(),
        config.logging.file.as_deref().and_then(Path::to_str),
    ) {
        eprintln!("backrelay: cannot initialise logging: {}", err);
        return 2;
    }
    log::info!(
        "backrelay {} starting ({} {})",
        env!("CARGO_PKG_VERSION"),
        crate::GIT_HASH,
        crate::BUILD_TIME
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            log::error!("FATAL: cannot start async runtime: {}", err);
            return 2;
        }
    };
    runtime.block_on(run(config))
}

async fn run(config: AppConfig) -> i32 {
    let Some(dest) = config.store.dest.clone() else {
        log::error!("FATAL: no destination directory configured (--dest or [store].dest)");
        return 2;
    };

    let candidates: Vec<Producer> = config
        .sources
        .iter()
        .map(|path| Producer::new(producer_name(path), path.to_string_lossy()))
        .collect();
    if candidates.is_empty() {
        log::error!("FATAL: no sources given (positional arguments or [sources] in the config)");
        return 2;
    }
    let queue = build_queue(candidates, |p| Path::new(p.source()).exists());
    if queue.is_empty() {
        log::warn!("No eligible sources; nothing to back up");
        return 0;
    }

    let transport = match DirTransport::open(&dest, config.store.quota).await {
        Ok(transport) => Arc::new(transport),
        Err(err) => {
            log_error_with_context(&err, "Opening the backup store failed");
            return 2;
        }
    };
    let notifications = Arc::new(Mutex::new(AsyncNotificationManager::new()));
    let mut events = notifications.lock().await.subscribe(
        "cli-summary".to_string(),
        EventFilter::PackageOnly,
        "backrelay-cli".to_string(),
    );

    let orchestrator = BackupOrchestrator::new(
        config.backup.clone(),
        queue,
        Arc::new(FsProducerEngine::new()),
        transport,
        OpRegistry::new(),
        Arc::clone(&notifications),
        Arc::new(NoopScheduler),
        Arc::new(NoopLifecycle),
    );

    // SIGINT/SIGTERM map onto whole-run cancellation.
    let (_coordinator, mut shutdown_rx) = ShutdownCoordinator::with_signal_handlers();
    let canceller = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            if shutdown_rx.recv().await.is_ok() {
                log::warn!("Shutdown signal received; cancelling backup run");
                orchestrator.handle_cancel(true).await;
            }
        })
    };

    let status = match orchestrator.run().await {
        Ok(status) => status,
        Err(err) => {
            log_error_with_context(&err, "Backup run could not start");
            return 2;
        }
    };
    canceller.abort();

    while let Ok(event) = events.try_recv() {
        if let Event::Package(package) = event {
            println!("{:<40} {}", package.producer, package.outcome);
        }
    }
    println!("run status: {}", status);

    match status {
        RunStatus::Success => 0,
        RunStatus::TransportAborted => 1,
        RunStatus::Cancelled => 130,
    }
}

// A producer is named after the last path component; the full path stays in
// its source locator.
fn producer_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
