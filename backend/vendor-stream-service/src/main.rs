use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use vendor_stream::config::Config;
use vendor_stream::queue::SqsQueue;
use vendor_stream::rules::{RuleSynchronizer, RulesClient};
use vendor_stream::startup::install_vendor_rules;
use vendor_stream::store::DynamoTable;
use vendor_stream::stream::{HttpStreamTransport, StreamSession};
use vendor_stream::{health, telemetry, IngestPipeline, SinkDispatcher};

const SESSION_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler, listening for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[actix_web::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    telemetry::init_tracing(&config.log_level);
    config
        .validate()
        .context("Configuration validation failed")?;
    info!("Starting vendor-stream-service");

    // AWS collaborators
    let aws_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let table = Arc::new(DynamoTable::new(aws_sdk_dynamodb::Client::new(&aws_config)));
    let queue = Arc::new(SqsQueue::new(aws_sdk_sqs::Client::new(&aws_config)));
    info!("AWS clients initialized");

    // No total timeout: the stream connection stays open indefinitely
    let http = reqwest::Client::new();

    // Install one rule set covering every vendor before opening the stream
    let synchronizer = RuleSynchronizer::new(Arc::new(RulesClient::new(
        http.clone(),
        &config.twitter_api_url,
        config.twitter_api_bearer_token.clone(),
    )));
    let outcome = install_vendor_rules(
        table.clone(),
        &config.aws_vendors_table_name,
        config.scan_page_size,
        &config.rule_compiler(),
        &synchronizer,
        &config.sync_backoff(),
    )
    .await
    .context("Failed to install vendor stream rules")?;
    info!(
        deleted = outcome.deleted,
        installed = outcome.installed.len(),
        "Vendor rules installed"
    );

    // Stream session feeding the ingest pipeline
    let dispatcher = SinkDispatcher::new(
        table,
        queue,
        config.aws_vendors_table_name.clone(),
        config.aws_queue_url.clone(),
    );
    let pipeline = Arc::new(IngestPipeline::new(dispatcher));
    let transport = Arc::new(HttpStreamTransport::new(
        http,
        &config.twitter_api_url,
        config.twitter_api_bearer_token.clone(),
    ));
    let (session, cancel) = StreamSession::new(transport, pipeline.clone(), config.session_config());
    let session_state = session.state_receiver();
    let mut session_task = tokio::spawn(session.run());
    info!("Stream session started");

    // Health endpoints
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(session_state.clone()))
            .configure(health::configure)
    })
    .bind((config.http_host.as_str(), config.http_port))
    .with_context(|| format!("Failed to bind {}:{}", config.http_host, config.http_port))?
    .disable_signals()
    .run();
    let server_handle = server.handle();
    let server_task = actix_web::rt::spawn(server);
    info!(host = %config.http_host, port = config.http_port, "Health server listening");

    let session_result = tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
            cancel.cancel();
            match tokio::time::timeout(SESSION_SHUTDOWN_TIMEOUT, &mut session_task).await {
                Ok(Ok(_)) => info!("Stream session shut down gracefully"),
                Ok(Err(e)) => warn!(error = %e, "Stream session task failed during shutdown"),
                Err(_) => {
                    warn!("Stream session did not shut down within timeout");
                    session_task.abort();
                }
            }
            None
        }
        result = &mut session_task => Some(result),
    };

    server_handle.stop(true).await;
    match server_task.await {
        Ok(Ok(())) => info!("Health server stopped"),
        Ok(Err(e)) => error!(error = %e, "Health server failed"),
        Err(e) => error!(error = %e, "Health server task failed"),
    }

    let stats = pipeline.stats();
    info!(
        received = stats.received(),
        rejected = stats.rejected(),
        dispatched = stats.dispatched(),
        sink_failures = stats.sink_failures(),
        "vendor-stream-service stopped"
    );

    match session_result {
        Some(joined) => {
            let end = joined
                .context("Stream session task panicked")?
                .context("Stream session failed")?;
            info!(end = ?end, "Stream session ended");
            Ok(())
        }
        None => Ok(()),
    }
}
