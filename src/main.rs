use std::sync::Arc;

use secrecy::SecretString;
use tokio_util::sync::CancellationToken;

use mailsense::cache::{spawn_sweep_task, TtlCache};
use mailsense::config::PipelineConfig;
use mailsense::enrich::create_enricher;
use mailsense::mailbox::gmail::GmailClient;
use mailsense::mailbox::Mailbox;
use mailsense::pipeline::Dispatcher;
use mailsense::server::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = PipelineConfig::from_env();

    // The mailbox token is the one hard requirement; enrichment degrades
    // gracefully without a credential.
    let mailbox_token = std::env::var("GMAIL_ACCESS_TOKEN").unwrap_or_else(|_| {
        eprintln!("Error: GMAIL_ACCESS_TOKEN not set");
        eprintln!("  export GMAIL_ACCESS_TOKEN=ya29...");
        std::process::exit(1);
    });
    let openai_key = std::env::var("OPENAI_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
        .map(SecretString::from);

    let port: u16 = std::env::var("MAILSENSE_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);

    eprintln!("📬 Mailsense v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.model);
    eprintln!("   Workers: {}", config.worker_count);
    eprintln!("   Sync API: http://0.0.0.0:{}/emails/sync", port);
    eprintln!("   Stream API: http://0.0.0.0:{}/emails/stream", port);

    // ── Cache + background sweep ─────────────────────────────────────
    let cache = Arc::new(TtlCache::new());
    let shutdown = CancellationToken::new();
    let _sweep_handle = spawn_sweep_task(
        Arc::clone(&cache),
        config.sweep_interval,
        shutdown.child_token(),
    );

    // ── Pipeline wiring ──────────────────────────────────────────────
    let enricher = create_enricher(openai_key, cache, &config);
    let mailbox: Arc<dyn Mailbox> = Arc::new(GmailClient::new(
        SecretString::from(mailbox_token),
        &config,
    ));
    let dispatcher = Arc::new(Dispatcher::new(mailbox, enricher, config.clone()));

    let app = router(AppState { dispatcher, config });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "Listening");
    axum::serve(listener, app).await?;

    shutdown.cancel();
    Ok(())
}
