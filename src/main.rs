use std::sync::Arc;

use anyhow::Context;

use news_watch::channels::{EmailConfig, EmailNotifier, MessageSource, TelegramChannel};
use news_watch::config::WatchConfig;
use news_watch::extract::{ArticleExtractor, ChromiumRenderer, ReadableFetcher, WhatlangIdentifier};
use news_watch::llm::create_provider;
use news_watch::pipeline::{MessageProcessor, ProcessorDeps, RelevanceClassifier, Summarizer, run_pipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = WatchConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export TELEGRAM_BOT_TOKEN=123456:ABC...");
        eprintln!("  export WATCH_OPERATOR_CHAT_ID=123456789");
        eprintln!("  export OPENAI_API_KEY=sk-...");
        std::process::exit(1);
    });

    let email_config = EmailConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export EMAIL_SMTP_HOST=smtp.gmail.com EMAIL_RECIPIENTS=you@example.com");
        std::process::exit(1);
    });

    eprintln!("📰 News Watch v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Channels: {}", config.channels.join(", "));
    eprintln!("   Topics: {}", config.topics.join("; "));
    eprintln!(
        "   Models: {} (classify), {} (summarize)",
        config.classify_llm.model, config.summary_llm.model
    );
    eprintln!(
        "   Email: {}:{} → {}",
        email_config.smtp_host,
        email_config.smtp_port,
        email_config.recipients.join(", ")
    );
    eprintln!("   Concurrency: {}\n", config.concurrency);

    // ── LLM ─────────────────────────────────────────────────────────────
    let classify_llm = create_provider(&config.classify_llm)?;
    let summary_llm = create_provider(&config.summary_llm)?;

    let classifier = RelevanceClassifier::new(classify_llm, config.verdict_policy.parser())
        .with_max_tokens(config.classify_max_tokens)
        .with_max_input_chars(config.classify_max_chars);
    let summarizer = Summarizer::new(summary_llm)
        .with_sentences(config.summary_sentences)
        .with_max_input_chars(config.summary_max_chars);

    // ── Extraction ──────────────────────────────────────────────────────
    let extractor = Arc::new(ArticleExtractor::new(
        Arc::new(ReadableFetcher::new().context("building HTTP client")?),
        Arc::new(ChromiumRenderer::new(config.render.clone())),
        Arc::new(WhatlangIdentifier),
    ));

    // ── Channels ────────────────────────────────────────────────────────
    let telegram = Arc::new(TelegramChannel::new(
        config.bot_token.clone(),
        config.channels.clone(),
    ));
    let notifier = Arc::new(EmailNotifier::new(email_config).context("building SMTP transport")?);

    telegram
        .health_check()
        .await
        .context("Telegram bot token rejected")?;

    let processor = Arc::new(MessageProcessor::new(
        ProcessorDeps {
            classifier,
            extractor,
            summarizer,
            forwarder: telegram.clone(),
            notifier,
        },
        config.topics.clone(),
        config.operator_chat_id.clone(),
    ));

    let messages = telegram.start().await?;
    tracing::info!("Listening... (Ctrl-C to stop)");

    tokio::select! {
        _ = run_pipeline(processor, messages, config.concurrency) => {
            tracing::warn!("Message stream ended unexpectedly");
        }
        result = tokio::signal::ctrl_c() => {
            result.context("waiting for Ctrl-C")?;
            tracing::info!("Ctrl-C received, shutting down");
        }
    }

    telegram.shutdown().await?;
    Ok(())
}
