use std::sync::Arc;

use polyglot_relay::config::{RelayConfig, TicketConfig, TranslatorConfig};
use polyglot_relay::pipeline::resolver::ResolverPolicy;
use polyglot_relay::pipeline::RelayPipeline;
use polyglot_relay::server::{relay_routes, RelayState};
use polyglot_relay::ticket::TicketClient;
use polyglot_relay::translate::HttpTranslator;

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

    let config = RelayConfig::from_env();

    let translator_config = TranslatorConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export TRANSLATE_API_KEY=...");
        std::process::exit(1);
    });
    let ticket_config = TicketConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export TICKET_BASE_URL=https://yourdesk.zendesk.com");
        eprintln!("  export TICKET_EMAIL=agent@yourdesk.com");
        eprintln!("  export TICKET_API_TOKEN=...");
        std::process::exit(1);
    });

    eprintln!("🌐 Polyglot Relay v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Webhook: http://0.0.0.0:{}/translate", config.port);
    eprintln!(
        "   Defaults: {} → {}",
        config.default_source, config.default_target
    );
    eprintln!(
        "   Strict language check: {}",
        if config.strict_language { "on" } else { "off" }
    );

    // Collaborators are constructed once here and injected — no global
    // client handles.
    let translator = Arc::new(HttpTranslator::new(translator_config));
    let tickets = Arc::new(TicketClient::new(ticket_config));

    let pipeline = Arc::new(RelayPipeline::new(
        translator,
        tickets,
        ResolverPolicy::from(&config),
        config.call_timeout,
    ));

    let app = relay_routes(RelayState {
        pipeline,
        default_source: config.default_source.clone(),
        default_target: config.default_target.clone(),
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "Relay webhook server started");
    axum::serve(listener, app).await?;

    Ok(())
}
