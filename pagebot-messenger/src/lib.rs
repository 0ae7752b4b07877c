//! Pagebot Messenger - Messenger page webhook relay.
//!
//! Inbound page events are answered in one of two ways:
//! - feed posts and ratings get a canned reply chosen by sentiment
//! - direct messages are answered by a conversational assistant that sees the
//!   sender's rolling conversation history
//!
//! ## Architecture
//!
//! ```text
//! Platform → POST /facebook → EventDispatcher → ReplyStrategySelector
//!                                   ↓                 ↓          ↓
//!                             parse events     SentimentAPI   Assistant + SessionStore
//!                                   ↓
//! User ←── Graph API send ←── OutboundSender
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod assistant;
pub mod dispatcher;
pub mod event;
pub mod outbound;
pub mod pages;
pub mod routes;
pub mod selector;
pub mod sentiment;
pub mod session;
pub mod traits;

// Re-export commonly used types
pub use assistant::DashScopeAssistant;
pub use dispatcher::{DispatchSummary, EventDispatcher};
pub use event::{parse_payload, Sentiment, WebhookEvent};
pub use outbound::GraphApiSender;
pub use routes::{build_router, create_state, RelayState};
pub use selector::{ReplyDecision, ReplyStrategySelector, NEGATIVE_REPLY, POSITIVE_REPLY};
pub use sentiment::HttpSentimentClassifier;
pub use session::{ConversationTurn, Role, SessionStore};
pub use traits::{AssistantClient, OutboundSender, RelayError, RelayResult, SentimentClassifier};

use pagebot_common::config::Config;
use std::sync::Arc;
use std::time::Duration;

/// Wire the HTTP collaborators from configuration into a dispatcher.
pub fn build_dispatcher(config: &Config) -> EventDispatcher {
    let classifier = Arc::new(HttpSentimentClassifier::new(
        config.sentiment.predict_url.clone(),
        Duration::from_secs(config.sentiment.timeout_secs),
    ));

    let assistant = Arc::new(DashScopeAssistant::new(
        config.assistant.endpoint.clone(),
        config.assistant.api_key.clone(),
        config.assistant.model.clone(),
        Duration::from_secs(config.assistant.timeout_secs),
    ));

    let sender = Arc::new(GraphApiSender::new(
        &config.facebook.graph_url,
        &config.facebook.api_version,
        &config.facebook.page_id,
        config.facebook.page_access_token.clone(),
        Duration::from_secs(config.facebook.send_timeout_secs),
    ));

    let sessions = Arc::new(SessionStore::new());
    let selector = ReplyStrategySelector::new(classifier, assistant, sessions);
    EventDispatcher::new(selector, sender)
}

/// Build the full router from configuration.
pub fn build_app(config: &Config) -> axum::Router {
    let dispatcher = Arc::new(build_dispatcher(config));
    let state = create_state(
        dispatcher,
        config.facebook.verify_token.clone(),
        config.facebook.app_secret.as_deref(),
    );
    build_router(state)
}

/// Start the relay HTTP server; TLS is used when the port is 443.
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let addr = config.bind_address()?;

    let router = build_app(config);

    if config.server.tls_enabled() {
        let (Some(cert), Some(key)) = (&config.server.cert_file, &config.server.key_file) else {
            anyhow::bail!("TLS on port 443 requires cert_file and key_file");
        };

        let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert, key).await?;
        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
        });

        tracing::info!(address = %addr, cert = %cert, "Starting HTTPS server");
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(router.into_make_service())
            .await?;
    } else {
        tracing::info!(address = %addr, "Starting HTTP server");
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    }

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
