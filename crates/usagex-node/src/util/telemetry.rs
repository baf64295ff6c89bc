//! Log subscriber setup and HTTP request tracing.
//!
//! Verbosity follows `RUST_LOG` and defaults to `info` for this workspace.
//! `LOG_FORMAT=json` switches to one JSON object per line.

use axum::http::Request;
use std::env;
use tower_http::trace::{DefaultOnResponse, MakeSpan, TraceLayer};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tracing::{Level, Span};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_DIRECTIVES: &str = "info,tower_http=info";

/// Installs the global `tracing` subscriber.
#[derive(Debug, Clone)]
pub struct Telemetry {
    name: &'static str,
    version: &'static str,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry {
    pub fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn with_version(mut self, version: &'static str) -> Self {
        self.version = version;
        self
    }

    /// Registers the subscriber. Later calls in the same process are no-ops.
    pub fn register(self) -> Self {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
        let json = env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));
        let registry = tracing_subscriber::registry().with(filter);
        let installed = if json {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
        } else {
            registry.with(tracing_subscriber::fmt::layer()).try_init()
        };
        if installed.is_ok() {
            tracing::info!(service = self.name, version = self.version, "Logging initialized");
        }
        self
    }

    /// A `TraceLayer` that opens one span per HTTP request.
    pub fn http_tracing(
        &self,
    ) -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>, RequestSpan> {
        TraceLayer::new_for_http()
            .make_span_with(RequestSpan)
            .on_response(DefaultOnResponse::new().level(Level::INFO))
    }
}

/// Names request spans after method and path.
#[derive(Debug, Clone, Copy)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            path = %request.uri().path(),
        )
    }
}
