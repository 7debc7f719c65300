use std::env;

use heimdall_config::LoggingConfig;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::WithExportConfig;
use tracing::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::env::parse_env_or;

pub const OTLP_URL_ENVVAR: &str = "HEIMDALL_OTLP_URL";
pub const SVC_LABEL_ENVVAR: &str = "HEIMDALL_SVC_LABEL";
pub const LOG_FILTER_ENVVAR: &str = "HEIMDALL_LOG_FILTER";

/// Filter used when neither the config nor the environment set one.
pub const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    whoami: String,
    filter: String,
    otel_url: Option<String>,
}

impl LoggerConfig {
    /// Creates a new stdout-only instance with whoami set.
    pub fn new(whoami: String) -> Self {
        Self {
            whoami,
            filter: DEFAULT_FILTER.to_string(),
            otel_url: None,
        }
    }

    pub fn with_base_name(s: &str) -> Self {
        Self::new(get_whoami_string(s))
    }

    /// Builds the logger config for a service from the node config.  The
    /// environment overrides the filter and fills in a missing OTLP url.
    pub fn from_config(base: &str, config: &LoggingConfig) -> Self {
        let filter = config.filter.as_deref().unwrap_or(DEFAULT_FILTER);
        Self {
            whoami: get_whoami_string(base),
            filter: parse_env_or(LOG_FILTER_ENVVAR, filter.to_string()),
            otel_url: config.otlp_url.clone().or_else(get_otlp_url_from_env),
        }
    }

    pub fn set_otlp_url(&mut self, url: String) {
        self.otel_url = Some(url);
    }

    pub fn set_filter(&mut self, filter: String) {
        self.filter = filter;
    }

    pub fn whoami(&self) -> &str {
        &self.whoami
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn otlp_url(&self) -> Option<&str> {
        self.otel_url.as_deref()
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::with_base_name("(heimdall-bridge)")
    }
}

/// Parses filter directives, falling back to [`DEFAULT_FILTER`] if they are
/// malformed.
fn build_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives).unwrap_or_else(|err| {
        eprintln!("invalid log filter '{directives}' ({err}), using '{DEFAULT_FILTER}'");
        EnvFilter::new(DEFAULT_FILTER)
    })
}

/// Initializes the logging subsystem with the provided config.
pub fn init(config: LoggerConfig) {
    let filt = build_filter(&config.filter);

    // Stdout logging.
    let stdout_sub = tracing_subscriber::fmt::layer().compact().with_filter(filt);

    // OpenTelemetry output.
    if let Some(otel_url) = &config.otel_url {
        let exporter = opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(otel_url);

        let tp = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(exporter)
            .install_batch(opentelemetry_sdk::runtime::TokioCurrentThread)
            .expect("init: opentelemetry");

        let tt = tp.tracer("heimdall-log");

        let otel_sub = tracing_opentelemetry::layer().with_tracer(tt);

        tracing_subscriber::registry()
            .with(stdout_sub)
            .with(otel_sub)
            .init();
    } else {
        tracing_subscriber::registry().with(stdout_sub).init();
    }

    info!(whoami = %config.whoami, filter = %config.filter, "logging started");
}

/// Shuts down the logging subsystem, flushing pending spans.
pub fn finalize() {
    info!("shutting down logging");
    opentelemetry::global::shutdown_tracer_provider();
}

/// Gets the OTLP URL from the standard envvar.
pub fn get_otlp_url_from_env() -> Option<String> {
    env::var(OTLP_URL_ENVVAR).ok()
}

/// Gets the service label from the standard envvar, which should be included
/// in the whoami string.
pub fn get_service_label_from_env() -> Option<String> {
    env::var(SVC_LABEL_ENVVAR).ok()
}

/// Computes a standard whoami string.
pub fn get_whoami_string(base: &str) -> String {
    match get_service_label_from_env() {
        Some(label) => format!("{base}%{label}"),
        None => base.to_string(),
    }
}
