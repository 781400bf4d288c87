//! Process-wide tracing for the access server.
//!
//! Logs go to stdout through `tracing-subscriber`; spans are additionally
//! exported over OTLP/HTTP when an endpoint is configured.

use anyhow::{Context, Result, anyhow};
use once_cell::sync::OnceCell;
use opentelemetry::{KeyValue, trace::TracerProvider};
use opentelemetry_otlp::{Protocol, SpanExporter, WithExportConfig};
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: OnceCell<()> = OnceCell::new();

pub const DEFAULT_FILTER: &str = "info,tower_http=warn";
pub const FILTER_KEY: &str = "RUST_LOG";
pub const OTLP_ENDPOINT_KEY: &str = "OTLP_ENDPOINT";

#[derive(Clone, Debug)]
pub struct ObsConfig {
    pub service_name: &'static str,
    pub service_version: &'static str,
    pub env_filter: String,
    pub otlp_endpoint: Option<String>,
}

impl Default for ObsConfig {
    fn default() -> Self {
        Self {
            service_name: "access-server",
            service_version: env!("CARGO_PKG_VERSION"),
            env_filter: DEFAULT_FILTER.to_string(),
            otlp_endpoint: None,
        }
    }
}

impl ObsConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Blank values fall back to the defaults.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let present = |key: &str| var(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();
        Self {
            env_filter: present(FILTER_KEY).unwrap_or(defaults.env_filter),
            otlp_endpoint: present(OTLP_ENDPOINT_KEY),
            ..defaults
        }
    }
}

/// Holds the span exporter alive; call [`TracingGuard::shutdown`] before
/// exit so batched spans are flushed.
#[must_use]
pub struct TracingGuard {
    provider: Option<SdkTracerProvider>,
}

impl TracingGuard {
    pub fn shutdown(self) {
        let Some(provider) = self.provider else {
            return;
        };
        if let Err(err) = provider.shutdown() {
            tracing::warn!(error = %err, "span exporter shutdown failed");
        }
    }
}

/// Installs the global subscriber. Later calls are no-ops returning an
/// inert guard.
pub fn init_tracing(config: ObsConfig) -> Result<TracingGuard> {
    if INIT.get().is_some() {
        return Ok(TracingGuard { provider: None });
    }

    let env_filter = EnvFilter::try_new(&config.env_filter)
        .with_context(|| format!("invalid log filter `{}`", config.env_filter))?;
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false));

    let provider = match &config.otlp_endpoint {
        Some(endpoint) => {
            let provider = span_provider(&config, endpoint)?;
            let tracer = provider.tracer(config.service_name);
            registry
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .try_init()?;
            Some(provider)
        }
        None => {
            registry.try_init()?;
            None
        }
    };

    INIT.set(())
        .map_err(|_| anyhow!("tracing already initialized"))?;
    if let Some(endpoint) = &config.otlp_endpoint {
        tracing::info!(%endpoint, "exporting spans over OTLP");
    }
    Ok(TracingGuard { provider })
}

fn span_provider(config: &ObsConfig, endpoint: &str) -> Result<SdkTracerProvider> {
    let exporter = SpanExporter::builder()
        .with_http()
        .with_protocol(Protocol::HttpBinary)
        .with_endpoint(endpoint)
        .build()
        .context("failed to build OTLP span exporter")?;
    let resource = Resource::builder()
        .with_service_name(config.service_name)
        .with_attribute(KeyValue::new("service.version", config.service_version))
        .build();
    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build())
}
