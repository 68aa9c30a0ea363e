use std::{net::SocketAddr, time::Duration};

use clap::Parser;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use opentelemetry::KeyValue;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{ExporterBuildError, LogExporter, WithExportConfig};
use opentelemetry_sdk::{Resource, logs::SdkLoggerProvider};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Telemetry-related configuration options
#[derive(Debug, Clone, Parser)]
pub struct TelemetryOpts {
    /// Whether to use ANSI colors in the logs. Disable if you're piping logs to a file or using
    /// third party services to collect logs, like kubectl/cloudwatch/loki etc.
    #[clap(long = "telemetry.use-ansi", env = "LUMEN_TELEMETRY_USE_ANSI", default_value_t = true)]
    pub use_ansi: bool,
    /// The OTLP/HTTP endpoint to export logs to, e.g. `http://localhost:4318/v1/logs`.
    /// Logs are only written to stdout if unset.
    #[clap(long = "telemetry.otlp-logs-endpoint", env = "LUMEN_OTLP_LOGS_ENDPOINT")]
    pub otlp_logs_endpoint: Option<String>,
    /// The port to listen for Prometheus metrics. Default is `9090`.
    #[clap(long = "metrics.port", env = "LUMEN_METRICS_PORT", default_value_t = 9090)]
    pub metrics_port: u16,
    /// Disable metrics collection. Default is `false`.
    #[clap(long = "metrics.disable", env = "LUMEN_DISABLE_METRICS", default_value_t = false)]
    pub disable_metrics: bool,
}

/// Errors that can occur while setting up the telemetry stack.
#[derive(Debug, thiserror::Error)]
#[allow(missing_docs)]
pub enum TelemetryError {
    #[error("failed to install prometheus exporter: {0}")]
    Prometheus(#[from] BuildError),
    #[error("failed to build OTLP log exporter: {0}")]
    Otlp(#[from] ExporterBuildError),
}

/// A wrapper around the OpenTelemetry logger provider.
#[derive(Debug, Default)]
pub struct LogProvider {
    inner: Option<SdkLoggerProvider>,
}

impl LogProvider {
    /// Set the OpenTelemetry logger provider.
    pub fn set_provider(&mut self, provider: SdkLoggerProvider) {
        self.inner = Some(provider);
    }

    /// Shutdown the OpenTelemetry logger provider.
    pub fn shutdown(&self) {
        if let Some(provider) = self.inner.as_ref() {
            // We ignore the error because it's not critical
            let _ = provider.shutdown();
        }
    }
}

impl TelemetryOpts {
    /// Setup the telemetry stack for Lumen.
    ///
    /// 1. Tracing to stdout, optionally bridged to an OTLP log exporter
    /// 2. Metrics collection with Prometheus (if enabled)
    pub fn setup(&self, instance_name: &str) -> Result<LogProvider, TelemetryError> {
        let mut global_provider = LogProvider::default();
        // Setup tracing with stdout by default
        let registry = tracing_subscriber::registry()
            .with(EnvFilter::from_env("RUST_LOG"))
            .with(tracing_subscriber::fmt::layer().with_ansi(self.use_ansi));

        if let Some(endpoint) = self.otlp_logs_endpoint.as_deref() {
            let provider = build_otlp_provider(endpoint, instance_name)?;
            let layer = OpenTelemetryTracingBridge::new(&provider);
            global_provider.set_provider(provider);
            registry.with(layer).init();
            info!(%endpoint, "OTLP logging enabled");
        } else {
            registry.init();
        }

        // Setup metrics collection with Prometheus
        if !self.disable_metrics {
            let prometheus_address = SocketAddr::from(([0, 0, 0, 0], self.metrics_port));

            PrometheusBuilder::new()
                .with_http_listener(prometheus_address)
                .add_global_label("instance", instance_name)
                .install()?;

            info!("Metrics enabled on {}", prometheus_address);
        }

        Ok(global_provider)
    }
}

/// Builds an OTLP/HTTP log provider exporting to the given endpoint.
fn build_otlp_provider(
    endpoint: &str,
    name: &str,
) -> Result<SdkLoggerProvider, ExporterBuildError> {
    let exporter = LogExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .with_timeout(Duration::from_secs(5))
        .build()?;

    let provider = SdkLoggerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            Resource::builder()
                // OTLP convention
                .with_attribute(KeyValue::new("service.name", name.to_owned()))
                .build(),
        )
        .build();

    Ok(provider)
}
