use anyhow::Result;
use opentelemetry::{trace::TracerProvider, KeyValue};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, WithExportConfig};
use opentelemetry_sdk::{
    logs::LoggerProvider,
    propagation::TraceContextPropagator,
    runtime,
    trace::{RandomIdGenerator, Sampler, TracerProvider as SdkTracerProvider},
    Resource,
};
use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, SERVICE_VERSION};
use tracing::Subscriber;
use tracing_subscriber::{
    layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter, Layer,
};

use super::{TelemetryConfig, TelemetryProviders};

const DEPLOYMENT_ENVIRONMENT: &str = "deployment.environment";

fn build_resource(config: &TelemetryConfig) -> Resource {
    Resource::new(vec![
        KeyValue::new(SERVICE_NAME, config.service_name.clone()),
        KeyValue::new(SERVICE_VERSION, config.service_version.clone()),
        KeyValue::new(DEPLOYMENT_ENVIRONMENT, config.environment.clone()),
    ])
}

/// JSON log lines with the active span stack, for whichever subscriber stack wraps it
fn json_fmt_layer<S>() -> impl Layer<S> + Send + Sync + 'static
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_span_list(true)
        .with_current_span(true)
}

/// Initialize telemetry with OpenTelemetry support
///
/// When OTEL is enabled:
/// - Sets up OTLP exporters for traces and logs
/// - Bridges tracing spans and events to OpenTelemetry
/// - Configures W3C Trace Context propagation, which the HTTP tracing layer
///   uses to continue incoming traces
///
/// When OTEL is disabled:
/// - Falls back to JSON logging only
pub fn init_telemetry(config: &TelemetryConfig) -> Result<Option<TelemetryProviders>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if !config.otel_enabled {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_fmt_layer())
            .init();

        return Ok(None);
    }

    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    let resource = build_resource(config);

    let trace_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otel_endpoint)
        .build()?;

    let tracer_provider = SdkTracerProvider::builder()
        .with_batch_exporter(trace_exporter, runtime::Tokio)
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource.clone())
        .build();

    let log_exporter = LogExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otel_endpoint)
        .build()?;

    let logger_provider = LoggerProvider::builder()
        .with_batch_exporter(log_exporter, runtime::Tokio)
        .with_resource(resource)
        .build();

    let tracer = tracer_provider.tracer(config.service_name.clone());
    let otel_trace_layer = tracing_opentelemetry::layer().with_tracer(tracer);
    let otel_log_layer = OpenTelemetryTracingBridge::new(&logger_provider);

    // The trace layer must come before the log bridge so log records see the span context
    tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_trace_layer)
        .with(otel_log_layer)
        .with(json_fmt_layer())
        .init();

    Ok(Some(TelemetryProviders {
        tracer_provider,
        logger_provider,
    }))
}

/// Shutdown telemetry and flush any pending traces and logs
pub fn shutdown_telemetry(providers: Option<TelemetryProviders>) {
    if let Some(providers) = providers {
        if let Err(e) = providers.tracer_provider.shutdown() {
            eprintln!("Error shutting down tracer provider: {:?}", e);
        }
        if let Err(e) = providers.logger_provider.shutdown() {
            eprintln!("Error shutting down logger provider: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::Key;

    #[test]
    fn test_resource_carries_service_identity() {
        let config = TelemetryConfig {
            service_name: "go-onboarding".to_string(),
            service_version: "1.2.3".to_string(),
            environment: "qa".to_string(),
            ..Default::default()
        };

        let resource = build_resource(&config);

        assert_eq!(
            resource.get(Key::new(SERVICE_NAME)).map(|v| v.to_string()),
            Some("go-onboarding".to_string())
        );
        assert_eq!(
            resource.get(Key::new(SERVICE_VERSION)).map(|v| v.to_string()),
            Some("1.2.3".to_string())
        );
        assert_eq!(
            resource
                .get(Key::new(DEPLOYMENT_ENVIRONMENT))
                .map(|v| v.to_string()),
            Some("qa".to_string())
        );
    }

    #[test]
    fn test_json_layer_fits_both_subscriber_stacks() {
        let plain = tracing_subscriber::registry()
            .with(EnvFilter::new("info"))
            .with(json_fmt_layer());
        tracing::subscriber::with_default(plain, || {
            tracing::info!("plain stack");
        });

        let tracer_provider = SdkTracerProvider::builder().build();
        let logger_provider = LoggerProvider::builder().build();
        let exported = tracing_subscriber::registry()
            .with(EnvFilter::new("info"))
            .with(tracing_opentelemetry::layer().with_tracer(tracer_provider.tracer("init-test")))
            .with(OpenTelemetryTracingBridge::new(&logger_provider))
            .with(json_fmt_layer());
        tracing::subscriber::with_default(exported, || {
            tracing::info_span!("request").in_scope(|| tracing::info!("otel stack"));
        });
    }

    #[test]
    fn test_telemetry_config_default() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "go-onboarding");
        assert_eq!(config.otel_endpoint, "http://localhost:4317");
        assert!(!config.otel_enabled);
        assert_eq!(config.log_level, "info");
    }
}
