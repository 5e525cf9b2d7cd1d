use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Route all diagnostics, including the ONNX runtime's, to stderr so stdout
/// carries nothing but the JSON report. `RUST_LOG` overrides the default
/// filter.
pub fn init_telemetry() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,ort=error".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr),
        )
        .init();
}
