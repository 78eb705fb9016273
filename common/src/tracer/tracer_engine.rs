use thiserror::Error;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt};

#[derive(Debug, Error)]
pub enum TracerError {
    #[error("Global tracing subscriber already set: {0}")]
    AlreadySet(#[from] tracing::subscriber::SetGlobalDefaultError),
}

#[derive(Debug, Clone, Copy)]
pub struct TracerOptions {
    /// Colour the stdout log with ANSI escape codes.
    pub ansi: bool,
    /// Level used when `RUST_LOG` is unset.
    pub default_level: LevelFilter,
}

impl Default for TracerOptions {
    fn default() -> Self {
        Self {
            ansi: true,
            default_level: LevelFilter::INFO,
        }
    }
}

/// Installs the stdout tracer as the global subscriber.
/// The filter is read from `RUST_LOG`, falling back to the default level of the options.
pub struct TracerEngine {
    service_name: String,
}

impl TracerEngine {
    pub fn new(options: TracerOptions, service_name: &str) -> Result<Self, TracerError> {
        let stdout_tracer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(options.ansi);

        // This filter is applied to the stdout tracer
        let log_filter = EnvFilter::builder()
            .with_default_directive(options.default_level.into())
            .from_env_lossy();

        let subscriber =
            tracing_subscriber::Registry::default().with(stdout_tracer.with_filter(log_filter));
        tracing::subscriber::set_global_default(subscriber)?;

        info!("Tracer initialised for {service_name}");
        Ok(Self {
            service_name: service_name.to_owned(),
        })
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}
