mod tracer_engine;

pub use tracer_engine::{TracerEngine, TracerError, TracerOptions};

/// Should be called at the start of each component.
/// Expands to a `Result<TracerEngine, TracerError>` named after the calling binary.
#[macro_export]
macro_rules! init_tracer {
    ($options:expr) => {
        $crate::tracer::TracerEngine::new($options, env!("CARGO_BIN_NAME"))
    };
}
