use metrics::{describe_gauge, gauge};

pub fn component_info_metric(name: &'static str) {
    static NAME: &str = "trace_denoise_component_info";

    describe_gauge!(NAME, "Basic information about the component");

    let version = option_env!("GIT_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"));
    gauge!(NAME, "component" => name, "git_version" => version).set(1);
}

pub mod names {
    use const_format::concatcp;

    pub const METRIC_NAME_PREFIX: &str = "trace_denoise_";

    pub const FAILURES: &str = concatcp!(METRIC_NAME_PREFIX, "failures");
    pub const TRACE_EVENTS_PROCESSED: &str =
        concatcp!(METRIC_NAME_PREFIX, "trace_events_processed");
    pub const CHANNELS_DENOISED: &str = concatcp!(METRIC_NAME_PREFIX, "channels_denoised");
    pub const SAMPLES_DENOISED: &str = concatcp!(METRIC_NAME_PREFIX, "samples_denoised");
    pub const BREAKPOINTS_FOUND: &str = concatcp!(METRIC_NAME_PREFIX, "breakpoints_found");
}

pub mod failures {
    #[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
    pub enum FailureKind {
        DataProcessingFailed,
        FileReadFailed,
        FileWriteFailed,
        InvalidParameter,
    }

    // Label building function
    pub fn get_label(failure_kind: FailureKind) -> (&'static str, &'static str) {
        (
            "failure_kind",
            match failure_kind {
                FailureKind::DataProcessingFailed => "data_processing_failed",
                FailureKind::FileReadFailed => "file_read_failed",
                FailureKind::FileWriteFailed => "file_write_failed",
                FailureKind::InvalidParameter => "invalid_parameter",
            },
        )
    }
}
