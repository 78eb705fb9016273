pub mod metrics;
pub mod tracer;

pub type Channel = u32;
pub type Intensity = u16;
pub type TraceEventIndex = usize;
