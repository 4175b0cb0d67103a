pub mod audio;
pub mod config;
mod lock;
pub mod pipeline;
pub mod telemetry;
pub mod video;

pub use pipeline::{
    run_with_retry, DeviceBackend, NativeDevices, Pipeline, PipelineConfig, RetryPolicy,
};
