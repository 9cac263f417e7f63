pub mod config;
pub mod metrics;
pub mod process;
pub mod transcoder;
pub mod variant;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, OriginConfig,
    SanitizedConfig, ServerConfig,
};
pub use process::{ManagedProcess, ProcessError, ProcessPool, ProcessSpec, ProcessState};
pub use transcoder::{
    JobRequest, JobStatus, OrchestratorError, ReadinessError, StartedJob, TranscodeOrchestrator,
    TranscoderConfig,
};
pub use variant::{AudioCodec, Variant, VariantCatalog, VideoCodec};
