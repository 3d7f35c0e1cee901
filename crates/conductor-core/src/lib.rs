// ABOUTME: Core library for conductor - backend configuration, error taxonomy
// ABOUTME: Shared between conductor-serve and embedding applications

pub mod backend;
pub mod config;
pub mod error;

pub use backend::{
    apply_defaults, backend_label, uses_custom_url, BackendConfig, BackendHandle, EnvDefaults,
};
pub use config::Config;
pub use error::{
    classify, ClassifiedError, ConfigError, ConnectionError, ErrorKind, TaskError,
};
