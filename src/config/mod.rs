// Re-export all items from the submodules
mod default_configs;
mod env_vars;
mod scan_config;

// Re-export collector config
pub use scan_config::{
    CollectorConfig,
    Credentials,
    HostConfig,
    TimeoutConfig,
    UserConfig,
    default_extensions,
    default_search_roots,
    load_config,
};

pub use default_configs::{create_sample_config_file, SAMPLE_CONFIG_YAML};

// Re-export environment variable functions
pub use env_vars::{parse_env_reference, resolve_secret};
