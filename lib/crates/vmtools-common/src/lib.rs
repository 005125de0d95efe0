pub mod config;
pub mod types;

pub use config::{
    CONNECTION_KEYS, CONNECTION_PREFIX, ConfigError, ConnectionSettings, HostVarBags, VM_KEYS,
    VM_PREFIX, VmSettings, settings_from_host_vars, split_host_vars,
};
pub use types::*;
