//! Client configuration
//!
//! Four layers, later ones winning:
//! 1. Built-in defaults
//! 2. User config (~/.config/pcats/client.toml, or --config)
//! 3. Environment (PCATS_BASE_URL, PCATS_TOKEN)
//! 4. CLI flags

mod defaults;
mod effective;
mod merge;

pub use defaults::BuiltinDefaults;
pub use effective::{
    default_config_path, env_layer, ClientSettings, ConfigError, ConfigOrigin, ConfigSource,
    EffectiveConfig, HttpSettings, PollSettings, ENV_BASE_URL, ENV_TOKEN,
};
pub use merge::{deep_merge, layer_from_pairs, merge_layers, set_path, toml_to_json};
