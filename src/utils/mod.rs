/// TOML configuration: parsing, defaults and validation.
pub mod toml_config;
