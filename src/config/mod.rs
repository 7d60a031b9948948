pub mod schema;

pub use schema::{
    resolve_config_dir, AgentConfig, Config, CustomEthicsRule, EthicsConfig, GatewayConfig,
    ProviderConfig, SessionsConfig, WellbeingConfig, CONFIG_DIR_ENV,
};
