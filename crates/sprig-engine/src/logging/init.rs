use std::sync::Once;

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "info",
/// "sprig_engine=trace,wgpu=warn"). When unset, `RUST_LOG` is consulted, then
/// `default_level` is applied with wgpu's internals quieted.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub default_level: log::LevelFilter,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            default_level: log::LevelFilter::Info,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

static INIT: Once = Once::new();

/// Filter string the logger will be built with.
fn filter_spec(config: &LoggingConfig, rust_log: Option<String>) -> String {
    if let Some(filter) = config.env_filter.clone().or(rust_log) {
        return filter;
    }
    let level = config.default_level.to_string().to_lowercase();
    format!("{level},wgpu_core=warn,wgpu_hal=warn,naga=warn")
}

/// Initializes the global logger once; later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = filter_spec(&config, std::env::var("RUST_LOG").ok());

        env_logger::Builder::new()
            .parse_filters(&filter)
            .write_style(config.write_style)
            .init();

        log::debug!("logging initialized ({filter})");
    });
}
