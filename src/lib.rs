pub mod auth;
pub mod test_support;

use std::sync::Once;

use env_logger::Env;

static LOGGER: Once = Once::new();

/// Installs the global logger once; later calls are no-ops. `RUST_LOG`
/// overrides the default `info` filter.
pub fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logger_is_idempotent() {
        init_logger();
        init_logger();
        log::info!("logger installed");
        assert!(LOGGER.is_completed());
    }
}
