use std::sync::Once;

static INIT: Once = Once::new();

/// One-time process setup. Installs `env_logger` when built with the `debug`
/// feature; otherwise log records go to whatever logger the host installed.
pub fn init() {
    INIT.call_once(|| {
        #[cfg(feature = "debug")]
        {
            let _ = env_logger::builder()
                .format_timestamp(None)
                .format_module_path(false)
                .try_init();
        }
        log::debug!("stackrec initialized");
    });
}
