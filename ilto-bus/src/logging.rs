use tracing_subscriber::EnvFilter;

/// Installe le subscriber `tracing` du processus.
///
/// `RUST_LOG` a priorité ; sinon `default_directive` (ex: `"info"`).
/// Un second appel est sans effet.
pub fn init_logging(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
