use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

lazy_static! {
    pub static ref LOG_INIT: AtomicUsize = AtomicUsize::new(0);
}

/// Start logging once per process.  RUST_LOG picks the level; warnings and
/// worse are shown otherwise.
pub fn init() {
    if LOG_INIT.fetch_add(1, Ordering::SeqCst) == 0 {
        let env = env_logger::Env::default().default_filter_or("warn");
        // A logger installed by someone else wins.
        env_logger::Builder::from_env(env)
            .format_timestamp(None)
            .try_init()
            .ok();
    }
}
