use once_cell::sync::OnceCell;
use std::sync::Once;
use tracing_appender::non_blocking::WorkerGuard;

// Dropping the guard would stop the background file writer
pub static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();
pub static INIT_ONCE: Once = Once::new();
pub static INIT_ERROR: OnceCell<String> = OnceCell::new();
