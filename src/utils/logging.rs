//! Logging macros gated by a per-module `const ENABLE_LOGS: bool`, so noisy
//! modules can be silenced at compile time without touching the global
//! filter.
//!
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//!
//! crate::log_info!("goal {} switched to {}", goal_id, mode);
//! ```

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
