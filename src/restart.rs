//! Device-fatal recovery
//!
//! When frame storage cannot be allocated under the fail-fast policy, the
//! device cannot make progress. The condition is logged, the process waits
//! a bounded delay so the log can drain, and then the restart hook runs.

use std::time::Duration;

use crate::error::Error;

/// Exit status used by [`ProcessRestart`]
pub const RESTART_EXIT_CODE: i32 = 75;

/// What "restart the device" means for this process
pub trait RestartHook: Send + Sync + 'static {
    /// Restart after `cause`; may not return
    fn restart(&self, cause: &Error);
}

/// Exits the process so a supervisor starts it again
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRestart;

impl RestartHook for ProcessRestart {
    fn restart(&self, cause: &Error) {
        tracing::error!(error = %cause, code = RESTART_EXIT_CODE, "Restarting");
        std::process::exit(RESTART_EXIT_CODE);
    }
}

/// Run the device-fatal path: log, wait `delay`, invoke `hook`
pub async fn device_fatal(hook: &dyn RestartHook, delay: Duration, cause: &Error) {
    tracing::error!(
        error = %cause,
        delay_ms = delay.as_millis() as u64,
        "Device-fatal condition, restarting"
    );
    tokio::time::sleep(delay).await;
    hook.restart(cause);
}
