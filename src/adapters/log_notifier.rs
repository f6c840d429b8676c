//! Notifier that only writes to the tracing log.

use tracing::info;

use crate::ports::notify_port::{NotifyError, Notifier};

pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        info!(subject, "{}", body.trim_end());
        Ok(())
    }
}
