//! Notification channel port. Delivery is best effort.

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification setup failed: {0}")]
    Setup(String),

    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

pub trait Notifier {
    fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError>;
}
