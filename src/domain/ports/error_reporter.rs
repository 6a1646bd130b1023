use crate::domain::errors::ControllerError;

/// Process-wide sink for errors that have no caller left to handle them.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &ControllerError);
}

/// Reports errors as structured error-level log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingErrorReporter;

impl ErrorReporter for LoggingErrorReporter {
    fn report(&self, error: &ControllerError) {
        match error {
            ControllerError::RetriesExhausted { key, attempts, .. } => {
                tracing::error!(key = %key, attempts, error = %error, "dropping event");
            }
            _ => tracing::error!(error = %error, "controller error"),
        }
    }
}
