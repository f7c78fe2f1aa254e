pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Boxed error returned by transport adapters; the core maps it into its own taxonomy.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// Line-oriented duplex link to the sensor microcontroller.
pub trait Transport {
    /// Read one line, blocking up to `timeout`.
    ///
    /// Returns `Ok(None)` when the timeout elapses without a complete line; that is an
    /// empty read, not a failure. Returned lines have their terminator removed.
    fn read_line(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<Option<String>, TransportError>;

    /// Write one line; the implementation appends the terminator.
    fn write_line(&mut self, line: &str) -> Result<(), TransportError>;

    /// Drop anything buffered on the inbound side.
    fn reset_input(&mut self) -> Result<(), TransportError>;

    /// Release the link. Called once on shutdown; later calls should be no-ops.
    fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read_line(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<Option<String>, TransportError> {
        (**self).read_line(timeout)
    }

    fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        (**self).write_line(line)
    }

    fn reset_input(&mut self) -> Result<(), TransportError> {
        (**self).reset_input()
    }

    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }
}
