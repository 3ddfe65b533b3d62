use crate::connection::DEFAULT_READ_TIMEOUT;
use crate::device::Limits;
use crate::error::{CoolerError, Result};
use std::time::Duration;

/// Quiet period that ends a multi-line reply once its first line arrived
pub const DEFAULT_LINE_GAP: Duration = Duration::from_millis(200);

/// Longest read timeout or line gap accepted
pub const MAX_TIMEOUT: Duration = Duration::from_secs(3600);

/// Reject zero and absurdly long durations before they reach a deadline.
pub(crate) fn check_timeout(name: &str, value: Duration) -> Result<()> {
    if value.is_zero() || value > MAX_TIMEOUT {
        return Err(CoolerError::InvalidArgument(format!(
            "{name} must be greater than zero and at most {MAX_TIMEOUT:?}, got {value:?}"
        )));
    }
    Ok(())
}

/// Behaviour of a [`Cryocooler`](crate::Cryocooler) that is independent of
/// the link it talks over.
#[derive(Debug, Clone, PartialEq)]
pub struct CoolerOptions {
    /// Deadline for a whole reply. Replaced by the connection's own read
    /// timeout on `connect`.
    pub read_timeout: Duration,
    /// How long to wait for another line of a multi-line reply
    pub line_gap: Duration,
    /// Argument ranges checked before a setter is sent
    pub limits: Limits,
}

impl Default for CoolerOptions {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            line_gap: DEFAULT_LINE_GAP,
            limits: Limits::default(),
        }
    }
}

impl CoolerOptions {
    pub fn builder() -> CoolerOptionsBuilder {
        CoolerOptionsBuilder::default()
    }

    /// Check the durations. A zero line gap would cut multi-line replies
    /// after their first line.
    pub fn validate(&self) -> Result<()> {
        check_timeout("read timeout", self.read_timeout)?;
        check_timeout("line gap", self.line_gap)
    }
}

/// Builder for CoolerOptions.
#[derive(Debug, Clone, Default)]
pub struct CoolerOptionsBuilder {
    options: CoolerOptions,
}

impl CoolerOptionsBuilder {
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.options.read_timeout = timeout;
        self
    }

    pub fn line_gap(mut self, gap: Duration) -> Self {
        self.options.line_gap = gap;
        self
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.options.limits = limits;
        self
    }

    pub fn build(self) -> Result<CoolerOptions> {
        self.options.validate()?;
        Ok(self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = CoolerOptions::default();
        assert_eq!(options.read_timeout, Duration::from_secs(1));
        assert_eq!(options.line_gap, DEFAULT_LINE_GAP);
        assert_eq!(options.limits, Limits::default());
    }

    #[test]
    fn test_builder() {
        let limits = Limits::new((40.0, 300.0), (0.0, 200.0)).unwrap();
        let options = CoolerOptions::builder()
            .read_timeout(Duration::from_millis(1500))
            .line_gap(Duration::from_millis(50))
            .limits(limits.clone())
            .build()
            .unwrap();

        assert_eq!(options.read_timeout, Duration::from_millis(1500));
        assert_eq!(options.line_gap, Duration::from_millis(50));
        assert_eq!(options.limits, limits);
    }

    #[test]
    fn test_builder_rejects_bad_durations() {
        for gap in [Duration::ZERO, Duration::MAX] {
            assert!(matches!(
                CoolerOptions::builder().line_gap(gap).build(),
                Err(CoolerError::InvalidArgument(_))
            ));
        }
        for timeout in [Duration::ZERO, MAX_TIMEOUT + Duration::from_secs(1), Duration::MAX] {
            assert!(matches!(
                CoolerOptions::builder().read_timeout(timeout).build(),
                Err(CoolerError::InvalidArgument(_))
            ));
        }
        assert!(CoolerOptions::builder().read_timeout(MAX_TIMEOUT).build().is_ok());
    }
}
