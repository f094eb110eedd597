use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Documents requested per page, and the most writes one batch commit accepts.
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// When queued updates are committed during a scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushPolicy {
    /// Commit after every page, bounding what a fatal error can lose to one page.
    #[default]
    Page,
    /// Commit once after the whole scan.
    End,
}

impl FlushPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            FlushPolicy::Page => "page",
            FlushPolicy::End => "end",
        }
    }
}

impl fmt::Display for FlushPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlushPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "page" => Ok(FlushPolicy::Page),
            "end" => Ok(FlushPolicy::End),
            _ => Err(CoreError::InvalidFlushPolicy(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FlushPolicy;

    #[test]
    fn flush_policy_parses_labels() {
        assert_eq!("page".parse::<FlushPolicy>(), Ok(FlushPolicy::Page));
        assert_eq!(" END ".parse::<FlushPolicy>(), Ok(FlushPolicy::End));
        assert!("never".parse::<FlushPolicy>().is_err());
        assert_eq!(FlushPolicy::default(), FlushPolicy::Page);
    }
}
