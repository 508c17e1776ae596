//! Capability tags.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Tag that grants every capability.
pub const WILDCARD: &str = "*";

/// A named grant unlocking one kernel subsystem.
///
/// The first five tags attach a subsystem reference to a tenant's caps; the
/// rest are plain flags consumed by collaborators (network, filesystem, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Clock,
    Rng,
    Trace,
    Chaos,
    Ipc,
    Net,
    Fs,
    Stdio,
    Env,
    Signal,
}

impl Capability {
    pub const ALL: [Capability; 10] = [
        Capability::Clock,
        Capability::Rng,
        Capability::Trace,
        Capability::Chaos,
        Capability::Ipc,
        Capability::Net,
        Capability::Fs,
        Capability::Stdio,
        Capability::Env,
        Capability::Signal,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Capability::Clock => "clock",
            Capability::Rng => "rng",
            Capability::Trace => "trace",
            Capability::Chaos => "chaos",
            Capability::Ipc => "ipc",
            Capability::Net => "net",
            Capability::Fs => "fs",
            Capability::Stdio => "stdio",
            Capability::Env => "env",
            Capability::Signal => "signal",
        }
    }

    /// Whether the tag carries a subsystem reference rather than a flag.
    pub fn is_subsystem(&self) -> bool {
        matches!(
            self,
            Capability::Clock
                | Capability::Rng
                | Capability::Trace
                | Capability::Chaos
                | Capability::Ipc
        )
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown capability tag: {0}")]
pub struct UnknownCapability(pub String);

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .iter()
            .copied()
            .find(|c| c.tag() == s)
            .ok_or_else(|| UnknownCapability(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip_through_from_str() {
        for cap in Capability::ALL {
            assert_eq!(cap.tag().parse::<Capability>().unwrap(), cap);
        }
    }

    #[test]
    fn unknown_tag_rejected() {
        let err = "root".parse::<Capability>().unwrap_err();
        assert_eq!(err, UnknownCapability("root".into()));
        assert!(WILDCARD.parse::<Capability>().is_err());
    }

    #[test]
    fn subsystem_vs_flag() {
        assert!(Capability::Clock.is_subsystem());
        assert!(Capability::Ipc.is_subsystem());
        assert!(!Capability::Net.is_subsystem());
        assert!(!Capability::Signal.is_subsystem());
    }
}
