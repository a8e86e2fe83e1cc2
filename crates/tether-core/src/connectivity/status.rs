use std::fmt;

use serde::{Deserialize, Serialize};

/// Physical link reported by the platform's path observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    Wifi,
    Cellular,
    Wired,
    /// Reachable, but the link kind is not known (e.g. inferred by a probe).
    Other,
    /// No link at all.
    None,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::Wifi => "wifi",
            LinkType::Cellular => "cellular",
            LinkType::Wired => "wired",
            LinkType::Other => "other",
            LinkType::None => "none",
        }
    }
}

/// Tri-state connection status. `Unknown` only occurs between startup and
/// the first observation; after that the status is always definite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected(LinkType),
    Disconnected,
    Unknown,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected(_))
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connected(link) => write!(f, "connected ({})", link.as_str()),
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// One observation handed in by the embedding platform's path monitor, or
/// synthesized by the fallback poller.
#[derive(Debug, Clone, Copy)]
pub struct PathSample {
    pub reachable: bool,
    pub link: LinkType,
}

impl PathSample {
    pub fn status(&self) -> ConnectionStatus {
        if self.reachable {
            ConnectionStatus::Connected(self.link)
        } else {
            ConnectionStatus::Disconnected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_maps_to_status() {
        let up = PathSample {
            reachable: true,
            link: LinkType::Wifi,
        };
        assert_eq!(up.status(), ConnectionStatus::Connected(LinkType::Wifi));
        assert!(up.status().is_connected());

        let down = PathSample {
            reachable: false,
            link: LinkType::None,
        };
        assert_eq!(down.status(), ConnectionStatus::Disconnected);
        assert!(!down.status().is_connected());
    }

    #[test]
    fn status_display_is_human_readable() {
        assert_eq!(
            ConnectionStatus::Connected(LinkType::Cellular).to_string(),
            "connected (cellular)"
        );
        assert_eq!(ConnectionStatus::Disconnected.to_string(), "disconnected");
        assert_eq!(ConnectionStatus::Unknown.to_string(), "unknown");
    }
}
