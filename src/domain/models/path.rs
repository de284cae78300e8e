//! Communication paths between roles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::agent::AgentRole;
use crate::domain::errors::RoutingError;

/// Ordered `(source, destination)` role pair.
///
/// Keys both the circuit breaker state and the optimizer artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommunicationPath {
    pub source: AgentRole,
    pub destination: AgentRole,
}

impl CommunicationPath {
    /// Path from `source` to `destination`. Direction is checked by the routing table.
    pub fn new(source: AgentRole, destination: AgentRole) -> Self {
        Self { source, destination }
    }

    /// Whether the path delegates exactly one tier down.
    pub fn is_downward(&self) -> bool {
        self.source.can_delegate_to(&self.destination)
    }

    /// Filesystem-safe key, e.g. `queen--princess-dev`.
    pub fn storage_key(&self) -> String {
        format!("{}--{}", self.source, self.destination)
    }

    /// Inverse of [`CommunicationPath::storage_key`].
    pub fn from_storage_key(key: &str) -> Option<Self> {
        let (source, destination) = key.split_once("--")?;
        Some(Self::new(source.parse().ok()?, destination.parse().ok()?))
    }
}

impl fmt::Display for CommunicationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.destination)
    }
}

impl FromStr for CommunicationPath {
    type Err = RoutingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (source, destination) = s
            .split_once(':')
            .ok_or_else(|| RoutingError::InvalidPathSpec(s.to_string()))?;
        Ok(Self::new(source.parse()?, destination.parse()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::PrincessDomain;

    #[test]
    fn test_parse_path() {
        let path: CommunicationPath = "queen:princess-dev".parse().unwrap();
        assert_eq!(path.source, AgentRole::Queen);
        assert_eq!(path.destination, AgentRole::Princess(PrincessDomain::Development));
        assert_eq!(path.to_string(), "queen:princess-dev");
        assert!(path.is_downward());
    }

    #[test]
    fn test_parse_path_errors() {
        assert!(matches!(
            "queen".parse::<CommunicationPath>(),
            Err(RoutingError::InvalidPathSpec(_))
        ));
        assert!(matches!(
            "queen:emperor".parse::<CommunicationPath>(),
            Err(RoutingError::UnknownRole(_))
        ));
    }

    #[test]
    fn test_storage_key_round_trip() {
        let path = CommunicationPath::new(AgentRole::Princess(PrincessDomain::Research), AgentRole::Drone);
        assert_eq!(path.storage_key(), "princess-research--drone");
        assert_eq!(CommunicationPath::from_storage_key(&path.storage_key()), Some(path));
        assert_eq!(CommunicationPath::from_storage_key("garbage"), None);
    }
}
