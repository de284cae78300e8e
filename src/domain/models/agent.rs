//! Agent roles and identities.
//!
//! Roles are a closed set arranged in three tiers. A Queen coordinates
//! Princesses, each Princess owns a domain and coordinates Drones.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::errors::RoutingError;

/// Tier of an agent role in the delegation hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentTier {
    /// Top-level coordinator.
    Coordinator,
    /// Mid-tier domain coordinators.
    Mid,
    /// Leaf workers.
    Leaf,
}

impl AgentTier {
    /// Lowercase name, as used in role strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coordinator => "coordinator",
            Self::Mid => "mid",
            Self::Leaf => "leaf",
        }
    }

    /// Depth in the hierarchy, 0 for the coordinator.
    pub fn depth(&self) -> u8 {
        match self {
            Self::Coordinator => 0,
            Self::Mid => 1,
            Self::Leaf => 2,
        }
    }
}

/// Domain owned by a mid-tier Princess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrincessDomain {
    Development,
    Quality,
    Security,
    Research,
    Infrastructure,
    Coordination,
}

impl PrincessDomain {
    /// Every domain, in display order.
    pub const ALL: [Self; 6] = [
        Self::Development,
        Self::Quality,
        Self::Security,
        Self::Research,
        Self::Infrastructure,
        Self::Coordination,
    ];

    /// Tier name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "dev",
            Self::Quality => "quality",
            Self::Security => "security",
            Self::Research => "research",
            Self::Infrastructure => "infra",
            Self::Coordination => "coordination",
        }
    }

    fn from_suffix(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == s)
    }
}

/// Role carried by an agent.
///
/// Serialized as a kebab-case string: `queen`, `princess-dev`, `drone`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AgentRole {
    Queen,
    Princess(PrincessDomain),
    Drone,
}

impl AgentRole {
    /// Every role, in hierarchy order.
    pub fn all() -> Vec<Self> {
        let mut roles = vec![Self::Queen];
        roles.extend(PrincessDomain::ALL.into_iter().map(Self::Princess));
        roles.push(Self::Drone);
        roles
    }

    /// Tier this role sits in.
    pub fn tier(&self) -> AgentTier {
        match self {
            Self::Queen => AgentTier::Coordinator,
            Self::Princess(_) => AgentTier::Mid,
            Self::Drone => AgentTier::Leaf,
        }
    }

    /// Whether this role may hand work to `other`.
    ///
    /// Delegation only flows one tier down.
    pub fn can_delegate_to(&self, other: &AgentRole) -> bool {
        other.tier().depth() == self.tier().depth() + 1
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queen => write!(f, "queen"),
            Self::Princess(domain) => write!(f, "princess-{}", domain.as_str()),
            Self::Drone => write!(f, "drone"),
        }
    }
}

impl FromStr for AgentRole {
    type Err = RoutingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "queen" => Ok(Self::Queen),
            "drone" => Ok(Self::Drone),
            other => other
                .strip_prefix("princess-")
                .and_then(PrincessDomain::from_suffix)
                .map(Self::Princess)
                .ok_or_else(|| RoutingError::UnknownRole(s.to_string())),
        }
    }
}

impl TryFrom<String> for AgentRole {
    type Error = RoutingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AgentRole> for String {
    fn from(role: AgentRole) -> Self {
        role.to_string()
    }
}

/// Immutable identity of a registered agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentIdentity {
    role: AgentRole,
    instance_id: Uuid,
}

impl AgentIdentity {
    /// Register a fresh instance of `role`.
    pub fn new(role: AgentRole) -> Self {
        Self {
            role,
            instance_id: Uuid::new_v4(),
        }
    }

    /// Identity with a known instance id.
    pub fn with_instance(role: AgentRole, instance_id: Uuid) -> Self {
        Self { role, instance_id }
    }

    /// Role this agent plays.
    pub fn role(&self) -> AgentRole {
        self.role
    }

    /// Unique id of this agent instance.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }
}

impl fmt::Display for AgentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.role, &self.instance_id.to_string()[..8])
    }
}
