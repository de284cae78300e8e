//! Explicit routing table from communication path to backend.
//!
//! Built and validated once at startup; lookups at call time are a map
//! access, never string matching.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::errors::RoutingError;
use crate::domain::models::{AgentRole, CommunicationPath};
use crate::domain::ports::BackendClient;

/// Where a path's deliveries go.
#[derive(Clone)]
pub struct Route {
    pub path: CommunicationPath,
    pub backend: Arc<dyn BackendClient>,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("backend", &self.backend.name())
            .finish()
    }
}

/// Validated set of routes.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: HashMap<CommunicationPath, Route>,
}

impl RoutingTable {
    /// Start an empty table.
    pub fn builder() -> RoutingTableBuilder {
        RoutingTableBuilder::default()
    }

    /// Every downward route of the hierarchy served by one backend.
    pub fn full_hierarchy(backend: Arc<dyn BackendClient>) -> Self {
        let roles = AgentRole::all();
        let mut builder = Self::builder();
        for source in &roles {
            for destination in &roles {
                if source.can_delegate_to(destination) {
                    builder = builder.route(CommunicationPath::new(*source, *destination), Arc::clone(&backend));
                }
            }
        }
        // Every generated path is downward and unique.
        builder.build().unwrap_or_default()
    }

    /// Parse `source:destination` specs and route all of them to `backend`.
    pub fn from_specs<S: AsRef<str>>(specs: &[S], backend: Arc<dyn BackendClient>) -> Result<Self, RoutingError> {
        specs
            .iter()
            .try_fold(Self::builder(), |builder, spec| {
                let path: CommunicationPath = spec.as_ref().parse()?;
                Ok(builder.route(path, Arc::clone(&backend)))
            })?
            .build()
    }

    /// Route for `path`, if configured.
    pub fn get(&self, path: &CommunicationPath) -> Option<&Route> {
        self.routes.get(path)
    }

    /// Whether `path` is configured.
    pub fn contains(&self, path: &CommunicationPath) -> bool {
        self.routes.contains_key(path)
    }

    /// All routed paths in a stable order.
    pub fn paths(&self) -> Vec<CommunicationPath> {
        let mut paths: Vec<_> = self.routes.keys().copied().collect();
        paths.sort();
        paths
    }

    /// Destinations reachable from `source`, in a stable order.
    pub fn destinations_from(&self, source: AgentRole) -> Vec<AgentRole> {
        self.paths()
            .into_iter()
            .filter(|p| p.source == source)
            .map(|p| p.destination)
            .collect()
    }

    /// Number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no route is configured.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Collects routes; [`RoutingTableBuilder::build`] validates them.
#[derive(Default)]
pub struct RoutingTableBuilder {
    entries: Vec<Route>,
}

impl RoutingTableBuilder {
    /// Add a route. Validation happens at build time.
    pub fn route(mut self, path: CommunicationPath, backend: Arc<dyn BackendClient>) -> Self {
        self.entries.push(Route { path, backend });
        self
    }

    /// Reject upward, sideways and duplicate routes.
    pub fn build(self) -> Result<RoutingTable, RoutingError> {
        let mut routes = HashMap::with_capacity(self.entries.len());
        for route in self.entries {
            if !route.path.is_downward() {
                return Err(RoutingError::InvalidDirection(route.path));
            }
            if routes.contains_key(&route.path) {
                return Err(RoutingError::DuplicateRoute(route.path));
            }
            routes.insert(route.path, route);
        }
        Ok(RoutingTable { routes })
    }
}
