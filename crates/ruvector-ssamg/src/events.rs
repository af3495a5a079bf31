//! Release events emitted while a handle is torn down.
//!
//! [`SsAmg::destroy`](crate::solver::SsAmg::destroy) walks the hierarchy and
//! records one [`ReleaseEvent`] per resource in a [`ReleaseLog`]. The log is
//! the input of the leak / double-release detector in [`audit`](crate::audit)
//! and can be serialised for inspection.

use serde::{Deserialize, Serialize};

/// Who owns the data behind a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ownership {
    /// Data belongs to the caller; releasing the slot drops only the
    /// reference to it.
    Borrowed,
    /// Data belongs to the hierarchy and is dropped with the slot.
    Owned,
}

/// A resource held by an SSAMG handle.
///
/// Transfer resources are indexed by transfer index `t`, connecting level
/// `t` to level `t + 1`; they are released during level `t + 1`'s pass.
///
/// Tagged with `#[serde(tag = "type")]` so a resource serialises as
/// `{ "type": "Operator", "level": 2 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Resource {
    /// Absolute residual norm history.
    ResidualNorms,
    /// Relative residual norm history.
    RelativeResidualNorms,
    /// Smoother workspace of a level.
    RelaxWorkspace { level: usize },
    /// Matrix-vector product workspace of a level.
    MatvecWorkspace { level: usize },
    /// Grid of a level.
    Grid { level: usize },
    /// Right-hand side vector of a level.
    Rhs { level: usize },
    /// Solution vector of a level.
    Solution { level: usize },
    /// Temporary / residual vector of a level.
    Temporary { level: usize },
    /// Operator of a level.
    Operator { level: usize },
    /// Interpolation operator `P` of a transfer.
    Interpolation { transfer: usize },
    /// Restriction operator `RT` of a transfer.
    Restriction { transfer: usize },
    /// Restriction workspace of a transfer.
    RestrictWorkspace { transfer: usize },
    /// Interpolation workspace of a transfer.
    InterpWorkspace { transfer: usize },
    /// Per-part coarsening directions of a level.
    CoarseningDirections { level: usize },
    /// Per-part relaxation weights of a level.
    RelaxWeights { level: usize },
    /// Placeholder weight storage for unused level capacity.
    ReservedWeights { level: usize },
    /// The per-level tables themselves.
    LevelTables,
    /// Grid spacing triple of one registered part.
    PartSpacing { part: usize },
    /// The grid spacing table.
    SpacingTable,
    /// The handle.
    Handle,
}

impl Resource {
    /// Level pass during which this resource is released, if it belongs to
    /// one.
    pub fn level_pass(&self) -> Option<usize> {
        match *self {
            Resource::RelaxWorkspace { level }
            | Resource::MatvecWorkspace { level }
            | Resource::Grid { level }
            | Resource::Rhs { level }
            | Resource::Solution { level }
            | Resource::Temporary { level }
            | Resource::Operator { level }
            | Resource::CoarseningDirections { level }
            | Resource::RelaxWeights { level } => Some(level),
            Resource::Interpolation { transfer }
            | Resource::Restriction { transfer }
            | Resource::RestrictWorkspace { transfer }
            | Resource::InterpWorkspace { transfer } => Some(transfer + 1),
            _ => None,
        }
    }

    /// `true` for the vectors and workspaces that reference a level's
    /// operator.
    pub fn references_operator(&self) -> bool {
        matches!(
            self,
            Resource::RelaxWorkspace { .. }
                | Resource::MatvecWorkspace { .. }
                | Resource::Rhs { .. }
                | Resource::Solution { .. }
                | Resource::Temporary { .. }
        )
    }
}

/// One resource released during teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseEvent {
    /// What was released.
    pub resource: Resource,
    /// Ownership of the data behind it at the time of release.
    pub ownership: Ownership,
}

/// Ordered record of a teardown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseLog {
    events: Vec<ReleaseEvent>,
}

impl ReleaseLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a release.
    pub fn record(&mut self, resource: Resource, ownership: Ownership) {
        self.events.push(ReleaseEvent {
            resource,
            ownership,
        });
    }

    /// Events in release order.
    pub fn events(&self) -> &[ReleaseEvent] {
        &self.events
    }

    /// Number of recorded releases.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// `true` if nothing was released.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Position of the first release of `resource`.
    pub fn position(&self, resource: Resource) -> Option<usize> {
        self.events.iter().position(|e| e.resource == resource)
    }

    /// Number of times `resource` was released.
    pub fn count(&self, resource: Resource) -> usize {
        self.events.iter().filter(|e| e.resource == resource).count()
    }

    /// Releases that dropped hierarchy-owned data.
    pub fn owned(&self) -> impl Iterator<Item = &ReleaseEvent> {
        self.events.iter().filter(|e| e.ownership == Ownership::Owned)
    }

    /// Releases that dropped only a reference to caller data.
    pub fn borrowed(&self) -> impl Iterator<Item = &ReleaseEvent> {
        self.events.iter().filter(|e| e.ownership == Ownership::Borrowed)
    }
}
