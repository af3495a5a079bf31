//! Leak and double-release detection for handle teardown.
//!
//! Take a [`ResourceManifest`] of a live handle with
//! [`SsAmg::manifest`](crate::solver::SsAmg::manifest), destroy the handle,
//! then hand both to [`audit_release`]. A correct teardown yields no
//! [`Anomaly`]:
//!
//! - every held resource is released exactly once,
//! - caller data is released as [`Ownership::Borrowed`] (reference only),
//! - nothing outside the manifest is released,
//! - passes run in order (history, levels finest to coarsest, reserved
//!   weights, level tables, grid spacing, handle), and within a level every
//!   vector and workspace goes before the operator it references.
//!
//! # Example
//!
//! ```rust,ignore
//! let manifest = handle.manifest();
//! let log = handle.destroy();
//! let anomalies = audit_release(&manifest, &log);
//! assert!(anomalies.is_empty(), "{anomalies:?}");
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::events::{Ownership, ReleaseLog, Resource};

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// Resources a handle holds at a point in time, with their ownership.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceManifest {
    entries: Vec<(Resource, Ownership)>,
}

impl ResourceManifest {
    /// Manifest from `(resource, ownership)` pairs.
    pub fn new(entries: Vec<(Resource, Ownership)>) -> Self {
        Self { entries }
    }

    /// Entries in release order.
    pub fn entries(&self) -> &[(Resource, Ownership)] {
        &self.entries
    }

    /// Ownership of `resource`, if held.
    pub fn ownership(&self, resource: Resource) -> Option<Ownership> {
        self.entries
            .iter()
            .find(|(r, _)| *r == resource)
            .map(|&(_, o)| o)
    }

    /// Number of held resources.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing is held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of held resources matching `pred`.
    pub fn count(&self, pred: impl Fn(&Resource) -> bool) -> usize {
        self.entries.iter().filter(|(r, _)| pred(r)).count()
    }
}

// ---------------------------------------------------------------------------
// Anomalies
// ---------------------------------------------------------------------------

/// A teardown defect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Anomaly {
    /// A held resource was never released.
    Leak { resource: Resource },
    /// A resource was released more than once.
    DoubleRelease { resource: Resource, times: usize },
    /// Caller data was released as if the hierarchy owned it.
    CallerDataReleased { resource: Resource },
    /// A resource outside the manifest was released.
    Unexpected { resource: Resource },
    /// A resource was released out of dependency order.
    OutOfOrder {
        resource: Resource,
        /// The resource that should have gone first.
        after: Resource,
    },
}

/// Rank of the teardown pass a resource belongs to.
fn pass_rank(resource: &Resource) -> (u8, usize) {
    match *resource {
        Resource::ResidualNorms | Resource::RelativeResidualNorms => (0, 0),
        Resource::ReservedWeights { level } => (2, level),
        Resource::LevelTables => (3, 0),
        Resource::PartSpacing { part } => (4, part),
        Resource::SpacingTable => (5, 0),
        Resource::Handle => (6, 0),
        ref r => (1, r.level_pass().unwrap_or(0)),
    }
}

/// Compare a manifest against a teardown log.
///
/// Anomalies are reported in a stable order: leaks (manifest order), then
/// double releases, caller-data releases, unexpected releases, and ordering
/// violations (log order).
pub fn audit_release(manifest: &ResourceManifest, log: &ReleaseLog) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();

    let mut counts: HashMap<Resource, usize> = HashMap::new();
    for event in log.events() {
        *counts.entry(event.resource).or_default() += 1;
    }

    for &(resource, _) in manifest.entries() {
        if !counts.contains_key(&resource) {
            anomalies.push(Anomaly::Leak { resource });
        }
    }

    let mut reported = Vec::new();
    for event in log.events() {
        let times = counts[&event.resource];
        if times > 1 && !reported.contains(&event.resource) {
            reported.push(event.resource);
            anomalies.push(Anomaly::DoubleRelease {
                resource: event.resource,
                times,
            });
        }
    }

    for event in log.events() {
        match manifest.ownership(event.resource) {
            Some(Ownership::Borrowed) if event.ownership == Ownership::Owned => {
                anomalies.push(Anomaly::CallerDataReleased {
                    resource: event.resource,
                });
            }
            None => anomalies.push(Anomaly::Unexpected {
                resource: event.resource,
            }),
            _ => {}
        }
    }

    // Pass order.
    let events = log.events();
    for pair in events.windows(2) {
        if pass_rank(&pair[1].resource) < pass_rank(&pair[0].resource) {
            anomalies.push(Anomaly::OutOfOrder {
                resource: pair[1].resource,
                after: pair[0].resource,
            });
        }
    }

    // Within a level: the operator goes after everything that references it.
    for (pos, event) in events.iter().enumerate() {
        if let Resource::Operator { level } = event.resource {
            for later in &events[pos + 1..] {
                if later.resource.references_operator()
                    && later.resource.level_pass() == Some(level)
                {
                    anomalies.push(Anomaly::OutOfOrder {
                        resource: event.resource,
                        after: later.resource,
                    });
                }
            }
        }
    }

    anomalies
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
