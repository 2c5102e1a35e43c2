//! Role-scoped tool availability.
//!
//! Administrators control which tools are enabled and which roles may see
//! them. This gate is a pure function over a cached policy snapshot; the
//! request path never performs I/O here.

use crate::catalog::{Role, ToolId};
use crate::stores::ToolPolicy;
use std::collections::{BTreeMap, BTreeSet};

/// An immutable view of the tool policy table at one point in time.
///
/// Callers never mutate a snapshot; the cache swaps whole snapshots on
/// refresh (copy-on-read).
#[derive(Debug, Clone, Default)]
pub struct PolicySnapshot {
    by_tool: BTreeMap<ToolId, ToolPolicy>,
}

impl PolicySnapshot {
    pub fn from_policies(policies: Vec<ToolPolicy>) -> Self {
        Self {
            by_tool: policies.into_iter().map(|p| (p.tool, p)).collect(),
        }
    }

    /// Whether `role` may use `tool` under this snapshot.
    ///
    /// A tool with no record is allowed for every role: an absent row must
    /// never silently disable functionality. Organization admins are checked
    /// under the ordinary user view, so the role name alone grants nothing.
    pub fn allows(&self, tool: ToolId, role: Role) -> bool {
        match self.by_tool.get(&tool) {
            None => true,
            Some(policy) => {
                policy.enabled && policy.allowed_roles.contains(&role.policy_view())
            }
        }
    }

    /// Policies in administrator display order, for diagnostics output.
    pub fn ordered(&self) -> Vec<&ToolPolicy> {
        let mut policies: Vec<_> = self.by_tool.values().collect();
        policies.sort_by_key(|p| (p.order, p.tool));
        policies
    }
}

/// Filter a candidate pool down to what `role` is allowed to see.
pub fn filter_pool(
    snapshot: &PolicySnapshot,
    pool: &BTreeSet<ToolId>,
    role: Role,
) -> BTreeSet<ToolId> {
    pool.iter()
        .copied()
        .filter(|tool| snapshot.allows(*tool, role))
        .collect()
}
