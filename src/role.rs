use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::mem;

use itertools::Itertools;

use crate::model::buff::{BoonTarget, Buff, BuffUptime};
use crate::model::build::BuildBoons;
use crate::model::config::Configuration;

/// Stable index into the [`RoleSet`] that produced it. Numbering is
/// deterministic for a given catalog and local to one construction call.
pub type RoleId = usize;

/// Per-(buff, scope) maximum uptimes, with absent entries meaning zero.
/// Comparing two of these is how build equivalence and role dominance are
/// both decided.
type UptimeLookup = BTreeMap<(Buff, BoonTarget), f64>;

/// An equivalence class of builds that sustain the same buff uptimes
/// (within the configured tolerance). The search places roles, not
/// builds; which of the class's builds actually fills the slot is up to
/// the players.
#[derive(Debug, Clone)]
pub struct Role {
    pub id: RoleId,
    pub buff_uptimes: Vec<BuffUptime>,
    pub build_names: BTreeSet<String>,
    /// Roles whose uptimes are pointwise at least this role's: anywhere
    /// this role fits, any of these fits too.
    pub providing_roles: BTreeSet<RoleId>,
}

impl Role {
    pub fn provides_buff(&self, buff: &Buff) -> bool {
        self.buff_uptimes.iter().any(|uptime| &uptime.buff == buff)
    }

    /// Best uptime this role gives `buff` for the queried scope.
    pub fn uptime(&self, buff: &Buff, target: BoonTarget) -> f64 {
        self.buff_uptimes
            .iter()
            .filter(|uptime| &uptime.buff == buff)
            .map(|uptime| uptime.uptime_for(target))
            .fold(0.0, f64::max)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.buff_uptimes.iter().join(", "))
    }
}

fn simplify_uptimes(uptimes: &[BuffUptime]) -> UptimeLookup {
    let mut lookup = UptimeLookup::new();
    for uptime in uptimes {
        for target in BoonTarget::ALL {
            let entry = lookup.entry((uptime.buff.clone(), target)).or_insert(0.0);
            *entry = entry.max(uptime.uptime_for(target));
        }
    }
    lookup
}

fn uptimes_equal(lookup1: &UptimeLookup, lookup2: &UptimeLookup, tolerance: f64) -> bool {
    lookup1.keys().chain(lookup2.keys()).all(|key| {
        let uptime1 = lookup1.get(key).copied().unwrap_or(0.0);
        let uptime2 = lookup2.get(key).copied().unwrap_or(0.0);
        (uptime1 - uptime2).abs() <= tolerance
    })
}

/// Non-strict pointwise comparison over every buff and scope.
fn uptimes_greater(lookup1: &UptimeLookup, lookup2: &UptimeLookup, tolerance: f64) -> bool {
    lookup1.keys().chain(lookup2.keys()).all(|key| {
        let uptime1 = lookup1.get(key).copied().unwrap_or(0.0);
        let uptime2 = lookup2.get(key).copied().unwrap_or(0.0);
        uptime1 - uptime2 >= -tolerance
    })
}

/// Disjoint-set over build-variant indices, used to merge variants with
/// equal uptime vectors into roles.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(len: usize) -> DisjointSet {
        DisjointSet {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, index: usize) -> usize {
        let mut root = index;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // path compression
        let mut current = index;
        while self.parent[current] != root {
            current = mem::replace(&mut self.parent[current], root);
        }
        root
    }

    fn union(&mut self, index1: usize, index2: usize) {
        let root1 = self.find(index1);
        let root2 = self.find(index2);
        if root1 != root2 {
            self.parent[root2] = root1;
        }
    }
}

/// All roles derived from one catalog, with the dominance relation
/// precomputed. Role ids index into this set.
#[derive(Debug, Clone)]
pub struct RoleSet {
    roles: Vec<Role>,
}

impl RoleSet {
    /// Collapses a build catalog into roles. Every (build, variant) pair
    /// with at least one boon-uptime entry becomes a candidate vector;
    /// candidates equal within tolerance merge into one role carrying all
    /// their build names. Builds without usable variants contribute
    /// nothing and are invisible to the search.
    pub fn from_builds(builds: &BTreeMap<String, BuildBoons>, config: &Configuration) -> RoleSet {
        let mut entries: Vec<(&str, Vec<BuffUptime>)> = Vec::new();
        for (name, boons) in builds {
            for variant in &boons.variants {
                if variant.boon_uptimes.is_empty() {
                    continue;
                }
                let uptimes = variant
                    .boon_uptimes
                    .iter()
                    .map(|boon_uptime| BuffUptime::from_boon_uptime(boon_uptime, config))
                    .collect();
                entries.push((name.as_str(), uptimes));
            }
        }

        let tolerance = config.uptime_comparison_tolerance;
        let lookups: Vec<UptimeLookup> = entries
            .iter()
            .map(|(_, uptimes)| simplify_uptimes(uptimes))
            .collect();

        let mut sets = DisjointSet::new(entries.len());
        for (index1, index2) in (0..entries.len()).tuple_combinations() {
            if uptimes_equal(&lookups[index1], &lookups[index2], tolerance) {
                sets.union(index1, index2);
            }
        }

        // one role per component, numbered in first-encountered order,
        // with the first member's vector as representative
        let mut component_role: BTreeMap<usize, RoleId> = BTreeMap::new();
        let mut roles: Vec<Role> = Vec::new();
        for index in 0..entries.len() {
            let root = sets.find(index);
            let id = *component_role.entry(root).or_insert_with(|| {
                roles.push(Role {
                    id: roles.len(),
                    buff_uptimes: entries[index].1.clone(),
                    build_names: BTreeSet::new(),
                    providing_roles: BTreeSet::new(),
                });
                roles.len() - 1
            });
            roles[id].build_names.insert(entries[index].0.to_string());
        }

        let role_lookups: Vec<UptimeLookup> = roles
            .iter()
            .map(|role| simplify_uptimes(&role.buff_uptimes))
            .collect();
        for id1 in 0..roles.len() {
            for id2 in 0..roles.len() {
                if id1 != id2 && uptimes_greater(&role_lookups[id1], &role_lookups[id2], tolerance)
                {
                    roles[id2].providing_roles.insert(id1);
                }
            }
        }
        debug_assert!(roles.iter().all(|role| !role.providing_roles.contains(&role.id)));

        tracing::debug!(
            "collapsed {} build variants into {} roles",
            entries.len(),
            roles.len()
        );
        for role in &roles {
            tracing::trace!(
                "role {}: {} ({})",
                role.id,
                role,
                role.build_names.iter().join(", ")
            );
        }
        RoleSet { roles }
    }

    pub fn get(&self, id: RoleId) -> &Role {
        &self.roles[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.roles.iter()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}
