use std::collections::BTreeMap;
use std::fmt;
use std::iter;

use itertools::Itertools;

use crate::model::buff::{BoonTarget, Buff};
use crate::model::config::{Configuration, MAX_GROUP_SIZE};
use crate::role::{RoleId, RoleSet};
use crate::simplify::{simplify_compositions, Composition};

pub(crate) type RoleCounter = BTreeMap<RoleId, usize>;

fn count_roles(role_ids: &[RoleId]) -> RoleCounter {
    let mut counter = RoleCounter::new();
    for &role_id in role_ids {
        *counter.entry(role_id).or_insert(0) += 1;
    }
    counter
}

/// Multiset difference, counter-style: entries of `counter` in excess of
/// `other`, everything else dropped.
fn counter_sub(counter: &RoleCounter, other: &RoleCounter) -> RoleCounter {
    counter
        .iter()
        .filter_map(|(&role_id, &count)| {
            let other_count = other.get(&role_id).copied().unwrap_or(0);
            (count > other_count).then(|| (role_id, count - other_count))
        })
        .collect()
}

fn counter_elements(counter: &RoleCounter) -> Vec<RoleId> {
    counter
        .iter()
        .flat_map(|(&role_id, &count)| iter::repeat(role_id).take(count))
        .collect()
}

/// One concrete way to fill the squad: a multiset of roles per
/// sub-group. Which group is "first" matters for uptime (party buffs stay
/// in their group) but not for deciding whether two compositions use the
/// same roles.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleComposition {
    pub group1: Vec<RoleId>,
    pub group2: Vec<RoleId>,
    pub(crate) group1_counter: RoleCounter,
    pub(crate) group2_counter: RoleCounter,
    roles_counter: RoleCounter,
}

impl SimpleComposition {
    pub fn new(group1: Vec<RoleId>, group2: Vec<RoleId>) -> SimpleComposition {
        assert!(group1.len() <= MAX_GROUP_SIZE && group2.len() <= MAX_GROUP_SIZE);
        let group1_counter = count_roles(&group1);
        let group2_counter = count_roles(&group2);
        let mut roles_counter = group1_counter.clone();
        for (&role_id, &count) in &group2_counter {
            *roles_counter.entry(role_id).or_insert(0) += count;
        }
        SimpleComposition {
            group1,
            group2,
            group1_counter,
            group2_counter,
            roles_counter,
        }
    }

    pub fn empty() -> SimpleComposition {
        SimpleComposition::new(Vec::new(), Vec::new())
    }

    pub fn roles(&self) -> Vec<RoleId> {
        self.group1.iter().chain(&self.group2).copied().collect()
    }

    pub fn len(&self) -> usize {
        self.group1.len() + self.group2.len()
    }

    pub fn is_empty(&self) -> bool {
        self.group1.is_empty() && self.group2.is_empty()
    }

    /// Combined-multiset equality: the grouping relation of the
    /// simplification pass.
    pub fn same_roles(&self, other: &SimpleComposition) -> bool {
        self.roles_counter == other.roles_counter
    }

    /// Achieved uptime of `buff` in each sub-group: own-group party
    /// contributions plus squad contributions from the other group.
    pub fn uptime(&self, buff: &Buff, roles: &RoleSet) -> [f64; 2] {
        let party = |group: &[RoleId]| -> f64 {
            group
                .iter()
                .map(|&role_id| roles.get(role_id).uptime(buff, BoonTarget::Party))
                .sum()
        };
        let squad = |group: &[RoleId]| -> f64 {
            group
                .iter()
                .map(|&role_id| roles.get(role_id).uptime(buff, BoonTarget::Squad))
                .sum()
        };
        [
            party(&self.group1) + squad(&self.group2),
            party(&self.group2) + squad(&self.group1),
        ]
    }

    /// True when any target buff reaches the configured ceiling in either
    /// sub-group. Never true without a ceiling.
    pub fn overstack(&self, roles: &RoleSet, config: &Configuration) -> bool {
        let Some(ceiling) = config.overstack_uptime else {
            return false;
        };
        config.target_buffs.iter().any(|buff| {
            self.uptime(buff, roles)
                .into_iter()
                .any(|uptime| uptime >= ceiling)
        })
    }

    /// Whether every role `other` uses that this composition does not is
    /// replaceable by one of this composition's excess roles, via role
    /// dominance. Unambiguous one-candidate substitutions are resolved
    /// greedily; the remainder falls back to trying every ordering, which
    /// stays cheap because the remainder is small once the greedy pass
    /// has run.
    pub fn provides(&self, other: &SimpleComposition, roles: &RoleSet) -> bool {
        let mut remaining = counter_sub(&self.roles_counter, &other.roles_counter);
        let mut remaining_other = counter_sub(&other.roles_counter, &self.roles_counter);

        let other_ids: Vec<RoleId> = remaining_other.keys().copied().collect();
        for other_id in other_ids {
            let providing_roles = &roles.get(other_id).providing_roles;
            let candidates: Vec<RoleId> = remaining
                .keys()
                .copied()
                .filter(|role_id| providing_roles.contains(role_id))
                .collect();
            if let [candidate] = candidates[..] {
                let reduction = remaining_other[&other_id].min(remaining[&candidate]);
                *remaining.get_mut(&candidate).unwrap() -= reduction;
                *remaining_other.get_mut(&other_id).unwrap() -= reduction;
            }
        }

        let spare = counter_elements(&remaining);
        let unmatched = counter_elements(&remaining_other);
        if spare.len() < unmatched.len() {
            return false;
        }
        if unmatched.is_empty() {
            return true;
        }
        spare
            .iter()
            .permutations(unmatched.len())
            .any(|ordering| {
                ordering
                    .iter()
                    .zip(&unmatched)
                    .all(|(&&role_id, &other_id)| {
                        roles.get(other_id).providing_roles.contains(&role_id)
                    })
            })
    }
}

impl fmt::Display for SimpleComposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {}",
            self.group1.iter().join(" "),
            self.group2.iter().join(" ")
        )
    }
}

fn copies_needed(needed: f64, provides: f64) -> usize {
    if provides <= 0.0 {
        0
    } else {
        (needed / provides).ceil().max(0.0) as usize
    }
}

fn copies_below_ceiling(allowed: Option<f64>, provides: f64, max_group_size: usize) -> usize {
    match allowed {
        Some(allowed) if provides > 0.0 => (allowed / provides).floor().max(0.0) as usize,
        _ => max_group_size,
    }
}

/// Extends `base` until `buff` is satisfied in both sub-groups, pushing
/// every satisfying extension. Recursion only ever moves forward through
/// the role slices: revisiting earlier roles would just rebuild
/// reorderings of the same multisets.
fn extend_for_buff(
    base: &SimpleComposition,
    roles_group1: &[RoleId],
    roles_group2: &[RoleId],
    buff: &Buff,
    roles: &RoleSet,
    config: &Configuration,
    out: &mut Vec<SimpleComposition>,
) {
    let [uptime1, uptime2] = base.uptime(buff, roles);
    let needed1 = config.target_uptime - uptime1;
    let needed2 = config.target_uptime - uptime2;
    if needed1 < config.uptime_comparison_tolerance
        && needed2 < config.uptime_comparison_tolerance
    {
        out.push(base.clone());
        return;
    }
    let allowed1 = config.overstack_uptime.map(|ceiling| ceiling - uptime1);
    let allowed2 = config.overstack_uptime.map(|ceiling| ceiling - uptime2);

    for (index, &role_id) in roles_group1.iter().enumerate() {
        let role = roles.get(role_id);
        let provides_group = role.uptime(buff, BoonTarget::Party);
        let provides_off_group = role.uptime(buff, BoonTarget::Squad);
        let max_usable = copies_needed(needed1, provides_group)
            .max(copies_needed(needed2, provides_off_group));
        // the ceiling bound misses overstack on other buffs; the
        // simplification pass re-checks every composition
        let max_allowed = (config.max_group_size - base.group1.len())
            .min(copies_below_ceiling(allowed1, provides_group, config.max_group_size))
            .min(copies_below_ceiling(allowed2, provides_off_group, config.max_group_size));
        for num_used in 1..=max_allowed.min(max_usable) {
            let mut group1 = base.group1.clone();
            group1.extend(iter::repeat(role_id).take(num_used));
            let comp = SimpleComposition::new(group1, base.group2.clone());
            extend_for_buff(
                &comp,
                &roles_group1[index + 1..],
                roles_group2,
                buff,
                roles,
                config,
                out,
            );
        }
    }

    // identical groups: extending group 2 would only mirror the group-1
    // branches
    if base.group1_counter == base.group2_counter {
        return;
    }

    for (index, &role_id) in roles_group2.iter().enumerate() {
        let role = roles.get(role_id);
        let provides_group = role.uptime(buff, BoonTarget::Party);
        let provides_off_group = role.uptime(buff, BoonTarget::Squad);
        let max_usable = copies_needed(needed2, provides_group)
            .max(copies_needed(needed1, provides_off_group));
        let max_allowed = (config.max_group_size - base.group2.len())
            .min(copies_below_ceiling(allowed2, provides_group, config.max_group_size))
            .min(copies_below_ceiling(allowed1, provides_off_group, config.max_group_size));
        for num_used in 1..=max_allowed.min(max_usable) {
            let mut group2 = base.group2.clone();
            group2.extend(iter::repeat(role_id).take(num_used));
            let comp = SimpleComposition::new(base.group1.clone(), group2);
            extend_for_buff(
                &comp,
                roles_group1,
                &roles_group2[index + 1..],
                buff,
                roles,
                config,
                out,
            );
        }
    }
}

fn generate_raw(roles: &RoleSet, config: &Configuration) -> Vec<SimpleComposition> {
    let roles_by_buff: BTreeMap<&Buff, Vec<RoleId>> = config
        .target_buffs
        .iter()
        .map(|buff| {
            let providers = roles
                .iter()
                .filter(|role| role.provides_buff(buff))
                .map(|role| role.id)
                .collect();
            (buff, providers)
        })
        .collect();

    // buffs with the fewest providers are the most constrained; handling
    // them first keeps the partial-composition set small
    let mut ordered_buffs: Vec<&Buff> = config.target_buffs.iter().collect();
    ordered_buffs.sort_by_key(|buff| roles_by_buff[buff].len());

    let mut bases = vec![SimpleComposition::empty()];
    for buff in ordered_buffs {
        let providers = &roles_by_buff[buff];
        tracing::debug!(
            "extending {} partial compositions for {buff} ({} providers)",
            bases.len(),
            providers.len()
        );
        let mut extended = Vec::new();
        for base in &bases {
            extend_for_buff(base, providers, providers, buff, roles, config, &mut extended);
        }
        bases = extended;
    }
    bases
}

/// Every non-redundant way to cover the configured buffs with the given
/// roles. An uncoverable buff yields an empty list, not an error.
pub fn generate_compositions(roles: &RoleSet, config: &Configuration) -> Vec<Composition> {
    let raw = generate_raw(roles, config);
    tracing::debug!("generated {} raw compositions", raw.len());
    simplify_compositions(raw, roles, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::build::{BoonUptime, BoonUptimeVariant, BuildBoons};

    fn build(entries: &[(&str, BoonTarget, Option<f64>)]) -> BuildBoons {
        BuildBoons {
            variants: vec![BoonUptimeVariant {
                boon_uptimes: entries
                    .iter()
                    .map(|(boon, target, percent)| BoonUptime {
                        boon: boon.to_string(),
                        target: *target,
                        uptime_percent: *percent,
                    })
                    .collect(),
            }],
        }
    }

    fn catalog(builds: Vec<(&str, BuildBoons)>) -> BTreeMap<String, BuildBoons> {
        builds
            .into_iter()
            .map(|(name, boons)| (name.to_string(), boons))
            .collect()
    }

    fn config(
        buffs: &[&str],
        target_uptime: f64,
        overstack_uptime: Option<f64>,
    ) -> Configuration {
        Configuration::new(
            buffs.iter().map(|buff| buff.to_string()).collect(),
            target_uptime,
            overstack_uptime,
        )
        .unwrap()
    }

    fn assert_sound(comps: &[Composition], roles: &RoleSet, config: &Configuration) {
        for comp in comps {
            for simple in &comp.compositions {
                for buff in &config.target_buffs {
                    for uptime in simple.uptime(buff, roles) {
                        assert!(
                            uptime >= config.target_uptime - config.uptime_comparison_tolerance,
                            "{buff} at {uptime} in {simple}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn single_squad_provider_covers_both_groups_once() {
        let builds = catalog(vec![(
            "boon-dps",
            build(&[("might", BoonTarget::Squad, Some(100.0))]),
        )]);
        let config = config(&["might"], 0.5, None);
        let roles = RoleSet::from_builds(&builds, &config);
        let comps = generate_compositions(&roles, &config);
        assert_eq!(comps.len(), 1);
        assert_eq!(comps[0].roles(), vec![0]);
        assert_sound(&comps, &roles, &config);
    }

    #[test]
    fn unprovidable_buff_means_no_compositions() {
        let config = config(&["quickness"], 0.5, None);
        let roles = RoleSet::from_builds(&BTreeMap::new(), &config);
        assert!(generate_compositions(&roles, &config).is_empty());
    }

    #[test]
    fn party_buffs_need_a_provider_in_each_group() {
        let builds = catalog(vec![
            ("alac", build(&[("alacrity", BoonTarget::Party, Some(100.0))])),
            ("quick", build(&[("quickness", BoonTarget::Party, Some(100.0))])),
        ]);
        let config = config(&["alacrity", "quickness"], 0.5, None);
        let roles = RoleSet::from_builds(&builds, &config);
        let comps = generate_compositions(&roles, &config);
        assert_eq!(comps.len(), 1);
        let simple = &comps[0].compositions[0];
        assert_eq!(simple.len(), 4);
        assert_eq!(simple.group1_counter, simple.group2_counter);
        assert_eq!(simple.group1_counter.values().sum::<usize>(), 2);
        assert_sound(&comps, &roles, &config);
    }

    #[test]
    fn merged_role_from_clamping_carries_every_build_name() {
        let builds = catalog(vec![
            ("half", build(&[("alacrity", BoonTarget::Party, Some(50.0))])),
            ("full", build(&[("alacrity", BoonTarget::Party, Some(100.0))])),
        ]);
        let config = config(&["alacrity"], 0.5, None);
        let roles = RoleSet::from_builds(&builds, &config);
        let comps = generate_compositions(&roles, &config);
        assert_eq!(comps.len(), 1);
        for &role_id in &comps[0].roles() {
            assert!(roles.get(role_id).build_names.contains("full"));
        }
        assert_sound(&comps, &roles, &config);
    }

    #[test]
    fn overstacked_compositions_are_excluded() {
        let builds = catalog(vec![(
            "might-bot",
            build(&[("might", BoonTarget::Party, Some(45.0))]),
        )]);
        // two copies per group reach 90%, at the ceiling
        let capped = config(&["might"], 0.8, Some(0.9));
        let roles = RoleSet::from_builds(&builds, &capped);
        assert!(generate_compositions(&roles, &capped).is_empty());

        let uncapped = config(&["might"], 0.8, None);
        let roles = RoleSet::from_builds(&builds, &uncapped);
        let comps = generate_compositions(&roles, &uncapped);
        assert_eq!(comps.len(), 1);
        assert_sound(&comps, &roles, &uncapped);
    }

    #[test]
    fn same_roles_split_differently_group_into_one_composition() {
        let builds = catalog(vec![
            ("alpha", build(&[("might", BoonTarget::Squad, Some(50.0))])),
            ("beta", build(&[("fury", BoonTarget::Squad, Some(50.0))])),
        ]);
        let config = config(&["might", "fury"], 0.5, None);
        let roles = RoleSet::from_builds(&builds, &config);
        let comps = generate_compositions(&roles, &config);
        // one role multiset, reachable as {alpha beta | } and {alpha | beta}
        assert_eq!(comps.len(), 1);
        assert_eq!(comps[0].compositions.len(), 2);
        assert_sound(&comps, &roles, &config);
    }

    #[test]
    fn dominated_same_size_compositions_are_evicted() {
        let builds = catalog(vec![
            ("lesser", build(&[("might", BoonTarget::Squad, Some(25.0))])),
            ("greater", build(&[("might", BoonTarget::Squad, Some(30.0))])),
        ]);
        let config = config(&["might"], 0.5, None);
        let roles = RoleSet::from_builds(&builds, &config);
        let greater_id = roles
            .iter()
            .find(|role| role.build_names.contains("greater"))
            .unwrap()
            .id;
        let comps = generate_compositions(&roles, &config);
        assert_eq!(comps.len(), 1);
        assert!(comps[0].roles().iter().all(|&role_id| role_id == greater_id));
        assert_sound(&comps, &roles, &config);
    }

    #[test]
    fn partial_provider_branches_never_evict_the_minimal_composition() {
        // "dabbler" needs four copies to cover might on its own;
        // "mainstay" covers it alone. Search branches that pad a mainstay
        // composition with dabblers must not displace the one-role result.
        let builds = catalog(vec![
            ("dabbler", build(&[("might", BoonTarget::Squad, Some(25.0))])),
            ("mainstay", build(&[("might", BoonTarget::Squad, Some(100.0))])),
        ]);
        let config = config(&["might"], 0.5, None);
        let roles = RoleSet::from_builds(&builds, &config);
        let mainstay_id = roles
            .iter()
            .find(|role| role.build_names.contains("mainstay"))
            .unwrap()
            .id;
        let comps = generate_compositions(&roles, &config);
        assert!(comps.iter().any(|comp| comp.roles() == vec![mainstay_id]));
        // dabbler-only compositions are incomparable and also survive,
        // but no surviving composition mixes the mainstay with filler
        assert_eq!(comps.len(), 2);
        for comp in &comps {
            let comp_roles = comp.roles();
            assert!(comp_roles.len() == 1 || !comp_roles.contains(&mainstay_id));
        }
        assert_sound(&comps, &roles, &config);
    }

    #[test]
    fn generation_is_deterministic() {
        let builds = catalog(vec![
            (
                "renegade",
                build(&[
                    ("alacrity", BoonTarget::Party, Some(100.0)),
                    ("might", BoonTarget::Squad, Some(25.0)),
                ]),
            ),
            ("druid", build(&[("might", BoonTarget::Squad, Some(50.0))])),
        ]);
        let config = config(&["alacrity", "might"], 0.6, None);
        let roles = RoleSet::from_builds(&builds, &config);
        let first = generate_compositions(&roles, &config);
        let second = generate_compositions(&roles, &config);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_sound(&first, &roles, &config);
        // survivors are pairwise incomparable
        for (comp1, comp2) in first.iter().tuple_combinations() {
            let simple1 = &comp1.compositions[0];
            let simple2 = &comp2.compositions[0];
            assert!(!simple1.provides(simple2, &roles) || !simple2.provides(simple1, &roles));
        }
    }

    #[test]
    fn empty_composition_uptime_is_zero() {
        let config = config(&["might"], 0.5, None);
        let roles = RoleSet::from_builds(&BTreeMap::new(), &config);
        let empty = SimpleComposition::empty();
        assert_eq!(empty.uptime(&"might".to_string(), &roles), [0.0, 0.0]);
        assert!(!empty.overstack(&roles, &config));
    }
}
