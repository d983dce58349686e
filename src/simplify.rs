use std::fmt;

use itertools::Itertools;

use crate::compose::SimpleComposition;
use crate::model::config::Configuration;
use crate::role::{RoleId, RoleSet};

/// The externally visible unit: one surviving role multiset, holding
/// every structurally distinct sub-group split the search found for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub compositions: Vec<SimpleComposition>,
}

impl Composition {
    pub fn roles(&self) -> Vec<RoleId> {
        self.compositions[0].roles()
    }
}

impl fmt::Display for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.compositions
                .iter()
                .map(|comp| format!("[{comp}]"))
                .join(" ")
        )
    }
}

/// Reduces the raw search output to the list worth showing: one grouping
/// per role multiset, overstacked groupings dropped, groupings whose
/// roles a surviving grouping can substitute for dropped, and mirrored
/// splits collapsed.
pub(crate) fn simplify_compositions(
    comps: Vec<SimpleComposition>,
    roles: &RoleSet,
    config: &Configuration,
) -> Vec<Composition> {
    let raw_count = comps.len();

    let mut groupings: Vec<Vec<SimpleComposition>> = Vec::new();
    'grouping: for comp in comps {
        for grouping in &mut groupings {
            if grouping[0].same_roles(&comp) {
                grouping.push(comp);
                continue 'grouping;
            }
        }
        groupings.push(vec![comp]);
    }

    // smaller compositions first: they are the cheapest survivors and the
    // fastest to compare against
    groupings.sort_by_key(|grouping| grouping[0].len());

    let mut survivors: Vec<Vec<SimpleComposition>> = Vec::new();
    'candidates: for grouping in groupings {
        if grouping[0].overstack(roles, config) {
            continue;
        }
        let mut index = 0;
        while index < survivors.len() {
            if grouping[0].provides(&survivors[index][0], roles) {
                // candidates arrive in ascending size, so a providing
                // candidate is either a same-size grouping with roles
                // that can stand in for the survivor's (the survivor is
                // redundant) or a strictly larger grouping that gains
                // nothing over the smaller one (the candidate is)
                if grouping[0].len() > survivors[index][0].len() {
                    continue 'candidates;
                }
                survivors.remove(index);
            } else if survivors[index][0].provides(&grouping[0], roles) {
                continue 'candidates;
            } else {
                index += 1;
            }
        }
        survivors.push(grouping);
    }

    let simplified: Vec<Composition> = survivors
        .into_iter()
        .map(|grouping| {
            let mut distinct: Vec<SimpleComposition> = Vec::new();
            for comp in grouping {
                let seen = distinct.iter().any(|existing| {
                    let same = comp.group1_counter == existing.group1_counter
                        && comp.group2_counter == existing.group2_counter;
                    let mirrored = comp.group1_counter == existing.group2_counter
                        && comp.group2_counter == existing.group1_counter;
                    same || mirrored
                });
                if !seen {
                    distinct.push(comp);
                }
            }
            Composition {
                compositions: distinct,
            }
        })
        .collect();

    tracing::debug!(
        "simplified {} raw compositions down to {}",
        raw_count,
        simplified.len()
    );
    simplified
}
