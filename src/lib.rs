//! Squad composition search for ten-player content played as two
//! five-player groups.
//!
//! Given a catalog of builds annotated with the buff uptimes they can
//! sustain (party-wide or squad-wide), this crate finds every
//! non-redundant way to fill the squad so that a configured set of buffs
//! is covered in both groups:
//!
//! 1. [`RoleSet::from_builds`] collapses builds with equivalent uptimes
//!    into roles and precomputes which roles can stand in for which.
//! 2. [`generate_compositions`] searches per-group role multisets that
//!    meet every target, then discards duplicated, mirrored, overstacked
//!    and dominated results.
//!
//! The whole computation is a pure function of the catalog and the
//! [`Configuration`]; an impossible target produces an empty list.

pub mod compose;
pub mod model;
pub mod role;
pub mod simplify;

pub use compose::{generate_compositions, SimpleComposition};
pub use model::buff::{BoonTarget, Buff, BuffUptime};
pub use model::build::{BoonUptime, BoonUptimeVariant, BuildBoons};
pub use model::config::{ConfigError, Configuration, MAX_GROUP_SIZE};
pub use role::{Role, RoleId, RoleSet};
pub use simplify::Composition;
