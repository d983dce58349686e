pub mod buff {
    use std::fmt;

    use super::config::Configuration;

    pub type Buff = String;

    /// Who a buff reaches: the provider's own five-player group, or the
    /// whole ten-player squad.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub enum BoonTarget {
        Party,
        Squad,
    }

    impl BoonTarget {
        pub const ALL: [BoonTarget; 2] = [BoonTarget::Party, BoonTarget::Squad];

        pub fn member_count(self) -> usize {
            match self {
                BoonTarget::Party => 5,
                BoonTarget::Squad => 10,
            }
        }

        pub fn name(self) -> &'static str {
            match self {
                BoonTarget::Party => "party",
                BoonTarget::Squad => "squad",
            }
        }
    }

    /// A single buff a build sustains, with its uptime clamped to the
    /// configured target: a build that overshoots the goal is recorded as
    /// exactly meeting it.
    #[derive(Debug, Clone, PartialEq)]
    pub struct BuffUptime {
        pub buff: Buff,
        pub target: BoonTarget,
        pub uptime: f64,
        raw: Option<f64>,
    }

    impl BuffUptime {
        pub fn new(
            config: &Configuration,
            buff: Buff,
            target: BoonTarget,
            uptime: Option<f64>,
        ) -> BuffUptime {
            BuffUptime {
                buff,
                target,
                uptime: config.target_uptime.min(uptime.unwrap_or(config.target_uptime)),
                raw: uptime,
            }
        }

        pub fn from_boon_uptime(
            boon_uptime: &super::build::BoonUptime,
            config: &Configuration,
        ) -> BuffUptime {
            BuffUptime::new(
                config,
                boon_uptime.boon.clone(),
                boon_uptime.target,
                boon_uptime.uptime_percent.map(|percent| percent / 100.0),
            )
        }

        /// The uptime this entry contributes to `target`: party-scoped
        /// uptime never reaches the other group, squad-scoped uptime
        /// reaches both.
        pub fn uptime_for(&self, target: BoonTarget) -> f64 {
            match self.target {
                BoonTarget::Squad => self.uptime,
                BoonTarget::Party => {
                    if target == BoonTarget::Party {
                        self.uptime
                    } else {
                        0.0
                    }
                }
            }
        }
    }

    impl fmt::Display for BuffUptime {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            if self.raw.is_some() {
                write!(f, "{:.0}% ", self.uptime * 100.0)?;
            }
            write!(f, "{} {}", self.target.name(), self.buff)
        }
    }
}

pub mod build {
    use super::buff::{BoonTarget, Buff};

    /// One buff entry in a boon-uptime variant, as authored in a build's
    /// notes. A missing percentage means the build is assumed to sustain
    /// whatever uptime the run is aiming for.
    #[derive(Debug, Clone, PartialEq)]
    pub struct BoonUptime {
        pub boon: Buff,
        pub target: BoonTarget,
        pub uptime_percent: Option<f64>,
    }

    /// One self-consistent set of buffs a build can sustain at once.
    /// A build with several variants can be played in several ways, each
    /// becoming its own candidate when forming roles.
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct BoonUptimeVariant {
        pub boon_uptimes: Vec<BoonUptime>,
    }

    /// The slice of a build record the composition search consumes.
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct BuildBoons {
        pub variants: Vec<BoonUptimeVariant>,
    }
}

pub mod config {
    use std::collections::BTreeSet;

    use thiserror::Error;

    use super::buff::Buff;

    /// Sub-group size is fixed by the game: two groups of five.
    pub const MAX_GROUP_SIZE: usize = 5;

    pub const DEFAULT_TOLERANCE: f64 = 0.01;

    #[derive(Debug, Clone, Error, PartialEq)]
    pub enum ConfigError {
        #[error("no target buffs specified")]
        NoTargetBuffs,
        #[error("target uptime must be within [0, 1]")]
        TargetUptimeOutOfRange,
        #[error("overstack uptime must be within (0, 1]")]
        OverstackUptimeOutOfRange,
        #[error("uptime comparison tolerance must not be negative")]
        NegativeTolerance,
    }

    /// What the squad is trying to achieve: which buffs, at what uptime,
    /// and optionally a ceiling above which coverage counts as wasted.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Configuration {
        pub target_buffs: BTreeSet<Buff>,
        pub target_uptime: f64,
        pub overstack_uptime: Option<f64>,
        pub uptime_comparison_tolerance: f64,
        pub max_group_size: usize,
    }

    impl Configuration {
        pub fn new(
            target_buffs: BTreeSet<Buff>,
            target_uptime: f64,
            overstack_uptime: Option<f64>,
        ) -> Result<Configuration, ConfigError> {
            Configuration::with_tolerance(
                target_buffs,
                target_uptime,
                overstack_uptime,
                DEFAULT_TOLERANCE,
            )
        }

        pub fn with_tolerance(
            target_buffs: BTreeSet<Buff>,
            target_uptime: f64,
            overstack_uptime: Option<f64>,
            uptime_comparison_tolerance: f64,
        ) -> Result<Configuration, ConfigError> {
            if target_buffs.is_empty() {
                return Err(ConfigError::NoTargetBuffs);
            }
            if !(0.0..=1.0).contains(&target_uptime) {
                return Err(ConfigError::TargetUptimeOutOfRange);
            }
            if let Some(overstack) = overstack_uptime {
                if !(overstack > 0.0 && overstack <= 1.0) {
                    return Err(ConfigError::OverstackUptimeOutOfRange);
                }
            }
            if uptime_comparison_tolerance < 0.0 {
                return Err(ConfigError::NegativeTolerance);
            }
            Ok(Configuration {
                target_buffs,
                target_uptime,
                overstack_uptime,
                uptime_comparison_tolerance,
                max_group_size: MAX_GROUP_SIZE,
            })
        }
    }
}
