/*++

Licensed under the Apache-2.0 license.

File Name:

    msl.rs

Abstract:

    File contains the Minimum Ship Level policy.

--*/

use crate::*;
use core::cmp::Ordering;
use regex::Regex;

/// Version written on reset when the candidate does not match the pattern
pub const MSL_RESET_BASELINE: &str = "fw1020.00-00";

/// Version written by `set` when the running version does not match the pattern
pub const MSL_SET_BASELINE: &str = "fw1030.00-00";

/// Pattern for `fwXXYY.ZZ-RR` versions. Groups 2, 3 and 4 are major, minor and rev.
pub const DEFAULT_MSL_PATTERN: &str = r"([a-z]+[0-9]{2})+([0-9]+)\.([0-9]+)-([0-9]+)";

/// Prefix of the canonical rendering for `DEFAULT_MSL_PATTERN`
pub const MSL_VERSION_PREFIX: &str = "fw10";

pub const BMC_VERSION_PURPOSE: &str = "xyz.openbmc_project.Software.Version.VersionPurpose.BMC";

/// Inventory keyword width; shorter values are padded with spaces
const MSL_KEYWORD_LEN: usize = 32;

/// Comparable version, ordered by major, then minor, then rev
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VersionTriple {
    pub major: u32,
    pub minor: u32,
    pub rev: u32,
}

impl VersionTriple {
    /// Result of parsing a version that does not match; as a minimum it sets no floor
    pub const ZERO: Self = Self::new(0, 0, 0);

    pub const fn new(major: u32, minor: u32, rev: u32) -> Self {
        Self { major, minor, rev }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Render as `<prefix><major>.<minor>-<rev>` with two-digit minor and rev
    pub fn render(&self, prefix: &str) -> String {
        format!("{prefix}{}.{:02}-{:02}", self.major, self.minor, self.rev)
    }

    /// Three-way compare: `Less` when `self` is older than `other`
    pub fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

/// Administrator-configured version pattern with (at least) four capture groups
#[derive(Debug, Clone)]
pub struct VersionPattern {
    regex: Regex,
}

impl VersionPattern {
    pub fn new(pattern: &str) -> LidResult<Self> {
        let regex = Regex::new(pattern).map_err(|e| LidError::InvalidPattern {
            pattern: pattern.into(),
            reason: e.to_string(),
        })?;
        // Group 0 is implicit
        if regex.captures_len() < 5 {
            return Err(LidError::InvalidPattern {
                pattern: pattern.into(),
                reason: format!("{} capture groups, 4 required", regex.captures_len() - 1),
            });
        }
        Ok(Self { regex })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Whole match of the pattern in `version`
    pub fn matched<'a>(&self, version: &'a str) -> Option<&'a str> {
        self.regex.find(version).map(|m| m.as_str())
    }

    pub fn try_parse(&self, version: &str) -> LidResult<VersionTriple> {
        let unparseable = || LidError::UnparseableVersion {
            version: version.into(),
        };
        let caps = self.regex.captures(version).ok_or_else(unparseable)?;
        let field = |i: usize| -> LidResult<u32> {
            caps.get(i)
                .and_then(|m| m.as_str().parse().ok())
                .ok_or_else(unparseable)
        };
        Ok(VersionTriple::new(field(2)?, field(3)?, field(4)?))
    }

    /// Parse `version`, yielding `VersionTriple::ZERO` when it does not match
    pub fn parse(&self, version: &str) -> VersionTriple {
        self.try_parse(version).unwrap_or_else(|err| {
            log::error!("Unable to parse version: {err}");
            VersionTriple::ZERO
        })
    }
}

/// Minimum ship level settings
#[derive(Debug, Clone, Default)]
pub struct MslPolicy {
    /// No pattern disables the check
    pub pattern: Option<VersionPattern>,

    /// Minimum taking precedence over the stored copies
    pub minimum: Option<String>,
}

impl MslPolicy {
    /// An empty `pattern` disables the check
    pub fn new(pattern: &str, minimum: Option<String>) -> LidResult<Self> {
        let pattern = if pattern.is_empty() {
            None
        } else {
            Some(VersionPattern::new(pattern)?)
        };
        Ok(Self {
            pattern,
            minimum: minimum.filter(|m| !m.is_empty()),
        })
    }
}

/// Minimum Ship Level policy over an environment
pub struct MinimumShipLevel<'a, Env: LidVerificationEnv> {
    env: &'a Env,
    policy: &'a MslPolicy,
}

impl<'a, Env: LidVerificationEnv> MinimumShipLevel<'a, Env> {
    pub fn new(env: &'a Env, policy: &'a MslPolicy) -> Self {
        Self { env, policy }
    }

    /// Current minimum: configured override, then inventory, then the flash copy
    pub fn minimum(&self) -> String {
        if let Some(minimum) = &self.policy.minimum {
            return minimum.clone();
        }
        match read_value(self.env.inventory(), &MSL_KEY) {
            Some(value) if !is_uninitialized(&value) => value,
            _ => read_value(self.env.flash(), &MSL_KEY).unwrap_or_default(),
        }
    }

    /// Whether a minimum is set and a pattern is configured
    pub fn enabled(&self) -> bool {
        self.policy.pattern.is_some() && !is_uninitialized(&self.minimum())
    }

    /// Accept `candidate` unless it is older than the minimum.
    ///
    /// A pending reset first replaces the minimum with `candidate`.
    pub fn verify(&self, candidate: &str) -> LidResult<()> {
        if self.env.reset_requested() {
            let reset = self
                .policy
                .pattern
                .as_ref()
                .and_then(|p| p.matched(candidate))
                .unwrap_or(MSL_RESET_BASELINE);
            log::info!("Resetting Minimum Ship Level to: {reset}");
            if let Err(err) = self.write_inventory(reset) {
                log::error!("Error writing Minimum Ship Level {reset}: {err}");
            }
        }

        let Some(pattern) = &self.policy.pattern else {
            return Ok(());
        };
        let minimum = self.minimum();
        if is_uninitialized(&minimum) {
            return Ok(());
        }

        let minimum_version = pattern.parse(&minimum);
        let actual_version = pattern.parse(candidate);
        if actual_version.compare(&minimum_version) == Ordering::Less {
            log::error!(
                "Minimum Ship Level ({minimum}) NOT met by {candidate} (purpose {BMC_VERSION_PURPOSE})"
            );
            return Err(LidError::BelowMinimumShipLevel {
                minimum,
                actual: candidate.into(),
                purpose: BMC_VERSION_PURPOSE.into(),
            });
        }

        log::debug!("Minimum Ship Level ({minimum}) met by {candidate}");
        Ok(())
    }

    /// Set the minimum to the running version
    pub fn set(&self) -> LidResult<()> {
        let version = self.env.running_version().unwrap_or_else(|err| {
            log::error!("Unable to read the running version: {err}");
            String::new()
        });
        let minimum = self
            .policy
            .pattern
            .as_ref()
            .and_then(|p| p.matched(&version))
            .unwrap_or(MSL_SET_BASELINE)
            .to_string();
        log::info!("Current version: {version}. Setting Minimum Ship Level to: {minimum}");
        self.write_inventory(&minimum).inspect_err(|err| {
            log::error!("Error writing Minimum Ship Level {minimum}: {err}");
        })
    }

    /// Let the next update reseed the minimum from its own version
    pub fn reset(&self) -> LidResult<()> {
        log::info!("Minimum Ship Level reset requested");
        self.env.request_reset()
    }

    /// Reconcile the inventory and flash copies of the minimum
    pub fn sync(&self) {
        sync_locations(&[
            SyncLocation {
                name: "inventory",
                store: self.env.inventory(),
                key: MSL_KEY,
                pad_to: Some(MSL_KEYWORD_LEN),
            },
            SyncLocation {
                name: "flash",
                store: self.env.flash(),
                key: MSL_KEY,
                pad_to: None,
            },
        ]);
    }

    fn write_inventory(&self, value: &str) -> LidResult<()> {
        let mut bytes = value.as_bytes().to_vec();
        if bytes.len() < MSL_KEYWORD_LEN {
            bytes.resize(MSL_KEYWORD_LEN, b' ');
        }
        self.env.inventory().write(&MSL_KEY, &bytes)
    }
}
