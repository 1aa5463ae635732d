// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configured robots and their network addresses.

use std::collections::BTreeMap;
use std::fmt;

/// A robot listed in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownRobot {
    /// Identifier exactly as configured.
    pub id: String,
    /// Local network address; empty for cloud-only robots.
    pub address: String,
}

/// The configured robot list, keyed case-insensitively by identifier.
///
/// Topics carry lower-cased identifiers while the vendor expects them as
/// issued, so lookups ignore ASCII case and each entry keeps the original
/// spelling. Iteration is ordered by identifier.
///
/// # Examples
///
/// ```
/// use litterbridge::model::KnownRobots;
///
/// let robots = KnownRobots::parse("A63afb501d65cb:192.168.1.20,b7:");
/// assert_eq!(robots.len(), 2);
/// assert_eq!(robots.address("a63afb501d65cb"), Some("192.168.1.20"));
/// assert_eq!(robots.address("B7"), Some(""));
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct KnownRobots {
    robots: BTreeMap<String, KnownRobot>,
}

impl KnownRobots {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a `id:address,id:address` list.
    ///
    /// Entries that do not split into exactly one identifier and one address
    /// are skipped with a warning. Later duplicates replace earlier ones.
    #[must_use]
    pub fn parse(encoded: &str) -> Self {
        let mut robots = Self::new();

        for entry in encoded.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let mut parts = entry.split(':');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(id), Some(address), None) if !id.trim().is_empty() => {
                    robots.insert(id.trim(), address.trim());
                }
                _ => {
                    tracing::warn!(entry = %entry, "Skipping malformed known robot entry");
                }
            }
        }

        robots
    }

    /// Adds or replaces a robot.
    pub fn insert(&mut self, id: impl Into<String>, address: impl Into<String>) {
        let id = id.into();
        self.robots.insert(
            id.to_ascii_lowercase(),
            KnownRobot {
                id,
                address: address.into(),
            },
        );
    }

    /// Looks up a robot, ignoring ASCII case.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&KnownRobot> {
        self.robots.get(&id.to_ascii_lowercase())
    }

    /// Returns the configured address of a robot.
    #[must_use]
    pub fn address(&self, id: &str) -> Option<&str> {
        self.get(id).map(|robot| robot.address.as_str())
    }

    /// Returns true if the robot is configured.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Iterates over the configured robots.
    pub fn iter(&self) -> impl Iterator<Item = &KnownRobot> {
        self.robots.values()
    }

    /// Returns the number of configured robots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.robots.len()
    }

    /// Returns true if no robots are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.robots.is_empty()
    }
}

impl fmt::Debug for KnownRobots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|robot| (&robot.id, &robot.address)))
            .finish()
    }
}

impl<I, A> FromIterator<(I, A)> for KnownRobots
where
    I: Into<String>,
    A: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (I, A)>>(iter: T) -> Self {
        let mut robots = Self::new();
        for (id, address) in iter {
            robots.insert(id, address);
        }
        robots
    }
}
