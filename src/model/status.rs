// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Human-readable labels for unit status codes.

use std::collections::HashMap;

/// Labels for the unit status codes reported by Litter-Robot 3 units.
const STANDARD_LABELS: &[(&str, &str)] = &[
    ("RDY", "Ready"),
    ("Rdy", "Ready"),
    ("OFF", "Off"),
    ("P", "Paused"),
    ("BR", "Bonnet removed"),
    ("DFS", "Drawer is full; will no longer cycle"),
    ("DF1", "Drawer is full; will cycle twice more"),
    ("DF2", "Drawer is full; will cycle once more"),
    ("CST", "Cat sensor triggered"),
    ("CSI", "Cat interrupted"),
    ("CSF", "Cat sensor full"),
    ("CCP", "Cycle processing"),
    ("CCC", "Cycle complete"),
    ("EC", "Emptying container"),
    ("SDF", "Started, Drawer is full"),
];

/// Immutable code to label mapping.
///
/// Built once at startup and handed to the sink. Codes without an entry are
/// published as-is.
///
/// # Examples
///
/// ```
/// use litterbridge::model::StatusLabels;
///
/// let labels = StatusLabels::standard();
/// assert_eq!(labels.label("CCP"), Some("Cycle processing"));
/// assert_eq!(labels.display("XYZ"), "XYZ");
/// ```
#[derive(Debug, Clone)]
pub struct StatusLabels {
    labels: HashMap<&'static str, &'static str>,
}

impl StatusLabels {
    /// Returns the labels for every known Litter-Robot status code.
    #[must_use]
    pub fn standard() -> Self {
        Self::from_pairs(STANDARD_LABELS)
    }

    /// Builds a table from explicit `(code, label)` pairs.
    #[must_use]
    pub fn from_pairs(pairs: &[(&'static str, &'static str)]) -> Self {
        Self {
            labels: pairs.iter().copied().collect(),
        }
    }

    /// Returns the label for `code`, if it has one.
    #[must_use]
    pub fn label(&self, code: &str) -> Option<&'static str> {
        self.labels.get(code).copied()
    }

    /// Returns the label for `code`, or `code` itself when unknown.
    #[must_use]
    pub fn display<'a>(&self, code: &'a str) -> &'a str {
        self.label(code).unwrap_or(code)
    }

    /// Returns the number of known codes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns true if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Default for StatusLabels {
    fn default() -> Self {
        Self::standard()
    }
}
