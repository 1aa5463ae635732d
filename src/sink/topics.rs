// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topic layout.
//!
//! ```text
//! <prefix>/status                                    availability
//! <prefix>/<id>/<field>/state                        field state
//! <prefix>/<id>/<field>/command                      switch commands
//! <discovery prefix>/<component>/<name>/<id>_<field>/config
//! ```
//!
//! Identifiers are lower-cased in every topic.

use crate::model::Category;

const STATE_SUFFIX: &str = "state";
const COMMAND_SUFFIX: &str = "command";

/// Builds and parses the bridge's topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    topic_prefix: String,
    discovery_prefix: String,
    discovery_name: String,
}

impl Topics {
    /// Creates the layout for the given prefixes.
    #[must_use]
    pub fn new(
        topic_prefix: impl Into<String>,
        discovery_prefix: impl Into<String>,
        discovery_name: impl Into<String>,
    ) -> Self {
        Self {
            topic_prefix: topic_prefix.into(),
            discovery_prefix: discovery_prefix.into(),
            discovery_name: discovery_name.into(),
        }
    }

    /// Returns the topic prefix.
    #[must_use]
    pub fn topic_prefix(&self) -> &str {
        &self.topic_prefix
    }

    /// `<prefix>/status`
    #[must_use]
    pub fn availability(&self) -> String {
        format!("{}/status", self.topic_prefix)
    }

    /// `<prefix>/<id>/<field>/state`
    #[must_use]
    pub fn state(&self, id: &str, field: &str) -> String {
        self.field_topic(id, field, STATE_SUFFIX)
    }

    /// `<prefix>/<id>/<field>/command`
    #[must_use]
    pub fn command(&self, id: &str, field: &str) -> String {
        self.field_topic(id, field, COMMAND_SUFFIX)
    }

    /// `<name>.<id>.<field>`
    #[must_use]
    pub fn unique_id(&self, id: &str, field: &str) -> String {
        format!(
            "{}.{}.{field}",
            self.discovery_name,
            id.to_ascii_lowercase()
        )
    }

    /// `<name> <id> <field>`
    #[must_use]
    pub fn unique_name(&self, id: &str, field: &str) -> String {
        format!(
            "{} {} {field}",
            self.discovery_name,
            id.to_ascii_lowercase()
        )
    }

    /// `<name>.<id>`, the discovery device identifier.
    #[must_use]
    pub fn device_id(&self, id: &str) -> String {
        format!("{}.{}", self.discovery_name, id.to_ascii_lowercase())
    }

    /// `<name> <id>`, the discovery device name.
    #[must_use]
    pub fn device_name(&self, id: &str) -> String {
        format!("{} {}", self.discovery_name, id.to_ascii_lowercase())
    }

    /// `<discovery prefix>/<component>/<name>/<id>_<field>/config`
    #[must_use]
    pub fn config(&self, component: Category, id: &str, field: &str) -> String {
        format!(
            "{}/{component}/{}/{}_{field}/config",
            self.discovery_prefix,
            self.discovery_name,
            id.to_ascii_lowercase()
        )
    }

    /// Extracts the robot identifier from a topic under the prefix.
    ///
    /// The segment after the prefix may carry a `_`-separated suffix, which
    /// is dropped: `<prefix>/<id>_<suffix>/<field>/command` yields `<id>`.
    /// Returns `None` when there is no such segment or it is empty.
    #[must_use]
    pub fn parse_identifier(&self, topic: &str) -> Option<String> {
        let short = topic.replacen(&self.topic_prefix, "", 1);
        let segment = short.split('/').nth(1)?;
        let id = segment.split('_').next()?;

        (!id.is_empty()).then(|| id.to_string())
    }

    /// Returns the field name of a `.../<field>/command` topic.
    #[must_use]
    pub fn command_field<'a>(&self, topic: &'a str) -> Option<&'a str> {
        let rest = topic.strip_suffix(COMMAND_SUFFIX)?.strip_suffix('/')?;
        rest.rsplit('/').next().filter(|field| !field.is_empty())
    }

    fn field_topic(&self, id: &str, field: &str, suffix: &str) -> String {
        format!(
            "{}/{}/{field}/{suffix}",
            self.topic_prefix,
            id.to_ascii_lowercase()
        )
    }
}

impl Default for Topics {
    fn default() -> Self {
        Self::new("home/litterrobot", "homeassistant", "litterrobot")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics() -> Topics {
        Topics::new(
            "home/litterrobotTopicPrefix",
            "homeassistant",
            "litterrobotDiscoveryName",
        )
    }

    #[test]
    fn field_topics_lowercase_the_id() {
        let topics = topics();
        assert_eq!(
            topics.state("A63afb501d65cb", "unitstatus"),
            "home/litterrobotTopicPrefix/a63afb501d65cb/unitstatus/state"
        );
        assert_eq!(
            topics.command("A63afb501d65cb", "power"),
            "home/litterrobotTopicPrefix/a63afb501d65cb/power/command"
        );
        assert_eq!(topics.availability(), "home/litterrobotTopicPrefix/status");
    }

    #[test]
    fn discovery_names() {
        let topics = topics();
        assert_eq!(
            topics.unique_id("A63afb501d65cb", "unitstatus"),
            "litterrobotDiscoveryName.a63afb501d65cb.unitstatus"
        );
        assert_eq!(
            topics.unique_name("A63afb501d65cb", "unitstatus"),
            "litterrobotDiscoveryName a63afb501d65cb unitstatus"
        );
        assert_eq!(
            topics.config(Category::BinarySensor, "A63afb501d65cb", "dfitriggered"),
            "homeassistant/binary_sensor/litterrobotDiscoveryName/a63afb501d65cb_dfitriggered/config"
        );
    }

    #[test]
    fn parse_identifier_with_suffixes() {
        let topics = topics();
        let prefix = topics.topic_prefix().to_string();

        for suffix in ["", "_x", "_kitchen", "_a_b_c", "_123"] {
            for field in ["power", "cycle", "nightlightactive", "panellockactive"] {
                let topic = format!("{prefix}/a63afb501d65cb{suffix}/{field}/command");
                assert_eq!(
                    topics.parse_identifier(&topic).as_deref(),
                    Some("a63afb501d65cb"),
                    "{topic}"
                );
            }
        }
    }

    #[test]
    fn parse_identifier_without_segment() {
        let topics = topics();
        assert_eq!(topics.parse_identifier("home/litterrobotTopicPrefix"), None);
        assert_eq!(topics.parse_identifier("home/litterrobotTopicPrefix/"), None);
        assert_eq!(
            topics.parse_identifier("home/litterrobotTopicPrefix/_suffix/power/command"),
            None
        );
    }

    #[test]
    fn command_field() {
        let topics = topics();
        assert_eq!(
            topics.command_field("home/litterrobotTopicPrefix/abc/power/command"),
            Some("power")
        );
        assert_eq!(
            topics.command_field("home/litterrobotTopicPrefix/abc/power/state"),
            None
        );
        assert_eq!(topics.command_field("command"), None);
    }
}
