// backend/src/engine/skills.rs

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Where a skill on an agent came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillSource {
    Manual,
    Category,
    AutoDetected,
    Metadata,
}

/// Normalized (trimmed, lowercase) skill names with their provenance.
///
/// Built once when an agent is read, so eligibility and scoring never union
/// the individual skill lists themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillSet {
    entries: BTreeMap<String, BTreeSet<SkillSource>>,
}

pub fn normalize(skill: &str) -> String {
    skill.trim().to_lowercase()
}

/// Case-insensitive substring relation in either direction. Both sides must
/// already be normalized.
pub fn related(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}

impl SkillSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sources(
        manual: &[String],
        category: &[String],
        auto_detected: &[String],
        metadata: &serde_json::Value,
    ) -> Self {
        let mut set = SkillSet::new();
        for s in manual {
            set.insert(s, SkillSource::Manual);
        }
        for s in category {
            set.insert(s, SkillSource::Category);
        }
        for s in auto_detected {
            set.insert(s, SkillSource::AutoDetected);
        }
        let mut nested = Vec::new();
        collect_metadata_skills(metadata, &mut nested);
        for s in nested {
            set.insert(&s, SkillSource::Metadata);
        }
        set
    }

    pub fn insert(&mut self, skill: &str, source: SkillSource) {
        let key = normalize(skill);
        if key.is_empty() {
            return;
        }
        self.entries.entry(key).or_default().insert(source);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn sources_of(&self, skill: &str) -> Option<&BTreeSet<SkillSource>> {
        self.entries.get(&normalize(skill))
    }

    /// True when any of the agent's skills is related to `required`.
    pub fn satisfies(&self, required: &str) -> bool {
        let req = normalize(required);
        self.names().any(|s| related(s, &req))
    }

    /// "Any one of" semantics: one satisfied requirement is enough.
    pub fn satisfies_any(&self, required: &[String]) -> bool {
        required.iter().any(|r| self.satisfies(r))
    }
}

impl<S: AsRef<str>> FromIterator<S> for SkillSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = SkillSet::new();
        for s in iter {
            set.insert(s.as_ref(), SkillSource::Manual);
        }
        set
    }
}

// Any array of strings stored under a key containing "skills", at any depth.
fn collect_metadata_skills(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, v) in map {
                if key.to_lowercase().contains("skills") {
                    if let serde_json::Value::Array(items) = v {
                        out.extend(items.iter().filter_map(|i| i.as_str().map(str::to_string)));
                        continue;
                    }
                }
                collect_metadata_skills(v, out);
            }
        }
        serde_json::Value::Array(items) => {
            for v in items {
                collect_metadata_skills(v, out);
            }
        }
        _ => {}
    }
}
