//! Requirement derivation for tasks.
//!
//! A task type that matches a rule maps directly to its requirement
//! profile. Anything else is inferred from the words found in the payload:
//! every string value and every object key is tokenized, and each keyword
//! group that matches contributes one capability tag. Inference only looks
//! at the set of words, so key order and repetition never change the result.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Duration;
use switchyard_core::time::duration_ms;
use switchyard_core::{Capability, CapabilitySet, Complexity, RequirementProfile, Task};

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z0-9]+").expect("word pattern is valid"));

/// Payload text longer than this counts as medium complexity on its own
const LONG_TEXT_CHARS: usize = 1000;

const FALLBACK_CAPABILITY: &str = "code-generation";

struct KeywordGroup {
    capability: &'static str,
    channel: Option<&'static str>,
    words: &'static [&'static str],
}

const KEYWORD_GROUPS: &[KeywordGroup] = &[
    KeywordGroup {
        capability: "testing",
        channel: Some("filesystem"),
        words: &[
            "test", "tests", "testing", "unit", "integration", "e2e", "coverage", "jest", "pytest",
            "assert", "qa",
        ],
    },
    KeywordGroup {
        capability: "api-development",
        channel: None,
        words: &[
            "api", "apis", "endpoint", "endpoints", "rest", "graphql", "route", "routes", "http",
            "grpc", "webhook",
        ],
    },
    KeywordGroup {
        capability: "ui-development",
        channel: None,
        words: &[
            "ui", "frontend", "component", "components", "css", "layout", "react", "vue", "page",
            "button", "form",
        ],
    },
    KeywordGroup {
        capability: "database",
        channel: None,
        words: &[
            "database", "db", "sql", "schema", "migration", "migrations", "query", "table",
            "postgres", "index",
        ],
    },
    KeywordGroup {
        capability: "deployment",
        channel: Some("cloud"),
        words: &[
            "deploy", "deployment", "docker", "kubernetes", "k8s", "release", "pipeline", "ci",
            "infrastructure", "helm",
        ],
    },
    KeywordGroup {
        capability: "documentation",
        channel: Some("filesystem"),
        words: &["docs", "documentation", "readme", "guide", "tutorial", "changelog"],
    },
    KeywordGroup {
        capability: "security",
        channel: None,
        words: &[
            "security", "auth", "authentication", "authorization", "vulnerability", "encryption",
            "secrets", "xss", "csrf",
        ],
    },
];

fn inferred_duration(complexity: Complexity) -> Duration {
    match complexity {
        Complexity::Low => Duration::from_secs(300),
        Complexity::Medium => Duration::from_secs(600),
        Complexity::High => Duration::from_secs(1200),
    }
}

fn push_words(text: &str, words: &mut BTreeSet<String>) {
    let lower = text.to_ascii_lowercase();
    words.extend(WORD.find_iter(&lower).map(|m| m.as_str().to_string()));
}

/// Collect lowercase words and the total text length from a JSON value
fn collect_words(value: &Value, words: &mut BTreeSet<String>, text_len: &mut usize) {
    match value {
        Value::String(s) => {
            *text_len += s.len();
            push_words(s, words);
        }
        Value::Array(items) => {
            for item in items {
                collect_words(item, words, text_len);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                *text_len += key.len();
                push_words(key, words);
                collect_words(item, words, text_len);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// Infer a requirement profile from payload keywords
#[must_use]
pub fn infer_from_payload(payload: &Value) -> RequirementProfile {
    let mut words = BTreeSet::new();
    let mut text_len = 0;
    collect_words(payload, &mut words, &mut text_len);
    infer_from_words(&words, text_len)
}

fn infer_from_words(words: &BTreeSet<String>, text_len: usize) -> RequirementProfile {
    let mut capabilities = CapabilitySet::new();
    let mut channels = BTreeSet::new();
    let mut groups = 0usize;

    for group in KEYWORD_GROUPS {
        if group.words.iter().any(|w| words.contains(*w)) {
            groups += 1;
            capabilities.insert(Capability::from_static(group.capability));
            if let Some(channel) = group.channel {
                channels.insert(channel.to_string());
            }
        }
    }

    if capabilities.is_empty() {
        capabilities.insert(Capability::from_static(FALLBACK_CAPABILITY));
    }

    let complexity = if groups >= 3 {
        Complexity::High
    } else if groups == 2 || text_len > LONG_TEXT_CHARS {
        Complexity::Medium
    } else {
        Complexity::Low
    };

    let mut profile = RequirementProfile::new(capabilities, complexity, inferred_duration(complexity));
    profile.channels = channels;
    profile
}

/// Requirement profile mapped from a task type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementRule {
    /// Task type matched exactly
    pub task_type: String,
    /// Capability tags required
    pub capabilities: CapabilitySet,
    /// Complexity class
    #[serde(default)]
    pub complexity: Complexity,
    /// Estimated duration
    #[serde(rename = "estimated_duration_ms", with = "duration_ms")]
    pub estimated_duration: Duration,
    /// Channel tags required
    #[serde(default)]
    pub channels: BTreeSet<String>,
}

impl RequirementRule {
    fn builtin(
        task_type: &str,
        capabilities: &[&'static str],
        complexity: Complexity,
        minutes: u64,
        channels: &[&str],
    ) -> Self {
        Self {
            task_type: task_type.to_string(),
            capabilities: capabilities.iter().map(|c| Capability::from_static(*c)).collect(),
            complexity,
            estimated_duration: Duration::from_secs(minutes * 60),
            channels: channels.iter().map(|c| (*c).to_string()).collect(),
        }
    }

    /// Requirement profile described by this rule
    #[must_use]
    pub fn to_profile(&self) -> RequirementProfile {
        RequirementProfile::new(
            self.capabilities.clone(),
            self.complexity,
            self.estimated_duration,
        )
        .with_channels(self.channels.iter().cloned())
    }
}

/// Table of task type to requirement rule
#[derive(Debug, Clone, Default)]
pub struct RequirementRules {
    rules: IndexMap<String, RequirementRule>,
}

impl RequirementRules {
    /// Empty table; every task is inferred from its payload
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in rules for the common task types
    #[must_use]
    pub fn builtin() -> Self {
        use Complexity::{High, Low, Medium};
        [
            RequirementRule::builtin("code-generation", &["code-generation"], Medium, 10, &[]),
            RequirementRule::builtin("testing", &["testing"], Low, 5, &["filesystem"]),
            RequirementRule::builtin("documentation", &["documentation"], Low, 5, &["filesystem"]),
            RequirementRule::builtin(
                "api-development",
                &["api-development", "code-generation"],
                Medium,
                15,
                &[],
            ),
            RequirementRule::builtin(
                "ui-development",
                &["ui-development", "code-generation"],
                Medium,
                15,
                &[],
            ),
            RequirementRule::builtin("database", &["database"], Medium, 10, &[]),
            RequirementRule::builtin("deployment", &["deployment"], High, 20, &["cloud"]),
            RequirementRule::builtin("code-review", &["code-review"], Medium, 10, &[]),
            RequirementRule::builtin("security-audit", &["security", "code-review"], High, 20, &[]),
            RequirementRule::builtin("architecture", &["architecture"], High, 30, &[]),
        ]
        .into_iter()
        .fold(Self::new(), Self::with_rule)
    }

    /// Add a rule, replacing any existing rule for the same task type
    #[must_use]
    pub fn with_rule(mut self, rule: RequirementRule) -> Self {
        self.rules.insert(rule.task_type.clone(), rule);
        self
    }

    /// Look up the rule for a task type
    #[must_use]
    pub fn rule(&self, task_type: &str) -> Option<&RequirementRule> {
        self.rules.get(task_type)
    }

    /// Number of rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Derive the requirement profile of a task
    ///
    /// An unknown task type is tokenized together with the payload, so a
    /// type such as `frontend-polish` still contributes its words.
    #[must_use]
    pub fn derive(&self, task: &Task) -> RequirementProfile {
        if let Some(rule) = task.task_type.as_deref().and_then(|t| self.rule(t)) {
            return rule.to_profile();
        }

        let mut words = BTreeSet::new();
        let mut text_len = 0;
        if let Some(payload) = &task.payload {
            collect_words(payload, &mut words, &mut text_len);
        }
        if let Some(task_type) = &task.task_type {
            push_words(task_type, &mut words);
        }
        infer_from_words(&words, text_len)
    }
}
