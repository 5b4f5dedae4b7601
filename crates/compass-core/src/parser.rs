//! TOML item-bank parser.
//!
//! Loads clusters, constructs, questions, scoring rules and tests from TOML
//! files and directories, and validates them.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{Category, Cluster, ClusterQuota, Construct, Question, ScoringRule, Test};
use crate::store::Snapshot;

/// Intermediate TOML structure for parsing item-bank files.
#[derive(Debug, Deserialize)]
struct TomlBankFile {
    bank: TomlBankHeader,
    #[serde(default)]
    clusters: Vec<TomlCluster>,
    #[serde(default)]
    tests: Vec<TomlTest>,
}

#[derive(Debug, Deserialize)]
struct TomlBankHeader {
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct TomlCluster {
    id: u64,
    name: String,
    #[serde(default)]
    short_code: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    high_behaviour: Option<String>,
    #[serde(default)]
    medium_behaviour: Option<String>,
    #[serde(default)]
    low_behaviour: Option<String>,
    #[serde(default)]
    constructs: Vec<TomlConstruct>,
}

#[derive(Debug, Deserialize)]
struct TomlConstruct {
    id: u64,
    name: String,
    #[serde(default)]
    short_code: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    definition: Option<String>,
    #[serde(default)]
    high_behavior: Option<String>,
    #[serde(default)]
    medium_behavior: Option<String>,
    #[serde(default)]
    low_behavior: Option<String>,
    #[serde(default)]
    benefits: Option<String>,
    #[serde(default)]
    risks: Option<String>,
    #[serde(default)]
    coaching_applications: Option<String>,
    #[serde(default)]
    case_example: Option<String>,
    #[serde(default)]
    display_order: Option<i32>,
    #[serde(default = "default_true")]
    active: bool,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: u64,
    text: String,
    category: String,
    #[serde(default)]
    order_no: Option<i32>,
    #[serde(default = "default_true")]
    active: bool,
    #[serde(default)]
    rule: Option<TomlRule>,
}

#[derive(Debug, Deserialize)]
struct TomlRule {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    reverse_score: Option<bool>,
    #[serde(default)]
    include_in_construct: Option<bool>,
    #[serde(default)]
    weight: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TomlTest {
    id: u64,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "default_true")]
    active: bool,
    #[serde(default)]
    clusters: Vec<TomlQuota>,
}

#[derive(Debug, Deserialize)]
struct TomlQuota {
    cluster_id: u64,
    #[serde(default)]
    p: Option<u32>,
    #[serde(default)]
    r: Option<u32>,
    #[serde(default)]
    sdb: Option<u32>,
}

fn default_true() -> bool {
    true
}

/// A parsed item bank, flattened into the data model.
#[derive(Debug, Clone, Default)]
pub struct ItemBank {
    pub name: String,
    pub description: String,
    pub clusters: Vec<Cluster>,
    pub constructs: Vec<Construct>,
    pub questions: Vec<Question>,
    pub scoring_rules: Vec<ScoringRule>,
    pub tests: Vec<Test>,
}

impl ItemBank {
    /// Fold another bank into this one.
    pub fn extend(&mut self, other: ItemBank) {
        self.clusters.extend(other.clusters);
        self.constructs.extend(other.constructs);
        self.questions.extend(other.questions);
        self.scoring_rules.extend(other.scoring_rules);
        self.tests.extend(other.tests);
    }

    /// The bank as an initial store snapshot (no materialized lists yet).
    pub fn into_snapshot(self) -> Snapshot {
        Snapshot {
            clusters: self.clusters,
            constructs: self.constructs,
            questions: self.questions,
            scoring_rules: self.scoring_rules,
            tests: self.tests,
            ..Default::default()
        }
    }
}

fn parse_category(raw: &str, question_id: u64) -> Result<Category> {
    raw.parse()
        .map_err(|e: String| anyhow::anyhow!("question {question_id}: {e}"))
}

/// Parse a single TOML file into an `ItemBank`.
pub fn parse_bank(path: &Path) -> Result<ItemBank> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read item bank file: {}", path.display()))?;

    parse_bank_str(&content, path)
}

/// Parse a TOML string into an `ItemBank` (useful for testing).
///
/// Unknown categories and quotas naming a cluster the bank does not define
/// are errors.
pub fn parse_bank_str(content: &str, source_path: &Path) -> Result<ItemBank> {
    let parsed: TomlBankFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let mut bank = ItemBank {
        name: parsed.bank.name,
        description: parsed.bank.description,
        ..Default::default()
    };

    for c in parsed.clusters {
        for k in c.constructs {
            for (position, q) in k.questions.into_iter().enumerate() {
                let category = parse_category(&q.category, q.id)?;
                if let Some(rule) = q.rule {
                    let rule_category = rule
                        .category
                        .map(|raw| parse_category(&raw, q.id))
                        .transpose()?;
                    bank.scoring_rules.push(ScoringRule {
                        question_id: q.id,
                        category: rule_category,
                        reverse_score: rule.reverse_score,
                        include_in_construct: rule.include_in_construct,
                        weight: rule.weight,
                    });
                }
                bank.questions.push(Question {
                    id: q.id,
                    construct_id: k.id,
                    text: q.text,
                    category,
                    order_no: q.order_no.unwrap_or(position as i32 + 1),
                    is_active: q.active,
                });
            }
            bank.constructs.push(Construct {
                id: k.id,
                cluster_id: c.id,
                name: k.name,
                short_code: k.short_code,
                description: k.description,
                definition: k.definition,
                high_behavior: k.high_behavior,
                medium_behavior: k.medium_behavior,
                low_behavior: k.low_behavior,
                benefits: k.benefits,
                risks: k.risks,
                coaching_applications: k.coaching_applications,
                case_example: k.case_example,
                display_order: k.display_order,
                is_active: k.active,
            });
        }
        bank.clusters.push(Cluster {
            id: c.id,
            name: c.name,
            short_code: c.short_code,
            description: c.description,
            high_behaviour: c.high_behaviour,
            medium_behaviour: c.medium_behaviour,
            low_behaviour: c.low_behaviour,
        });
    }

    let cluster_ids: HashSet<u64> = bank.clusters.iter().map(|c| c.id).collect();
    for t in parsed.tests {
        let clusters = t
            .clusters
            .into_iter()
            .map(|q| {
                if !cluster_ids.contains(&q.cluster_id) {
                    anyhow::bail!("test {}: unknown cluster {}", t.id, q.cluster_id);
                }
                Ok(ClusterQuota {
                    cluster_id: q.cluster_id,
                    p_count: q.p,
                    r_count: q.r,
                    sdb_count: q.sdb,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        bank.tests.push(Test {
            id: t.id,
            title: t.title,
            description: t.description,
            is_active: t.active,
            clusters,
        });
    }

    Ok(bank)
}

/// Recursively load all `.toml` item-bank files from a directory.
pub fn load_bank_directory(dir: &Path) -> Result<Vec<ItemBank>> {
    let mut banks = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            banks.extend(load_bank_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_bank(&path) {
                Ok(bank) => banks.push(bank),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(banks)
}

/// A warning from item-bank validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// What the warning is about, e.g. `question 104`.
    pub subject: Option<String>,
    /// Warning message.
    pub message: String,
}

impl ValidationWarning {
    fn new(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            message: message.into(),
        }
    }
}

fn duplicates(kind: &str, ids: impl Iterator<Item = u64>, warnings: &mut Vec<ValidationWarning>) {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            warnings.push(ValidationWarning::new(
                format!("{kind} {id}"),
                format!("duplicate {kind} ID: {id}"),
            ));
        }
    }
}

/// Same-named groups are scored apart under `"{name} #{id}"` keys.
fn shared_names<'a>(
    kind: &str,
    named: impl Iterator<Item = (u64, &'a str)>,
    warnings: &mut Vec<ValidationWarning>,
) {
    let mut first: HashMap<&str, u64> = HashMap::new();
    for (id, name) in named {
        if let Some(&other) = first.get(name) {
            warnings.push(ValidationWarning::new(
                format!("{kind} {id}"),
                format!("{kind} name \"{name}\" is also used by {kind} {other}"),
            ));
        } else {
            first.insert(name, id);
        }
    }
}

/// Validate an item bank for common authoring issues.
pub fn validate_bank(bank: &ItemBank) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    duplicates("cluster", bank.clusters.iter().map(|c| c.id), &mut warnings);
    duplicates("construct", bank.constructs.iter().map(|c| c.id), &mut warnings);
    duplicates("question", bank.questions.iter().map(|q| q.id), &mut warnings);
    duplicates("test", bank.tests.iter().map(|t| t.id), &mut warnings);
    shared_names(
        "cluster",
        bank.clusters.iter().map(|c| (c.id, c.name.as_str())),
        &mut warnings,
    );
    shared_names(
        "construct",
        bank.constructs.iter().map(|c| (c.id, c.name.as_str())),
        &mut warnings,
    );

    let rules: HashMap<u64, &ScoringRule> =
        bank.scoring_rules.iter().map(|r| (r.question_id, r)).collect();

    for q in &bank.questions {
        if q.text.trim().is_empty() {
            warnings.push(ValidationWarning::new(
                format!("question {}", q.id),
                "question text is empty",
            ));
        }
        let rule = rules.get(&q.id);
        let category = rule.and_then(|r| r.category).unwrap_or(q.category);
        let included = rule.and_then(|r| r.include_in_construct).unwrap_or(true);
        if category == Category::SocialDesirabilityBias && included {
            warnings.push(ValidationWarning::new(
                format!("question {}", q.id),
                "SDB question is included in construct aggregates",
            ));
        }
        if let Some(weight) = rule.and_then(|r| r.weight) {
            if weight <= 0.0 {
                warnings.push(ValidationWarning::new(
                    format!("question {}", q.id),
                    format!("weight {weight} is not positive"),
                ));
            }
        }
    }

    // Active questions per (cluster, category), for quota checks.
    let construct_cluster: HashMap<u64, u64> =
        bank.constructs.iter().map(|c| (c.id, c.cluster_id)).collect();
    let mut available: HashMap<(u64, Category), u32> = HashMap::new();
    for q in bank.questions.iter().filter(|q| q.is_active) {
        if let Some(&cluster_id) = construct_cluster.get(&q.construct_id) {
            *available.entry((cluster_id, q.category)).or_default() += 1;
        }
    }

    for test in &bank.tests {
        if test.clusters.is_empty() {
            warnings.push(ValidationWarning::new(
                format!("test {}", test.id),
                "no clusters attached; the test assembles to an empty list",
            ));
        }
        for quota in &test.clusters {
            if quota.is_unrestricted() {
                continue;
            }
            for category in Category::ALL {
                let requested = quota.count_for(category);
                let have = available
                    .get(&(quota.cluster_id, category))
                    .copied()
                    .unwrap_or(0);
                if requested > have {
                    warnings.push(ValidationWarning::new(
                        format!("test {}", test.id),
                        format!(
                            "cluster {} requests {requested} {category} questions but only {have} are active",
                            quota.cluster_id
                        ),
                    ));
                }
            }
        }
    }

    warnings
}
