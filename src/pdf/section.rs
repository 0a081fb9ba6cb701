//! Keyword-based section classification of page text.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Documentation section a page belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Introduction,
    Architecture,
    Migration,
    CodeConversion,
    DataMigration,
    Tools,
    BestPractices,
    Concepts,
    General,
}

/// Checked in order; the first group with any keyword in the text wins.
const SECTION_KEYWORDS: &[(Section, &[&str])] = &[
    (Section::Introduction, &["introduction", "introdução", "overview"]),
    (Section::Architecture, &["architecture", "arquitetura", "design"]),
    (Section::Migration, &["migration", "migração", "migrating"]),
    (
        Section::CodeConversion,
        &["code conversion", "conversão de código", "converting code"],
    ),
    (
        Section::DataMigration,
        &["data migr", "migração de dados", "data migrator"],
    ),
    (Section::Tools, &["tools", "ferramentas", "tooling"]),
    (
        Section::BestPractices,
        &["best practices", "boas práticas", "recommendations"],
    ),
    (Section::Concepts, &["concept", "conceito", "fundamental"]),
];

impl Section {
    /// Classify a page by the keywords it contains.
    pub fn classify(text: &str) -> Self {
        let lower = text.to_lowercase();
        SECTION_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(section, _)| *section)
            .unwrap_or(Section::General)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Introduction => "introduction",
            Section::Architecture => "architecture",
            Section::Migration => "migration",
            Section::CodeConversion => "code_conversion",
            Section::DataMigration => "data_migration",
            Section::Tools => "tools",
            Section::BestPractices => "best_practices",
            Section::Concepts => "concepts",
            Section::General => "general",
        }
    }

    /// Inverse of [`Section::as_str`]; unknown names map to `General`.
    pub fn from_name(name: &str) -> Self {
        SECTION_KEYWORDS
            .iter()
            .map(|(section, _)| *section)
            .find(|section| section.as_str() == name)
            .unwrap_or(Section::General)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
