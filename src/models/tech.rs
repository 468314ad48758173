//! Target technology sets used to skip inapplicable active rules.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A technology the target application may be built on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Tech {
    Php,
    Java,
    DotNet,
    JavaScript,
    Python,
    Windows,
    Linux,
    MacOs,
    MySql,
    PostgreSql,
}

impl Tech {
    pub fn from_str_opt(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "php" => Some(Self::Php),
            "java" => Some(Self::Java),
            "dotnet" | ".net" => Some(Self::DotNet),
            "javascript" | "js" => Some(Self::JavaScript),
            "python" => Some(Self::Python),
            "windows" => Some(Self::Windows),
            "linux" => Some(Self::Linux),
            "macos" => Some(Self::MacOs),
            "mysql" => Some(Self::MySql),
            "postgresql" | "postgres" => Some(Self::PostgreSql),
            _ => None,
        }
    }
}

/// A set of technologies the scan is allowed to assume about the target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TechSet {
    techs: BTreeSet<Tech>,
}

impl TechSet {
    /// Set containing every known technology, the default scan assumption.
    pub fn all() -> Self {
        Self {
            techs: BTreeSet::from([
                Tech::Php,
                Tech::Java,
                Tech::DotNet,
                Tech::JavaScript,
                Tech::Python,
                Tech::Windows,
                Tech::Linux,
                Tech::MacOs,
                Tech::MySql,
                Tech::PostgreSql,
            ]),
        }
    }

    pub fn of(techs: impl IntoIterator<Item = Tech>) -> Self {
        Self {
            techs: techs.into_iter().collect(),
        }
    }

    /// Remove technologies, e.g. when the target is known not to run them.
    pub fn without(mut self, techs: impl IntoIterator<Item = Tech>) -> Self {
        for tech in techs {
            self.techs.remove(&tech);
        }
        self
    }

    pub fn includes(&self, tech: Tech) -> bool {
        self.techs.contains(&tech)
    }

    /// Whether any of the other set's technologies is included here.
    pub fn includes_any(&self, other: &TechSet) -> bool {
        other.techs.iter().any(|t| self.techs.contains(t))
    }

    pub fn is_empty(&self) -> bool {
        self.techs.is_empty()
    }
}
