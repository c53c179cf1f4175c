//! Static data loaded at start-up: syrup descriptions and the name denylist.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::types::Syrup;

/// Descriptions of the four syrups, used to brief the model.
#[derive(Debug, Clone, Default)]
pub struct IngredientCatalog {
    descriptions: HashMap<Syrup, String>,
}

impl IngredientCatalog {
    /// Load from a file of `Name: description` lines.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::DataFile {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::parse(&content);

        for syrup in Syrup::ALL {
            if catalog.description(syrup).is_none() {
                tracing::warn!(syrup = %syrup, path = %path.display(), "No description for syrup");
            }
        }
        tracing::debug!(count = catalog.descriptions.len(), "Loaded syrup descriptions");

        Ok(catalog)
    }

    /// Parse `Name: description` lines. Unknown names and lines without a colon are skipped.
    pub fn parse(content: &str) -> Self {
        let mut descriptions = HashMap::new();

        for line in content.lines() {
            let Some((name, description)) = line.split_once(':') else {
                continue;
            };
            match Syrup::from_name(name) {
                Some(syrup) => {
                    descriptions.insert(syrup, description.trim().to_string());
                }
                None => tracing::debug!(name = name.trim(), "Skipping unknown syrup"),
            }
        }

        Self { descriptions }
    }

    pub fn description(&self, syrup: Syrup) -> Option<&str> {
        self.descriptions.get(&syrup).map(String::as_str)
    }
}

/// Substrings a cocktail name must not contain (case-insensitive).
#[derive(Debug, Clone, Default)]
pub struct Denylist {
    /// Lowercased terms, in file order.
    terms: Vec<String>,
}

impl Denylist {
    /// Load from a file with one term per line. Blank lines and `#` comments are ignored.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::DataFile {
            path: path.to_path_buf(),
            source,
        })?;
        let denylist = Self::parse(&content);
        tracing::debug!(count = denylist.len(), "Loaded name denylist");
        Ok(denylist)
    }

    pub fn parse(content: &str) -> Self {
        Self::new(
            content
                .lines()
                .filter(|line| !line.trim_start().starts_with('#')),
        )
    }

    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self { terms }
    }

    /// First term contained in `name`, if any.
    pub fn find_in(&self, name: &str) -> Option<&str> {
        let lower = name.to_lowercase();
        self.terms
            .iter()
            .find(|term| lower.contains(term.as_str()))
            .map(String::as_str)
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}
