//! Command catalog loaded from a CSV file.
//!
//! Schema (header row required):
//!
//! ```text
//! key,variants,action
//! Light On,light on|turn on light|led ON,led ON
//! Motor Forward,motor forward|go forward,motor FORWARD
//! ```
//!
//! Variants are pipe-delimited, trimmed and lowercased.  Rows with fewer than
//! three fields are skipped.  When the same variant appears under several
//! keys the later row wins the variant→action mapping, while the flattened
//! variant list keeps every occurrence in file order.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to open command catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse command catalog: {0}")]
    Csv(#[from] csv::Error),

    #[error("command catalog contains no usable entries")]
    Empty,
}

/// One catalog row.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandEntry {
    pub key: String,
    pub variants: Vec<String>,
    pub action: String,
}

/// The variant that resolved a lookup together with its owning entry.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantTarget {
    pub key: String,
    pub action: String,
}

#[derive(Debug, Clone, Default)]
pub struct CommandCatalog {
    entries: Vec<CommandEntry>,
    variants: Vec<String>,
    by_variant: HashMap<String, VariantTarget>,
}

impl CommandCatalog {
    /// Load and parse the catalog at `path`.  An empty result is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_reader(file)?;
        log::info!(
            "catalog: loaded {} command(s), {} variant(s) from {}",
            catalog.entries.len(),
            catalog.variants.len(),
            path.display()
        );
        Ok(catalog)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, CatalogError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut entries = Vec::new();
        for (line, record) in rdr.records().enumerate() {
            let record = record?;
            if record.len() < 3 {
                log::warn!(
                    "catalog: skipping row {} with {} field(s)",
                    line + 2,
                    record.len()
                );
                continue;
            }
            let variants: Vec<String> = record[1]
                .split('|')
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty())
                .collect();
            if variants.is_empty() {
                log::warn!("catalog: skipping row {} without variants", line + 2);
                continue;
            }
            entries.push(CommandEntry {
                key: record[0].to_string(),
                variants,
                action: record[2].to_string(),
            });
        }

        Self::from_entries(entries)
    }

    pub fn from_entries(entries: Vec<CommandEntry>) -> Result<Self, CatalogError> {
        let mut variants = Vec::new();
        let mut by_variant = HashMap::new();
        for entry in &entries {
            for variant in &entry.variants {
                variants.push(variant.clone());
                let target = VariantTarget {
                    key: entry.key.clone(),
                    action: entry.action.clone(),
                };
                if let Some(previous) = by_variant.insert(variant.clone(), target) {
                    if previous.key != entry.key {
                        log::debug!(
                            "catalog: variant {variant:?} moved from {:?} to {:?}",
                            previous.key,
                            entry.key
                        );
                    }
                }
            }
        }

        if variants.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(Self {
            entries,
            variants,
            by_variant,
        })
    }

    pub fn entries(&self) -> &[CommandEntry] {
        &self.entries
    }

    /// Every variant of every entry, in file order.
    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    pub fn lookup(&self, variant: &str) -> Option<&VariantTarget> {
        self.by_variant.get(variant)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
