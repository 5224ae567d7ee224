use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::types::ExhibitionDescriptor;

/// The set of currently valid exhibitions, derived from whatever descriptor
/// files exist right now. Membership is checked against the canonical decimal
/// form of each descriptor's id suffix, so "EXH_03" admits events for site
/// "3" (and "03", which canonicalizes the same way).
#[derive(Clone, Debug, Default)]
pub struct ExhibitionCatalog {
    ids: HashSet<i32>,
}

impl ExhibitionCatalog {
    pub fn from_descriptors<I>(descriptors: I) -> Self
    where
        I: IntoIterator<Item = ExhibitionDescriptor>,
    {
        let mut ids = HashSet::new();
        for descriptor in descriptors {
            match descriptor.derived_id() {
                Some(id) => {
                    ids.insert(id);
                }
                None => {
                    warn!(
                        external_id = %descriptor.exhibition_id,
                        "descriptor has no derivable id, skipping"
                    );
                }
            }
        }
        ExhibitionCatalog { ids }
    }

    /// Scans `dir` for descriptor files matching `pattern`. A malformed
    /// descriptor file is logged and skipped: one bad catalog entry must not
    /// block validation of unrelated events.
    pub fn load(dir: &Path, pattern: &Regex) -> Result<Self, std::io::Error> {
        let mut descriptors = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !pattern.is_match(&name) {
                continue;
            }
            let contents = std::fs::read_to_string(entry.path())?;
            match serde_json::from_str::<ExhibitionDescriptor>(&contents) {
                Ok(descriptor) => descriptors.push(descriptor),
                Err(e) => {
                    warn!(file = %name, error = %e, "malformed descriptor file, skipping");
                }
            }
        }
        Ok(Self::from_descriptors(descriptors))
    }

    /// Canonical decimal id strings, zero padding stripped.
    pub fn valid_ids(&self) -> BTreeSet<String> {
        self.ids.iter().map(|id| id.to_string()).collect()
    }

    pub fn is_member(&self, candidate: &str) -> bool {
        self.resolve_str(candidate).is_some()
    }

    /// Resolves a raw `site` value (string or number) to the catalog's
    /// numeric id, or None if it references no current exhibition.
    pub fn resolve(&self, site: &Value) -> Option<i32> {
        match site {
            Value::String(s) => self.resolve_str(s),
            Value::Number(n) => {
                let id = i32::try_from(n.as_i64()?).ok()?;
                self.ids.contains(&id).then_some(id)
            }
            _ => None,
        }
    }

    // Zero-padded candidates canonicalize ("03" -> 3); anything else,
    // including surrounding whitespace, is the caller's problem.
    fn resolve_str(&self, candidate: &str) -> Option<i32> {
        let id = candidate.parse::<i32>().ok()?;
        self.ids.contains(&id).then_some(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Re-derives the catalog from the descriptor directory on demand.
/// Membership is defined by the files that exist right now, not by what
/// existed at startup: a descriptor dropped into the directory admits its
/// exhibition on the next snapshot, and a removed one retires it.
pub struct CatalogSource {
    dir: PathBuf,
    pattern: Regex,
}

impl CatalogSource {
    pub fn new(dir: impl Into<PathBuf>, pattern: Regex) -> Self {
        CatalogSource {
            dir: dir.into(),
            pattern,
        }
    }

    pub fn snapshot(&self) -> Result<ExhibitionCatalog, std::io::Error> {
        ExhibitionCatalog::load(&self.dir, &self.pattern)
    }
}
