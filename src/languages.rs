//! Language pairs and the catalog of models serving them

use crate::config::{default_language_pairs, LanguagePairConfig};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Directed translation pair, keyed as `"{source}-{target}"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LanguagePair {
    pub source: String,
    pub target: String,
}

impl LanguagePair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into().trim().to_lowercase(),
            target: target.into().trim().to_lowercase(),
        }
    }
}

impl fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.source, self.target)
    }
}

impl FromStr for LanguagePair {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim().split('-');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(source), Some(target), None)
                if !source.trim().is_empty() && !target.trim().is_empty() =>
            {
                Ok(LanguagePair::new(source, target))
            }
            _ => Err(AppError::InvalidRequest(format!(
                "Invalid language pair '{}', expected '<source>-<target>'",
                s
            ))),
        }
    }
}

/// Everything needed to fetch and run the model for one pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub model_id: String,
    pub revision: Option<String>,
    pub weights: Option<String>,
    pub tokenizer_repo: Option<String>,
    pub source_tokenizer: Option<String>,
    pub target_tokenizer: Option<String>,
}

impl ModelSpec {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            revision: None,
            weights: None,
            tokenizer_repo: None,
            source_tokenizer: None,
            target_tokenizer: None,
        }
    }
}

impl From<&LanguagePairConfig> for ModelSpec {
    fn from(config: &LanguagePairConfig) -> Self {
        Self {
            model_id: config.model.clone(),
            revision: config.revision.clone(),
            weights: config.weights.clone(),
            tokenizer_repo: config.tokenizer_repo.clone(),
            source_tokenizer: config.source_tokenizer.clone(),
            target_tokenizer: config.target_tokenizer.clone(),
        }
    }
}

/// Static mapping from language pair to model
#[derive(Debug, Clone)]
pub struct LanguageCatalog {
    pairs: BTreeMap<LanguagePair, ModelSpec>,
}

impl Default for LanguageCatalog {
    /// The built-in OPUS-MT pairs
    fn default() -> Self {
        let pairs = default_language_pairs()
            .iter()
            .filter_map(|config| {
                let pair = config.pair.parse::<LanguagePair>().ok()?;
                Some((pair, ModelSpec::from(config)))
            })
            .collect();
        Self { pairs }
    }
}

impl LanguageCatalog {
    /// Build the catalog from configured pairs, rejecting malformed or duplicate entries
    pub fn from_config(configs: &[LanguagePairConfig]) -> Result<Self> {
        let mut pairs = BTreeMap::new();

        for config in configs {
            let pair: LanguagePair = config.pair.parse()?;
            if config.model.trim().is_empty() {
                return Err(AppError::InvalidRequest(format!(
                    "Language pair '{}' has no model",
                    pair
                )));
            }
            if pairs.insert(pair.clone(), ModelSpec::from(config)).is_some() {
                return Err(AppError::InvalidRequest(format!(
                    "Language pair '{}' is configured more than once",
                    pair
                )));
            }
        }

        Ok(Self { pairs })
    }

    pub fn insert(&mut self, pair: LanguagePair, spec: ModelSpec) {
        self.pairs.insert(pair, spec);
    }

    pub fn model_for(&self, pair: &LanguagePair) -> Option<&ModelSpec> {
        self.pairs.get(pair)
    }

    pub fn contains(&self, pair: &LanguagePair) -> bool {
        self.pairs.contains_key(pair)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// All registered pairs, ordered by key
    pub fn pairs(&self) -> impl Iterator<Item = (&LanguagePair, &ModelSpec)> {
        self.pairs.iter()
    }

    /// Distinct source languages, sorted
    pub fn source_languages(&self) -> Vec<String> {
        self.collect_codes(|pair| &pair.source)
    }

    /// Distinct target languages, sorted
    pub fn target_languages(&self) -> Vec<String> {
        self.collect_codes(|pair| &pair.target)
    }

    /// Every language appearing on either side of a pair, sorted
    pub fn languages(&self) -> Vec<String> {
        self.pairs
            .keys()
            .flat_map(|pair| [pair.source.clone(), pair.target.clone()])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn collect_codes<F>(&self, side: F) -> Vec<String>
    where
        F: Fn(&LanguagePair) -> &String,
    {
        self.pairs
            .keys()
            .map(|pair| side(pair).clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
