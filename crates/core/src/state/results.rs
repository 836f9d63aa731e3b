//! # Result Store
//!
//! Persisted pipeline output, keyed by normalized query and dish names.
//!
//! ```text
//! <root>/queries/<query>.json          {query, dishes, recipes, saved_at}
//! <root>/recipes/<dish>/<query>.json   one merged candidate + recipe
//! <root>/debug/<stage>_<time>.txt      raw malformed backend output
//! <root>/state/key_cursor.json         recipe-search key rotation cursor
//! ```

use super::io;
use super::keys::{dish_key_candidates, normalize_key};
use crate::skills::{Candidate, EnrichedDish};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Stored result of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryRecord {
    /// Query as typed by the user
    #[serde(default)]
    pub query: String,
    /// Candidates in the order the diversifier returned them
    #[serde(default)]
    pub dishes: Vec<Candidate>,
    /// Merged candidate + recipe records
    #[serde(default)]
    pub recipes: Vec<EnrichedDish>,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

/// A dish record found by [`ResultStore::load_dish_recipe`]
#[derive(Debug, Clone, PartialEq)]
pub struct DishLookup {
    pub record: EnrichedDish,
    /// Storage key of the dish collection
    pub dish_key: String,
    /// Query key the record was stored under
    pub query_key: String,
    /// True when the requested query had no record and another one was used
    pub fallback: bool,
}

/// File-backed store rooted at the data directory
#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at [`io::get_data_path`]
    pub fn open_default() -> Self {
        Self::new(io::get_data_path())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn queries_dir(&self) -> PathBuf {
        self.root.join("queries")
    }

    fn dish_dir(&self, dish_key: &str) -> PathBuf {
        self.root.join("recipes").join(dish_key)
    }

    /// Location of the persisted key rotation cursor
    pub fn key_cursor_path(&self) -> PathBuf {
        self.root.join("state").join("key_cursor.json")
    }

    /// Persist `{dishes, recipes}` under the normalized query
    pub async fn save_query(
        &self,
        query: &str,
        dishes: &[Candidate],
        recipes: &[EnrichedDish],
    ) -> Result<PathBuf> {
        let record = QueryRecord {
            query: query.to_string(),
            dishes: dishes.to_vec(),
            recipes: recipes.to_vec(),
            saved_at: Some(Utc::now()),
        };
        let path = self
            .queries_dir()
            .join(format!("{}.json", normalize_key(query)));
        let content = serde_json::to_string_pretty(&record)?;
        io::write_file(&path, &content).await?;
        tracing::debug!(path = ?path, recipes = recipes.len(), "Saved query record");
        Ok(path)
    }

    /// Load the record stored for a query, if any
    pub async fn load_query(&self, query: &str) -> Result<Option<QueryRecord>> {
        let path = self
            .queries_dir()
            .join(format!("{}.json", normalize_key(query)));
        if !io::file_exists(&path).await {
            return Ok(None);
        }
        let content = io::read_file(&path).await?;
        let record = serde_json::from_str(&content)
            .with_context(|| format!("Corrupt query record: {:?}", path))?;
        Ok(Some(record))
    }

    /// Stored query keys, sorted
    pub async fn list_queries(&self) -> Result<Vec<String>> {
        io::list_stems(&self.queries_dir(), "json").await
    }

    /// Persist one merged record in its dish collection, keyed by the query
    pub async fn save_dish_recipe(&self, query: &str, dish: &EnrichedDish) -> Result<PathBuf> {
        let path = self
            .dish_dir(&normalize_key(&dish.candidate.dish_name))
            .join(format!("{}.json", normalize_key(query)));
        let content = serde_json::to_string_pretty(dish)?;
        io::write_file(&path, &content).await?;
        Ok(path)
    }

    /// Query keys stored in a dish collection
    pub async fn list_dish_sources(&self, dish: &str) -> Result<Vec<String>> {
        for key in dish_key_candidates(dish) {
            let dir = self.dish_dir(&key);
            if io::dir_exists(&dir).await {
                return io::list_stems(&dir, "json").await;
            }
        }
        Ok(Vec::new())
    }

    /// Find a dish's recipe as stored from query `from`.
    ///
    /// The dish may be given as `jollof-rice` or `jollof_rice`. When the dish
    /// collection exists but holds nothing for `from`, the first record in the
    /// collection is returned instead. `None` means the dish is unknown.
    pub async fn load_dish_recipe(&self, dish: &str, from: Option<&str>) -> Result<Option<DishLookup>> {
        for dish_key in dish_key_candidates(dish) {
            let dir = self.dish_dir(&dish_key);
            if !io::dir_exists(&dir).await {
                continue;
            }

            if let Some(from) = from {
                let query_key = normalize_key(from);
                let path = dir.join(format!("{}.json", query_key));
                if io::file_exists(&path).await {
                    let record = read_dish(&path).await?;
                    return Ok(Some(DishLookup {
                        record,
                        dish_key,
                        query_key,
                        fallback: false,
                    }));
                }
            }

            let Some(query_key) = io::list_stems(&dir, "json").await?.into_iter().next() else {
                return Ok(None);
            };
            tracing::debug!(dish = %dish_key, from = ?from, using = %query_key, "Falling back to first stored record");
            let record = read_dish(&dir.join(format!("{}.json", query_key))).await?;
            return Ok(Some(DishLookup {
                record,
                dish_key,
                query_key,
                fallback: true,
            }));
        }
        Ok(None)
    }

    /// Keep raw backend output that failed to parse
    pub async fn write_debug_artifact(&self, stage: &str, raw: &str) -> Result<PathBuf> {
        let name = format!(
            "{}_{}.txt",
            normalize_key(stage),
            Utc::now().format("%Y%m%dT%H%M%S%.3f")
        );
        let path = self.root.join("debug").join(name);
        io::write_file(&path, raw).await?;
        Ok(path)
    }
}

async fn read_dish(path: &Path) -> Result<EnrichedDish> {
    let content = io::read_file(path).await?;
    serde_json::from_str(&content).with_context(|| format!("Corrupt dish record: {:?}", path))
}
