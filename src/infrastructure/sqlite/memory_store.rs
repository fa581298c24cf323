use crate::domain::entities::memory_record::{MemoryHit, MemoryRecord, META_DATE};
use crate::domain::error::DomainError;
use crate::domain::ports::embedding_port::{EmbeddingProvider, InputType};
use crate::domain::ports::memory_store::{MemoryQuery, MemoryStore};
use crate::domain::values::memory_tier::MemoryTier;
use rusqlite::{params, Connection};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

/// One memory tier persisted in the `memory_records` table.
///
/// Scoring is cosine similarity when both the query and the stored record
/// have embeddings, and binary token-overlap cosine otherwise.
pub struct SqliteMemoryStore {
    conn: Mutex<Connection>,
    embedder: Arc<dyn EmbeddingProvider>,
    tier: MemoryTier,
}

impl SqliteMemoryStore {
    pub fn new(conn: Connection, embedder: Arc<dyn EmbeddingProvider>, tier: MemoryTier) -> Self {
        Self {
            conn: Mutex::new(conn),
            embedder,
            tier,
        }
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }
        let mut dot = 0.0_f64;
        let mut norm_a = 0.0_f64;
        let mut norm_b = 0.0_f64;
        for (x, y) in a.iter().zip(b.iter()) {
            let x = *x as f64;
            let y = *y as f64;
            dot += x * y;
            norm_a += x * x;
            norm_b += y * y;
        }
        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom == 0.0 { 0.0 } else { dot / denom }
    }

    fn tokens(text: &str) -> HashSet<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.chars().count() >= 2)
            .map(|t| t.to_lowercase())
            .collect()
    }

    fn lexical_similarity(query: &HashSet<String>, doc: &str) -> f64 {
        let doc = Self::tokens(doc);
        if query.is_empty() || doc.is_empty() {
            return 0.0;
        }
        let overlap = query.intersection(&doc).count() as f64;
        overlap / ((query.len() * doc.len()) as f64).sqrt()
    }

    fn serialize_vector(v: &[f32]) -> Vec<u8> {
        v.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_vector(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn check_meta_key(key: &str) -> Result<(), DomainError> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(DomainError::InvalidInput(format!("Invalid metadata key: {key}")));
        }
        Ok(())
    }

    /// Dimension of any stored embedding in this tier, if one exists.
    pub fn stored_dimension(&self) -> Result<Option<usize>, DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let len: Option<i64> = conn
            .query_row(
                "SELECT length(vector) FROM memory_records WHERE tier = ?1 AND vector IS NOT NULL AND length(vector) > 0 LIMIT 1",
                params![self.tier.to_string()],
                |r| r.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(DomainError::Database(other.to_string())),
            })?;
        Ok(len.map(|bytes| bytes as usize / 4))
    }

    async fn embed_documents(&self, records: &[MemoryRecord]) -> Vec<Vec<f32>> {
        let texts: Vec<String> = records.iter().map(|r| r.content.clone()).collect();
        match self.embedder.embed(&texts, InputType::Document).await {
            Ok(vectors) if vectors.len() == records.len() => vectors,
            Ok(vectors) => {
                tracing::warn!(
                    tier = %self.tier,
                    expected = records.len(),
                    got = vectors.len(),
                    "embedding count mismatch, storing records without vectors"
                );
                vec![Vec::new(); records.len()]
            }
            Err(e) => {
                tracing::warn!(tier = %self.tier, error = %e, "embedding failed, storing records without vectors");
                vec![Vec::new(); records.len()]
            }
        }
    }
}

#[async_trait::async_trait]
impl MemoryStore for SqliteMemoryStore {
    fn tier(&self) -> MemoryTier {
        self.tier
    }

    async fn upsert(&self, records: &[MemoryRecord]) -> Result<(), DomainError> {
        if records.is_empty() {
            return Ok(());
        }
        if let Some(rec) = records.iter().find(|r| r.tier != self.tier) {
            return Err(DomainError::InvalidInput(format!(
                "Record {} belongs to tier {}, not {}",
                rec.id, rec.tier, self.tier
            )));
        }

        let vectors = self.embed_documents(records).await;
        let now = chrono::Utc::now().to_rfc3339();

        let mut conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        for (rec, vector) in records.iter().zip(vectors.iter()) {
            let metadata = serde_json::to_string(&rec.metadata)
                .map_err(|e| DomainError::Parse(format!("Cannot encode metadata: {e}")))?;
            let blob = (!vector.is_empty()).then(|| Self::serialize_vector(vector));
            tx.execute(
                "INSERT OR REPLACE INTO memory_records (tier, id, content, metadata, record_date, vector, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    self.tier.to_string(),
                    rec.id,
                    rec.content,
                    metadata,
                    rec.meta(META_DATE),
                    blob,
                    now,
                ],
            )
            .map_err(|e| DomainError::Database(format!("Failed to upsert memory {}: {e}", rec.id)))?;
        }
        tx.commit()
            .map_err(|e| DomainError::Database(format!("Failed to commit memory batch: {e}")))?;

        tracing::debug!(tier = %self.tier, count = records.len(), "memory upserted");
        Ok(())
    }

    async fn query(&self, query: &MemoryQuery) -> Result<Vec<MemoryHit>, DomainError> {
        if query.top_k == 0 {
            return Ok(vec![]);
        }
        for key in query.filter.equals.keys() {
            Self::check_meta_key(key)?;
        }

        let query_vector = match self.embedder.embed(&[query.text.clone()], InputType::Query).await {
            Ok(mut vectors) => vectors.pop().unwrap_or_default(),
            Err(e) => {
                tracing::warn!(tier = %self.tier, error = %e, "query embedding failed, using lexical scoring");
                Vec::new()
            }
        };
        let query_tokens = Self::tokens(&query.text);

        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;

        let mut sql = String::from("SELECT id, content, metadata, vector FROM memory_records WHERE tier = ?1");
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(self.tier.to_string())];
        for (key, value) in &query.filter.equals {
            sql.push_str(&format!(
                " AND json_extract(metadata, ?{}) = ?{}",
                param_values.len() + 1,
                param_values.len() + 2
            ));
            param_values.push(Box::new(format!("$.{key}")));
            param_values.push(Box::new(value.clone()));
        }
        if let Some(before) = &query.filter.before {
            sql.push_str(&format!(" AND record_date < ?{}", param_values.len() + 1));
            param_values.push(Box::new(before.format("%Y-%m-%d").to_string()));
        }

        let params_refs: Vec<&dyn rusqlite::types::ToSql> = param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let rows: Vec<(String, String, String, Option<Vec<u8>>)> = stmt
            .query_map(params_refs.as_slice(), |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })
            .map_err(|e| DomainError::Database(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();

        let mut hits: Vec<MemoryHit> = rows
            .into_iter()
            .map(|(id, content, metadata, blob)| {
                let stored = blob.as_deref().map(Self::deserialize_vector).unwrap_or_default();
                let score = if !query_vector.is_empty() && stored.len() == query_vector.len() {
                    Self::cosine_similarity(&query_vector, &stored)
                } else {
                    Self::lexical_similarity(&query_tokens, &content)
                };
                let metadata: BTreeMap<String, String> = serde_json::from_str(&metadata).unwrap_or_default();
                MemoryHit {
                    record: MemoryRecord {
                        id,
                        tier: self.tier,
                        content,
                        metadata,
                    },
                    score,
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.record.date().cmp(a.record.date()))
        });
        hits.truncate(query.top_k);
        Ok(hits)
    }

    fn count(&self) -> Result<usize, DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        conn.query_row(
            "SELECT COUNT(*) FROM memory_records WHERE tier = ?1",
            params![self.tier.to_string()],
            |r| r.get(0),
        )
        .map_err(|e| DomainError::Database(e.to_string()))
    }

    fn peek(&self, limit: usize) -> Result<Vec<MemoryRecord>, DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let mut stmt = conn
            .prepare(
                "SELECT id, content, metadata FROM memory_records WHERE tier = ?1
                 ORDER BY record_date DESC, id ASC LIMIT ?2",
            )
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let records = stmt
            .query_map(params![self.tier.to_string(), limit as i64], |row| {
                let metadata: String = row.get(2)?;
                Ok(MemoryRecord {
                    id: row.get(0)?,
                    tier: self.tier,
                    content: row.get(1)?,
                    metadata: serde_json::from_str(&metadata).unwrap_or_default(),
                })
            })
            .map_err(|e| DomainError::Database(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(records)
    }
}
