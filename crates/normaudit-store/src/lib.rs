//! Normaudit Storage Layer
//!
//! Implements the domain store traits (`SourceStore`, `FragmentStore`,
//! `RequirementStore`, `RunStore`) on a single SQLite database.
//!
//! # Architecture
//!
//! - Source documents own their attached files, fragments and runs
//!   (`ON DELETE CASCADE`)
//! - Fragments are written in bounded batches, each batch in its own
//!   transaction
//! - Status changes are compare-and-set, so two reviewers racing on the same
//!   fragment cannot both win
//! - A conversion (new set, requirements, fragment flips) commits in one
//!   transaction
//!
//! # Examples
//!
//! ```no_run
//! use normaudit_store::SqliteStore;
//!
//! let store = SqliteStore::new(":memory:").unwrap();
//! // Store is now ready for source registration
//! ```

#![warn(missing_docs)]

mod codec;
pub mod config;

use codec::{
    parameters_to_json, row_to_file, row_to_fragment, row_to_requirement, row_to_run, row_to_set,
    row_to_source, source_to_bytes, strings_to_json, FRAGMENT_COLUMNS, REQUIREMENT_COLUMNS,
    RUN_COLUMNS, SET_COLUMNS, SOURCE_COLUMNS,
};
use normaudit_domain::traits::{
    ConversionCommit, FragmentStore, RequirementStore, RunStore, SourceStore, Store,
};
use normaudit_domain::{
    FragmentId, FragmentPatch, FragmentStatus, PipelineRun, RawFragment, Requirement,
    RequirementSet, RunId, SourceDocument, SourceFile, SourceId, SourceStatus,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use thiserror::Error;

pub use config::StoreConfig;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON column could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Record already exists
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// A fragment batch failed; earlier batches stay committed
    #[error("Fragment batch {batch_index} failed after {inserted_before} rows were written: {reason}")]
    BatchFailed {
        /// Zero-based index of the failing batch
        batch_index: usize,
        /// Rows committed by earlier batches
        inserted_before: usize,
        /// Underlying error text
        reason: String,
    },

    /// A fragment was not in the status the caller expected
    #[error("Fragment {fragment} is {actual}, expected {expected}")]
    Conflict {
        /// Fragment identifier
        fragment: String,
        /// Status the caller expected
        expected: String,
        /// Status found in the store
        actual: String,
    },
}

/// SQLite-based implementation of the store traits
///
/// # Thread Safety
///
/// SQLite connections are not thread-safe. Share a store between tasks behind a
/// mutex, or give each thread its own `SqliteStore`.
pub struct SqliteStore {
    conn: Connection,
    batch_size: usize,
}

impl SqliteStore {
    /// Open (or create) a store at `path` with default settings
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use normaudit_store::SqliteStore;
    ///
    /// let store = SqliteStore::new("normaudit.db").unwrap();
    /// ```
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::open(path, config::DEFAULT_BATCH_SIZE)
    }

    /// Open a store described by a [`StoreConfig`]
    pub fn with_config(config: &StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        Self::open(&config.path, config.batch_size)
    }

    fn open<P: AsRef<Path>>(path: P, batch_size: usize) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let mut store = Self { conn, batch_size };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&mut self) -> Result<(), StoreError> {
        let schema = include_str!("schema.sql");
        self.conn.execute_batch(schema)?;
        Ok(())
    }

    /// Fragments written per transaction
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// All requirement sets, oldest first
    pub fn list_sets(&self) -> Result<Vec<RequirementSet>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM requirement_sets ORDER BY created_at, code",
            SET_COLUMNS
        ))?;
        let sets = stmt
            .query_map([], row_to_set)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sets)
    }

    fn insert_fragment_batch(&mut self, batch: &[RawFragment]) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO raw_fragments (source_id, seq, source_section, source_clause, raw_text,
                     detected_modality, detected_conditions, detected_parameters, predicted_type,
                     confidence, status, tags, check_method, chunk_index, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'pending', ?11, ?12, ?13, ?14)
                 ON CONFLICT(source_id, seq) DO UPDATE SET
                     source_section = excluded.source_section,
                     source_clause = excluded.source_clause,
                     raw_text = excluded.raw_text,
                     detected_modality = excluded.detected_modality,
                     detected_conditions = excluded.detected_conditions,
                     detected_parameters = excluded.detected_parameters,
                     predicted_type = excluded.predicted_type,
                     confidence = excluded.confidence,
                     chunk_index = excluded.chunk_index,
                     created_at = excluded.created_at
                 WHERE raw_fragments.status = 'pending'",
            )?;
            for fragment in batch {
                written += stmt.execute(params![
                    source_to_bytes(fragment.id.source),
                    fragment.id.seq as i64,
                    fragment.source_section,
                    fragment.source_clause,
                    fragment.raw_text,
                    fragment.detected_modality.map(|m| m.as_str()),
                    strings_to_json(&fragment.detected_conditions)?,
                    parameters_to_json(&fragment.detected_parameters)?,
                    fragment.predicted_type.as_str(),
                    fragment.confidence,
                    strings_to_json(&fragment.tags)?,
                    fragment.check_method.map(|c| c.as_str()),
                    fragment.chunk_index as i64,
                    fragment.created_at as i64,
                ])?;
            }
        }
        tx.commit()?;
        Ok(written)
    }
}

fn fragment_status(conn: &Connection, id: FragmentId) -> Result<Option<FragmentStatus>, StoreError> {
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM raw_fragments WHERE source_id = ?1 AND seq = ?2",
            params![source_to_bytes(id.source), id.seq as i64],
            |row| row.get(0),
        )
        .optional()?;
    status
        .map(|s| {
            FragmentStatus::parse(&s)
                .ok_or_else(|| StoreError::InvalidData(format!("Unknown fragment status: {}", s)))
        })
        .transpose()
}

/// Explain why a guarded fragment update touched no row
fn missing_or_conflict(conn: &Connection, id: FragmentId, expected: &str) -> StoreError {
    match fragment_status(conn, id) {
        Ok(Some(actual)) => StoreError::Conflict {
            fragment: id.to_string(),
            expected: expected.to_string(),
            actual: actual.as_str().to_string(),
        },
        Ok(None) => StoreError::NotFound(format!("fragment {}", id)),
        Err(e) => e,
    }
}

fn insert_set(conn: &Connection, set: &RequirementSet) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO requirement_sets (id, code, name, version, source_id, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            set.id,
            set.code,
            set.name,
            set.version,
            set.source_id.map(source_to_bytes),
            set.status.as_str(),
            set.created_at as i64,
        ],
    )?;
    Ok(())
}

fn insert_requirement_row(conn: &Connection, requirement: &Requirement) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO requirements (requirement_id, requirement_set_id, source_id, system_id, clause,
             text_short, text_full, check_method, severity_hint, tags, must_check,
             source_fragment_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            requirement.requirement_id,
            requirement.requirement_set_id,
            source_to_bytes(requirement.source_id),
            requirement.system_id,
            requirement.clause,
            requirement.text_short,
            requirement.text_full,
            requirement.check_method.as_str(),
            requirement.severity_hint.as_str(),
            strings_to_json(&requirement.tags)?,
            requirement.must_check,
            requirement.source_fragment_id.map(|f| f.to_string()),
            requirement.created_at as i64,
        ],
    )?;
    Ok(())
}

impl Store for SqliteStore {
    type Error = StoreError;
}

impl SourceStore for SqliteStore {
    fn create_source(&mut self, source: SourceDocument) -> Result<SourceId, Self::Error> {
        let id_bytes = source_to_bytes(source.id);

        let exists: bool = self
            .conn
            .query_row(
                "SELECT 1 FROM source_documents WHERE id = ?1",
                params![&id_bytes],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);

        if exists {
            return Err(StoreError::Duplicate(format!("source {}", source.id)));
        }

        self.conn.execute(
            "INSERT INTO source_documents (id, jurisdiction, code, title, edition_date, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &id_bytes,
                source.jurisdiction,
                source.code,
                source.title,
                source.edition_date,
                source.status.as_str(),
                source.created_at as i64,
            ],
        )?;

        Ok(source.id)
    }

    fn get_source(&self, id: SourceId) -> Result<Option<SourceDocument>, Self::Error> {
        let source = self
            .conn
            .query_row(
                &format!("SELECT {} FROM source_documents WHERE id = ?1", SOURCE_COLUMNS),
                params![source_to_bytes(id)],
                row_to_source,
            )
            .optional()?;
        Ok(source)
    }

    fn list_sources(&self) -> Result<Vec<SourceDocument>, Self::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM source_documents ORDER BY created_at, id",
            SOURCE_COLUMNS
        ))?;
        let sources = stmt
            .query_map([], row_to_source)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sources)
    }

    fn set_source_status(&mut self, id: SourceId, status: SourceStatus) -> Result<(), Self::Error> {
        let changed = self.conn.execute(
            "UPDATE source_documents SET status = ?1 WHERE id = ?2",
            params![status.as_str(), source_to_bytes(id)],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("source {}", id)));
        }
        Ok(())
    }

    fn attach_file(
        &mut self,
        id: SourceId,
        filename: &str,
        content: Vec<u8>,
    ) -> Result<i64, Self::Error> {
        if self.get_source(id)?.is_none() {
            return Err(StoreError::NotFound(format!("source {}", id)));
        }
        self.conn.execute(
            "INSERT INTO source_files (source_id, filename, content, attached_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                source_to_bytes(id),
                filename,
                content,
                normaudit_domain::current_timestamp() as i64
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_files(&self, id: SourceId) -> Result<Vec<SourceFile>, Self::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source_id, filename, content, attached_at
             FROM source_files WHERE source_id = ?1 ORDER BY id",
        )?;
        let files = stmt
            .query_map(params![source_to_bytes(id)], row_to_file)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(files)
    }
}

impl FragmentStore for SqliteStore {
    fn upsert_batch(&mut self, fragments: &[RawFragment]) -> Result<usize, Self::Error> {
        let mut written = 0;
        for (batch_index, batch) in fragments.chunks(self.batch_size).enumerate() {
            match self.insert_fragment_batch(batch) {
                Ok(count) => written += count,
                Err(e) => {
                    tracing::warn!(batch_index, inserted_before = written, error = %e, "Fragment batch failed");
                    return Err(StoreError::BatchFailed {
                        batch_index,
                        inserted_before: written,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(written)
    }

    fn list_by_source(
        &self,
        source: SourceId,
        status: Option<FragmentStatus>,
    ) -> Result<Vec<RawFragment>, Self::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM raw_fragments
             WHERE source_id = ?1 AND (?2 IS NULL OR status = ?2)
             ORDER BY seq",
            FRAGMENT_COLUMNS
        ))?;
        let fragments = stmt
            .query_map(
                params![source_to_bytes(source), status.map(|s| s.as_str())],
                row_to_fragment,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(fragments)
    }

    fn get_fragment(&self, id: FragmentId) -> Result<Option<RawFragment>, Self::Error> {
        let fragment = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM raw_fragments WHERE source_id = ?1 AND seq = ?2",
                    FRAGMENT_COLUMNS
                ),
                params![source_to_bytes(id.source), id.seq as i64],
                row_to_fragment,
            )
            .optional()?;
        Ok(fragment)
    }

    fn update_status(
        &mut self,
        id: FragmentId,
        expected: FragmentStatus,
        status: FragmentStatus,
        reviewed_by: Option<&str>,
    ) -> Result<(), Self::Error> {
        let changed = self.conn.execute(
            "UPDATE raw_fragments SET status = ?1, reviewed_by = COALESCE(?2, reviewed_by)
             WHERE source_id = ?3 AND seq = ?4 AND status = ?5",
            params![
                status.as_str(),
                reviewed_by,
                source_to_bytes(id.source),
                id.seq as i64,
                expected.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(missing_or_conflict(&self.conn, id, expected.as_str()));
        }
        Ok(())
    }

    fn update_metadata(&mut self, id: FragmentId, patch: &FragmentPatch) -> Result<(), Self::Error> {
        let tags = patch.tags.as_deref().map(strings_to_json).transpose()?;
        let changed = self.conn.execute(
            "UPDATE raw_fragments SET tags = COALESCE(?1, tags), check_method = COALESCE(?2, check_method)
             WHERE source_id = ?3 AND seq = ?4 AND status IN ('pending', 'approved')",
            params![
                tags,
                patch.check_method.map(|c| c.as_str()),
                source_to_bytes(id.source),
                id.seq as i64,
            ],
        )?;
        if changed == 0 {
            return Err(missing_or_conflict(&self.conn, id, "pending or approved"));
        }
        Ok(())
    }

    fn delete_by_source(&mut self, source: SourceId) -> Result<usize, Self::Error> {
        let deleted = self.conn.execute(
            "DELETE FROM raw_fragments WHERE source_id = ?1",
            params![source_to_bytes(source)],
        )?;
        Ok(deleted)
    }

    fn delete_pending_by_source(&mut self, source: SourceId) -> Result<usize, Self::Error> {
        let deleted = self.conn.execute(
            "DELETE FROM raw_fragments WHERE source_id = ?1 AND status = 'pending'",
            params![source_to_bytes(source)],
        )?;
        Ok(deleted)
    }

    fn max_fragment_seq(&self, source: SourceId) -> Result<u32, Self::Error> {
        let max: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(seq), 0) FROM raw_fragments WHERE source_id = ?1",
            params![source_to_bytes(source)],
            |row| row.get(0),
        )?;
        Ok(max.max(0) as u32)
    }
}

impl RequirementStore for SqliteStore {
    fn find_set_by_code(&self, code: &str) -> Result<Option<RequirementSet>, Self::Error> {
        let set = self
            .conn
            .query_row(
                &format!("SELECT {} FROM requirement_sets WHERE code = ?1", SET_COLUMNS),
                params![code],
                row_to_set,
            )
            .optional()?;
        Ok(set)
    }

    fn create_set(&mut self, set: RequirementSet) -> Result<(), Self::Error> {
        if self.find_set_by_code(&set.code)?.is_some() {
            return Err(StoreError::Duplicate(format!("requirement set {}", set.code)));
        }
        insert_set(&self.conn, &set)
    }

    fn list_requirement_ids_with_prefix(&self, prefix: &str) -> Result<Vec<String>, Self::Error> {
        // substr instead of LIKE: codes may contain `_` and `%`
        let mut stmt = self.conn.prepare(
            "SELECT requirement_id FROM requirements
             WHERE substr(requirement_id, 1, ?1) = ?2 ORDER BY requirement_id",
        )?;
        let ids = stmt
            .query_map(params![prefix.chars().count() as i64, prefix], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    fn list_requirements_by_source(&self, source: SourceId) -> Result<Vec<Requirement>, Self::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM requirements WHERE source_id = ?1 ORDER BY created_at, requirement_id",
            REQUIREMENT_COLUMNS
        ))?;
        let requirements = stmt
            .query_map(params![source_to_bytes(source)], row_to_requirement)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(requirements)
    }

    fn insert_requirement(&mut self, requirement: Requirement) -> Result<(), Self::Error> {
        insert_requirement_row(&self.conn, &requirement)
    }

    fn commit_conversion(&mut self, commit: &ConversionCommit) -> Result<(), Self::Error> {
        let tx = self.conn.transaction()?;

        if let Some(set) = &commit.new_set {
            insert_set(&tx, set)?;
        }

        for requirement in &commit.requirements {
            insert_requirement_row(&tx, requirement)?;

            if let Some(fragment) = requirement.source_fragment_id {
                let changed = tx.execute(
                    "UPDATE raw_fragments SET status = 'processed', converted_requirement_id = ?1
                     WHERE source_id = ?2 AND seq = ?3 AND status = 'approved'",
                    params![
                        requirement.requirement_id,
                        source_to_bytes(fragment.source),
                        fragment.seq as i64,
                    ],
                )?;
                if changed == 0 {
                    // Dropping the transaction rolls everything back
                    return Err(missing_or_conflict(&tx, fragment, FragmentStatus::Approved.as_str()));
                }
            }
        }

        tx.commit()?;
        Ok(())
    }
}

impl RunStore for SqliteStore {
    fn create_run(&mut self, run: &PipelineRun) -> Result<(), Self::Error> {
        self.conn.execute(
            &format!(
                "INSERT INTO pipeline_runs ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                RUN_COLUMNS
            ),
            params![
                codec::id_to_bytes(run.id.value()),
                source_to_bytes(run.source_id),
                run.kind.as_str(),
                run.status.as_str(),
                run.units_done as i64,
                run.units_total as i64,
                run.items_written as i64,
                run.error,
                run.created_at as i64,
                run.updated_at as i64,
            ],
        )?;
        Ok(())
    }

    fn update_run(&mut self, run: &PipelineRun) -> Result<(), Self::Error> {
        let changed = self.conn.execute(
            "UPDATE pipeline_runs SET status = ?1, units_done = ?2, units_total = ?3,
                 items_written = ?4, error = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                run.status.as_str(),
                run.units_done as i64,
                run.units_total as i64,
                run.items_written as i64,
                run.error,
                run.updated_at as i64,
                codec::id_to_bytes(run.id.value()),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("run {}", run.id)));
        }
        Ok(())
    }

    fn get_run(&self, id: RunId) -> Result<Option<PipelineRun>, Self::Error> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM pipeline_runs WHERE id = ?1", RUN_COLUMNS),
                params![codec::id_to_bytes(id.value())],
                row_to_run,
            )
            .optional()?;
        Ok(run)
    }

    fn list_runs(&self, source: SourceId) -> Result<Vec<PipelineRun>, Self::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM pipeline_runs WHERE source_id = ?1 ORDER BY created_at DESC, id DESC",
            RUN_COLUMNS
        ))?;
        let runs = stmt
            .query_map(params![source_to_bytes(source)], row_to_run)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }
}
