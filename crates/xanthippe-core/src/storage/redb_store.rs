//! # redb-backed Coverage Store
//!
//! Maps every explored button sequence to the frame it produced.
//!
//! One table, `sessions`, keyed by the literal symbol string. Values are
//! postcard-encoded [`CoverageRow`]s carrying an optional screen and the
//! `requested` flag.
//!
//! ## Write contract
//!
//! Every mutation is a read-modify-write inside one redb write transaction,
//! so the decision below and the write it leads to are atomic:
//!
//! | stored row        | `FillGap`            | `Force`         |
//! |-------------------|----------------------|-----------------|
//! | absent            | insert               | insert          |
//! | screen absent     | set screen           | set screen      |
//! | screen present    | leave as is          | overwrite       |
//!
//! Supplying a screen clears `requested`. Flagging a row as requested never
//! touches its screen.
//!
//! redb holds an exclusive lock on the file, so one process owns a store
//! and a second `open` fails with [`XanthippeError::StoreBusy`]. Inside the
//! owning process the store is shared through `Arc`; redb serializes write
//! transactions. Other processes go through the owner's intake server.

use crate::{ButtonSequence, Frame, XanthippeError};
use redb::{Database, DatabaseError, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Table for coverage: button symbols -> serialized `CoverageRow`
const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

/// Stored value of one sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
struct CoverageRow {
    screen: Option<Frame>,
    requested: bool,
}

impl CoverageRow {
    fn decode(bytes: &[u8]) -> Result<Self, XanthippeError> {
        postcard::from_bytes(bytes).map_err(|e| XanthippeError::DeserializationError(e.to_string()))
    }

    fn encode(&self) -> Result<Vec<u8>, XanthippeError> {
        postcard::to_allocvec(self).map_err(|e| XanthippeError::SerializationError(e.to_string()))
    }
}

/// One row of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageRecord {
    /// The key.
    pub buttons: ButtonSequence,
    /// Frame observed after pressing `buttons` from reset, if known.
    pub screen: Option<Frame>,
    /// Nominated for (re-)exploration.
    pub requested: bool,
}

impl CoverageRecord {
    /// True once a screen has been recorded.
    #[must_use]
    pub fn is_covered(&self) -> bool {
        self.screen.is_some()
    }
}

/// How [`CoverageStore::record`] treats an existing screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertMode {
    /// Only fill rows whose screen is absent.
    FillGap,
    /// Overwrite whatever is there.
    Force,
}

/// What [`CoverageStore::record`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The key was new.
    Inserted,
    /// The key existed without a screen and got one.
    Filled,
    /// The key was already covered; nothing was written.
    Unchanged,
    /// The key was already covered and the screen was replaced.
    Overwritten,
}

/// Row counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoverageStats {
    /// Rows in the table.
    pub total: u64,
    /// Rows with a screen.
    pub covered: u64,
    /// Rows flagged as requested.
    pub requested: u64,
    /// Requested rows still without a screen.
    pub pending: u64,
}

/// Persistent map from button sequences to observed screens.
pub struct CoverageStore {
    db: Database,
}

impl std::fmt::Debug for CoverageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoverageStore").finish_non_exhaustive()
    }
}

impl CoverageStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, XanthippeError> {
        let path = path.as_ref();
        let db = Database::create(path).map_err(|e| match e {
            DatabaseError::DatabaseAlreadyOpen => {
                XanthippeError::StoreBusy(path.display().to_string())
            }
            other => XanthippeError::IoError(other.to_string()),
        })?;

        let write_txn = db
            .begin_write()
            .map_err(|e| XanthippeError::IoError(e.to_string()))?;
        let _ = write_txn
            .open_table(SESSIONS)
            .map_err(|e| XanthippeError::IoError(e.to_string()))?;
        write_txn
            .commit()
            .map_err(|e| XanthippeError::IoError(e.to_string()))?;

        Ok(Self { db })
    }

    /// Compact the database file. Returns true if anything was reclaimed.
    pub fn compact(&mut self) -> Result<bool, XanthippeError> {
        self.db
            .compact()
            .map_err(|e| XanthippeError::IoError(e.to_string()))
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Record that `screen` showed after pressing `buttons` from reset.
    pub fn record(
        &self,
        buttons: &ButtonSequence,
        screen: Frame,
        mode: UpsertMode,
    ) -> Result<UpsertOutcome, XanthippeError> {
        let outcomes = self.record_all(&[(buttons.clone(), screen)], mode)?;
        outcomes
            .first()
            .copied()
            .ok_or_else(|| XanthippeError::IoError("empty upsert batch".to_string()))
    }

    /// Record a batch of observations in one transaction.
    pub fn record_all(
        &self,
        observations: &[(ButtonSequence, Frame)],
        mode: UpsertMode,
    ) -> Result<Vec<UpsertOutcome>, XanthippeError> {
        let mut outcomes = Vec::with_capacity(observations.len());
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| XanthippeError::IoError(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(SESSIONS)
                .map_err(|e| XanthippeError::IoError(e.to_string()))?;

            for (buttons, screen) in observations {
                let current = table
                    .get(buttons.as_str())
                    .map_err(|e| XanthippeError::IoError(e.to_string()))?
                    .map(|data| CoverageRow::decode(data.value()))
                    .transpose()?;

                let outcome = match (current, mode) {
                    (None, _) => UpsertOutcome::Inserted,
                    (Some(CoverageRow { screen: None, .. }), _) => UpsertOutcome::Filled,
                    (Some(_), UpsertMode::FillGap) => UpsertOutcome::Unchanged,
                    (Some(_), UpsertMode::Force) => UpsertOutcome::Overwritten,
                };

                if outcome != UpsertOutcome::Unchanged {
                    let row = CoverageRow {
                        screen: Some(*screen),
                        requested: false,
                    };
                    table
                        .insert(buttons.as_str(), row.encode()?.as_slice())
                        .map_err(|e| XanthippeError::IoError(e.to_string()))?;
                }
                outcomes.push(outcome);
            }
        }
        write_txn
            .commit()
            .map_err(|e| XanthippeError::IoError(e.to_string()))?;
        Ok(outcomes)
    }

    /// Flag sequences as requested, inserting absent keys.
    ///
    /// Returns how many rows changed. Rows already flagged are untouched and
    /// screens are never cleared.
    pub fn request<'a, I>(&self, sequences: I) -> Result<usize, XanthippeError>
    where
        I: IntoIterator<Item = &'a ButtonSequence>,
    {
        let mut changed = 0;
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| XanthippeError::IoError(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(SESSIONS)
                .map_err(|e| XanthippeError::IoError(e.to_string()))?;

            for buttons in sequences {
                if buttons.is_empty() {
                    continue;
                }
                let mut row = table
                    .get(buttons.as_str())
                    .map_err(|e| XanthippeError::IoError(e.to_string()))?
                    .map(|data| CoverageRow::decode(data.value()))
                    .transpose()?
                    .unwrap_or_default();
                if row.requested {
                    continue;
                }
                row.requested = true;
                table
                    .insert(buttons.as_str(), row.encode()?.as_slice())
                    .map_err(|e| XanthippeError::IoError(e.to_string()))?;
                changed += 1;
            }
        }
        write_txn
            .commit()
            .map_err(|e| XanthippeError::IoError(e.to_string()))?;
        Ok(changed)
    }

    /// Flag every non-empty prefix of every sequence as requested.
    pub fn request_prefixes(&self, sequences: &[ButtonSequence]) -> Result<usize, XanthippeError> {
        let prefixes: Vec<ButtonSequence> =
            sequences.iter().flat_map(ButtonSequence::prefixes).collect();
        self.request(&prefixes)
    }

    /// Clear the screen of every row starting with `prefix`, then flag the
    /// prefix itself as requested.
    ///
    /// Returns how many screens were cleared.
    pub fn forget(&self, prefix: &ButtonSequence) -> Result<usize, XanthippeError> {
        if prefix.is_empty() {
            return Err(XanthippeError::InvalidSequence(
                "cannot forget the empty prefix".to_string(),
            ));
        }

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| XanthippeError::IoError(e.to_string()))?;
        let cleared = {
            let mut table = write_txn
                .open_table(SESSIONS)
                .map_err(|e| XanthippeError::IoError(e.to_string()))?;

            let mut covered = Vec::new();
            for entry in table
                .range(prefix.as_str()..)
                .map_err(|e| XanthippeError::IoError(e.to_string()))?
            {
                let (key, value) = entry.map_err(|e| XanthippeError::IoError(e.to_string()))?;
                if !key.value().starts_with(prefix.as_str()) {
                    break;
                }
                let row = CoverageRow::decode(value.value())?;
                if row.screen.is_some() {
                    covered.push((key.value().to_string(), row));
                }
            }

            for (key, row) in &covered {
                let row = CoverageRow {
                    screen: None,
                    ..*row
                };
                table
                    .insert(key.as_str(), row.encode()?.as_slice())
                    .map_err(|e| XanthippeError::IoError(e.to_string()))?;
            }

            let mut seed = table
                .get(prefix.as_str())
                .map_err(|e| XanthippeError::IoError(e.to_string()))?
                .map(|data| CoverageRow::decode(data.value()))
                .transpose()?
                .unwrap_or_default();
            seed.requested = true;
            table
                .insert(prefix.as_str(), seed.encode()?.as_slice())
                .map_err(|e| XanthippeError::IoError(e.to_string()))?;

            covered.len()
        };
        write_txn
            .commit()
            .map_err(|e| XanthippeError::IoError(e.to_string()))?;

        tracing::info!(prefix = %prefix, cleared, "forgot subtree");
        Ok(cleared)
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// The row for `buttons`, if stored.
    pub fn get(&self, buttons: &ButtonSequence) -> Result<Option<CoverageRecord>, XanthippeError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| XanthippeError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(SESSIONS)
            .map_err(|e| XanthippeError::IoError(e.to_string()))?;

        let row = table
            .get(buttons.as_str())
            .map_err(|e| XanthippeError::IoError(e.to_string()))?
            .map(|data| CoverageRow::decode(data.value()))
            .transpose()?;
        Ok(row.map(|row| CoverageRecord {
            buttons: buttons.clone(),
            screen: row.screen,
            requested: row.requested,
        }))
    }

    /// True if `buttons` has a recorded screen.
    pub fn is_covered(&self, buttons: &ButtonSequence) -> Result<bool, XanthippeError> {
        Ok(self
            .get(buttons)?
            .is_some_and(|record| record.is_covered()))
    }

    /// Number of rows whose key starts with `prefix`.
    pub fn count_prefix(&self, prefix: &ButtonSequence) -> Result<usize, XanthippeError> {
        Ok(self.scan(|record| record.buttons.starts_with(prefix))?.len())
    }

    /// Every row, in key order.
    pub fn records(&self) -> Result<Vec<CoverageRecord>, XanthippeError> {
        self.scan(|_| true)
    }

    /// Requested sequences without a screen, longest first, at most `limit`.
    pub fn pending_requests(&self, limit: usize) -> Result<Vec<ButtonSequence>, XanthippeError> {
        let mut pending: Vec<ButtonSequence> = self
            .scan(|record| record.requested && !record.is_covered())?
            .into_iter()
            .map(|record| record.buttons)
            .collect();
        pending.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        pending.truncate(limit);
        Ok(pending)
    }

    /// Requested sequences of at most `max_len` presses, in key order.
    pub fn requested_up_to(&self, max_len: usize) -> Result<Vec<ButtonSequence>, XanthippeError> {
        Ok(self
            .scan(|record| record.requested && record.buttons.len() <= max_len)?
            .into_iter()
            .map(|record| record.buttons)
            .collect())
    }

    /// Row counts.
    pub fn stats(&self) -> Result<CoverageStats, XanthippeError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| XanthippeError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(SESSIONS)
            .map_err(|e| XanthippeError::IoError(e.to_string()))?;

        let mut stats = CoverageStats {
            total: table
                .len()
                .map_err(|e| XanthippeError::IoError(e.to_string()))?,
            ..CoverageStats::default()
        };
        for entry in table
            .iter()
            .map_err(|e| XanthippeError::IoError(e.to_string()))?
        {
            let (_, value) = entry.map_err(|e| XanthippeError::IoError(e.to_string()))?;
            let row = CoverageRow::decode(value.value())?;
            if row.screen.is_some() {
                stats.covered += 1;
            }
            if row.requested {
                stats.requested += 1;
                if row.screen.is_none() {
                    stats.pending += 1;
                }
            }
        }
        Ok(stats)
    }

    fn scan<F>(&self, keep: F) -> Result<Vec<CoverageRecord>, XanthippeError>
    where
        F: Fn(&CoverageRecord) -> bool,
    {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| XanthippeError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(SESSIONS)
            .map_err(|e| XanthippeError::IoError(e.to_string()))?;

        let mut records = Vec::new();
        for entry in table
            .iter()
            .map_err(|e| XanthippeError::IoError(e.to_string()))?
        {
            let (key, value) = entry.map_err(|e| XanthippeError::IoError(e.to_string()))?;
            let row = CoverageRow::decode(value.value())?;
            let record = CoverageRecord {
                buttons: ButtonSequence::new(key.value())?,
                screen: row.screen,
                requested: row.requested,
            };
            if keep(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }
}

// =============================================================================
// TESTS
// =============================================================================
