//! Batched row transfer into a destination insert.
//!
//! [`BatchWriter`] wraps one prepared insert and queues each row as a batch
//! entry, flushing every `batch_size` rows. [`BatchWriter::drain`] pulls a
//! whole origin result set through it.

use tracing::debug;

use crate::core::{Connection, Parameters, Rows};
use crate::error::{MigrateError, Result};
use crate::sql::{PreparedSql, SqlTemplate};

/// Default rows per batch when neither the step nor the run overrides it.
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Batching wrapper around a prepared destination insert.
///
/// The insert statement is released when the writer is dropped, which
/// [`drain`](BatchWriter::drain) and [`finish`](BatchWriter::finish) do on
/// every exit path.
#[derive(Debug)]
pub struct BatchWriter<'c> {
    insert: PreparedSql<'c>,
    batch_size: usize,
    count: u64,
    flushes: u64,
}

impl<'c> BatchWriter<'c> {
    /// Wrap an already prepared insert.
    pub fn new(insert: PreparedSql<'c>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(MigrateError::Validation(format!(
                "Invalid batch size: {batch_size}"
            )));
        }
        Ok(Self {
            insert,
            batch_size,
            count: 0,
            flushes: 0,
        })
    }

    /// Prepare `template` on `connection` and wrap it.
    ///
    /// No values are bound up front; each row supplies its own.
    pub fn prepare(
        template: &SqlTemplate,
        connection: &'c dyn Connection,
        batch_size: usize,
    ) -> Result<Self> {
        let insert = template.prepare(connection, &Parameters::new())?;
        Self::new(insert, batch_size)
    }

    /// Rows queued so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Batches sent so far.
    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Queue one row.
    ///
    /// Names are resolved against `row` first, then `constants`; neither map
    /// is modified. The batch is flushed whenever the row count reaches a
    /// multiple of the batch size.
    pub fn add(&mut self, constants: &Parameters, row: &Parameters) -> Result<()> {
        let row_number = self.count + 1;

        self.insert
            .bind(|name| row.get(name).or_else(|| constants.get(name)))
            .map_err(|e| {
                MigrateError::execution(
                    format!("binding row {row_number} into:\n{}", self.insert.sql()),
                    e,
                )
            })?;
        self.insert.add_batch().map_err(|e| {
            MigrateError::execution(
                format!("queueing row {row_number} into:\n{}", self.insert.sql()),
                e,
            )
        })?;

        self.count += 1;
        if self.count % self.batch_size as u64 == 0 {
            self.flush()?;
        }
        Ok(())
    }

    /// Send every row of `rows`, then flush the remainder.
    ///
    /// Column labels are lower-cased to form parameter names. Both the result
    /// set and the insert statement are released before this returns.
    /// Returns the total row count, including rows queued earlier with
    /// [`add`](BatchWriter::add).
    pub fn drain(mut self, mut rows: Box<dyn Rows + '_>, constants: &Parameters) -> Result<u64> {
        let labels: Vec<String> = rows
            .column_labels()
            .iter()
            .map(|label| label.to_lowercase())
            .collect();

        loop {
            let values = rows.next_row().map_err(|e| {
                MigrateError::execution(format!("reading row {} from origin", self.count + 1), e)
            })?;
            let Some(values) = values else { break };

            let row: Parameters = labels.iter().cloned().zip(values).collect();
            self.add(constants, &row)?;
        }
        drop(rows);

        self.finish()
    }

    /// Flush any partial batch and release the statement.
    pub fn finish(mut self) -> Result<u64> {
        if self.count % self.batch_size as u64 != 0 {
            self.flush()?;
        }
        debug!(
            "Wrote {} rows in {} batches into: {}",
            self.count,
            self.flushes,
            self.insert.sql()
        );
        Ok(self.count)
    }

    fn flush(&mut self) -> Result<()> {
        let written = self.insert.execute_batch().map_err(|e| {
            MigrateError::execution(
                format!("flushing batch ending at row {} into:\n{}", self.count, self.insert.sql()),
                e,
            )
        })?;
        self.flushes += 1;
        debug!("Flushed batch {} ({} rows affected)", self.flushes, written);
        Ok(())
    }
}
