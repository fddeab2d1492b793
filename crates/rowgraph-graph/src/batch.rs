//! Splitting row sources into write batches and dispatching them.

use std::ops::Range;

use rowgraph_core::{Row, RowSource, Value};
use rowgraph_cypher::{Statement, ROWS_PARAM};
use serde::Serialize;

use crate::client::GraphError;
use crate::connector::Connector;
use crate::session::{Params, SessionProvider};

/// Outcome of a bulk write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub batches: usize,
    pub rows: usize,
    /// Whether the batches were dispatched to the worker pool.
    pub parallel: bool,
}

/// Partition `0..len` into contiguous ranges of at most `batch_size` rows.
pub fn batch_ranges(len: usize, batch_size: usize) -> Result<Vec<Range<usize>>, GraphError> {
    if batch_size == 0 {
        return Err(GraphError::Validation("batch size must be positive".into()));
    }
    Ok((0..len)
        .step_by(batch_size)
        .map(|start| start..(start + batch_size).min(len))
        .collect())
}

/// The `$rows` parameter of a bulk statement.
pub fn rows_param(rows: Vec<Row>) -> Params {
    let rows = rows.into_iter().map(Value::List).collect();
    Params::from([(ROWS_PARAM.to_string(), Value::List(rows))])
}

impl<P: SessionProvider> Connector<P> {
    /// Write `source` with `statement`, `batch_size` rows at a time.
    ///
    /// Sequential batches run one after the other, each in its own session.
    /// Parallel batches run in a parallelism scope of their own; the call
    /// returns once all of them finished.
    pub async fn run_batches<S>(
        &self,
        source: &S,
        statement: &Statement,
        batch_size: usize,
        parallel: bool,
    ) -> Result<BatchReport, GraphError>
    where
        S: RowSource + ?Sized,
    {
        let ranges = batch_ranges(source.len(), batch_size)?;
        let report = BatchReport {
            batches: ranges.len(),
            rows: source.len(),
            parallel,
        };

        if parallel {
            self.with_parallelism(|conn| async move {
                for range in ranges {
                    // Results of bulk writes are not inspected; failures
                    // surface when the scope exits.
                    conn.parallel_write_query(statement.clone(), rows_param(source.rows(range)))?;
                }
                Ok::<_, GraphError>(())
            })
            .await?;
        } else {
            for (i, range) in ranges.into_iter().enumerate() {
                tracing::trace!(batch = i, rows = range.len(), "Writing batch");
                self.write_query(statement.clone(), rows_param(source.rows(range)))
                    .await?;
            }
        }

        tracing::debug!(
            batches = report.batches,
            rows = report.rows,
            parallel,
            "Batches written"
        );
        Ok(report)
    }
}
