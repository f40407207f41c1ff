use illdb_shard::SetOutcome;
use tracing::debug;

/// A successful write prints nothing; the outcome only goes to the log.
pub fn report(docid: &str, outcome: &SetOutcome) {
    debug!(
        docid,
        size = outcome.size,
        compressed = outcome.compressed,
        rows_affected = outcome.rows_affected,
        "document written"
    );
}
