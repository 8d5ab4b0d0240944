//! Read-side commands. Each writes JSON lines to `out` and reports whether
//! anything was found; "not found" is never an error.

use std::io::Write;

use ibcscan_store::{AsyncBlockStore, BlockRecordStore};
use ibcscan_types::{BlockHash, BlockRecord, Timestamp};
use ibcscan_utils::format_duration;

fn write_record(out: &mut impl Write, record: &BlockRecord) -> anyhow::Result<()> {
    serde_json::to_writer(&mut *out, record)?;
    writeln!(out)?;
    Ok(())
}

/// Print the highest block. An empty store prints a note and still succeeds.
pub async fn latest<S>(store: &AsyncBlockStore<S>, out: &mut impl Write) -> anyhow::Result<()>
where
    S: BlockRecordStore + Send + Sync + 'static,
{
    match store.find_latest_block().await? {
        Some(record) => {
            let age = record.time.elapsed_since(Timestamp::now());
            tracing::info!(
                height = record.height,
                age = %format_duration(age),
                "latest block"
            );
            write_record(out, &record)?;
        }
        None => writeln!(out, "store is empty")?,
    }
    Ok(())
}

pub async fn get<S>(
    store: &AsyncBlockStore<S>,
    hash: BlockHash,
    out: &mut impl Write,
) -> anyhow::Result<bool>
where
    S: BlockRecordStore + Send + Sync + 'static,
{
    match store.find_by_hash(hash).await? {
        Some(record) => {
            write_record(out, &record)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

pub async fn at_height<S>(
    store: &AsyncBlockStore<S>,
    height: u64,
    out: &mut impl Write,
) -> anyhow::Result<bool>
where
    S: BlockRecordStore + Send + Sync + 'static,
{
    let records = store.find_by_height(height).await?;
    for record in &records {
        write_record(out, record)?;
    }
    Ok(!records.is_empty())
}

pub async fn recent<S>(
    store: &AsyncBlockStore<S>,
    limit: usize,
    out: &mut impl Write,
) -> anyhow::Result<bool>
where
    S: BlockRecordStore + Send + Sync + 'static,
{
    let records = store.recent_blocks(limit).await?;
    for record in &records {
        write_record(out, record)?;
    }
    Ok(!records.is_empty())
}

pub async fn count<S>(store: &AsyncBlockStore<S>, out: &mut impl Write) -> anyhow::Result<u64>
where
    S: BlockRecordStore + Send + Sync + 'static,
{
    let count = store.block_count().await?;
    writeln!(out, "{count}")?;
    Ok(count)
}
