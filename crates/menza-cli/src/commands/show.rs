use anyhow::Result;
use menza_remote::MenzaParams;
use menza_store::SqliteStore;
use menza_sync::{Dataset, Outcome};

use super::format;

/// Bring `dataset` up to date if its window has expired, then print what the
/// cache holds. A failed refresh falls back to cached data.
pub async fn run(
    store: &SqliteStore,
    dataset: &Dataset<MenzaParams>,
    params: &MenzaParams,
) -> Result<()> {
    match dataset.sync(params, false).await {
        Outcome::Failed(failure) => {
            eprintln!(
                "warning: could not refresh {}: {failure}. Showing cached data.",
                dataset.name()
            );
        }
        Outcome::Unavailable => {
            println!("{} is not available.", dataset.name());
            return Ok(());
        }
        Outcome::Success | Outcome::Skipped => {}
    }

    let mut first = true;
    for set in dataset.record_sets(params) {
        let records = store.records(&set)?;
        if records.is_empty() {
            continue;
        }

        if !first {
            println!();
        }
        first = false;

        println!("{} ({})", set.collection, records.len());
        for record in &records {
            println!("{}", format::render(&set.collection, record)?);
        }
    }

    if first {
        println!("No cached data for {}.", dataset.name());
    }
    Ok(())
}
