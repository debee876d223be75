use anyhow::Result;
use chrono::FixedOffset;
use menza_remote::{Domains, MenzaParams};
use menza_store::SqliteStore;

use super::format::format_timestamp;

/// Print the validity state of every dataset for `params`, then any other
/// scopes the cache still holds.
pub fn run(
    store: &SqliteStore,
    domains: &Domains,
    params: &MenzaParams,
    offset: &FixedOffset,
) -> Result<()> {
    println!("{:<16} {:<22} {:<18} State", "Dataset", "Scope", "Last updated");

    let mut shown = Vec::new();
    for dataset in domains.all() {
        let key = dataset.validity_key(params);
        let last = dataset.last_confirmed(params)?;
        let state = match (last, dataset.is_fresh(params)) {
            (None, _) => "never synced",
            (Some(_), true) => "fresh",
            (Some(_), false) => "stale",
        };

        println!(
            "{:<16} {:<22} {:<18} {state}",
            dataset.name(),
            key.scope,
            format_timestamp(last, offset)
        );
        shown.push(key);
    }

    let others: Vec<_> = store
        .validity_entries()?
        .into_iter()
        .filter(|(key, _)| !shown.contains(key))
        .collect();

    if !others.is_empty() {
        println!("\nOther cached scopes:");
        for (key, at) in others {
            println!(
                "{:<16} {:<22} {}",
                key.dataset,
                key.scope,
                format_timestamp(Some(at), offset)
            );
        }
    }

    Ok(())
}
