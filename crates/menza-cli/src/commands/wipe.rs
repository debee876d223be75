use anyhow::Result;
use menza_store::SqliteStore;

/// Delete every cached record, fingerprint, and validity window.
pub fn run(store: &SqliteStore) -> Result<()> {
    store.wipe()?;
    println!("Local cache wiped.");
    Ok(())
}
