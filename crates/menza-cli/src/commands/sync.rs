use anyhow::{Result, bail};
use menza_remote::{Domains, MenzaParams};
use menza_sync::{BatchReport, Dataset, Outcome, UnitOutcome};

/// How `menza sync` treats validity windows and fingerprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRequest {
    Normal,
    Forced,
    Rebuild,
}

/// Datasets to sync when none are named: the menu list, plus everything
/// else once a subsystem is selected.
pub fn default_selection<'a>(
    domains: &'a Domains,
    params: &MenzaParams,
) -> Vec<&'a Dataset<MenzaParams>> {
    if params.subsystem.is_some() {
        domains.all().to_vec()
    } else {
        vec![&domains.menu_list]
    }
}

/// Resolve dataset names given on the command line.
pub fn select<'a>(
    domains: &'a Domains,
    params: &MenzaParams,
    names: &[String],
) -> Result<Vec<&'a Dataset<MenzaParams>>> {
    if names.is_empty() {
        return Ok(default_selection(domains, params));
    }

    names
        .iter()
        .map(|name| match domains.get(name) {
            Some(dataset) => Ok(dataset),
            None => bail!(
                "unknown dataset: {name} (expected one of: {})",
                dataset_names(domains)
            ),
        })
        .collect()
}

pub fn dataset_names(domains: &Domains) -> String {
    domains
        .all()
        .iter()
        .map(|d| d.name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Sync the selected datasets and print one line per dataset and unit.
pub async fn run(
    datasets: &[&Dataset<MenzaParams>],
    params: &MenzaParams,
    request: SyncRequest,
) -> Result<()> {
    let mut failed = 0usize;

    for dataset in datasets {
        println!("Syncing {}...", dataset.name());

        let outcome = match request {
            SyncRequest::Rebuild => dataset.rebuild(params).await,
            SyncRequest::Normal | SyncRequest::Forced => {
                let forced = request == SyncRequest::Forced;
                match dataset.sync_report(params, forced).await {
                    Some(report) => {
                        print_units(&report);
                        report.outcome
                    }
                    None => Outcome::Skipped,
                }
            }
        };

        if outcome.is_failed() {
            eprintln!("warning: {} {outcome}", dataset.name());
            failed += 1;
        } else {
            println!("{}: {outcome}", dataset.name());
        }
    }

    let total = datasets.len();
    if total > 0 && failed == total {
        bail!("all {total} datasets failed to sync");
    }
    if failed > 0 {
        eprintln!("Synced {} datasets ({failed} failed)", total - failed);
    }
    Ok(())
}

fn print_units(report: &BatchReport) {
    for unit in &report.units {
        let status = match &unit.outcome {
            UnitOutcome::Updated => "updated".to_owned(),
            UnitOutcome::Unchanged => "unchanged".to_owned(),
            UnitOutcome::Unavailable => "not available".to_owned(),
            UnitOutcome::Failed(failure) => {
                format!("failed ({}): {}", failure.kind, failure.message)
            }
        };
        println!("  {:<16} {status}", unit.resource);
    }
    if report.aborted {
        println!("  remaining units skipped");
    }
}
