//! Reconciliation of unverified references.
//!
//! Replays references spooled while the registry was unreachable, then
//! lists every unverified reference the registry holds.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tracing::{info, warn};
use we_reference::ReferenceCode;
use we_registry::Registry;

use crate::error::CliError;
use crate::output::{print_output, print_single, print_success, print_warning, OutputFormat};
use crate::pending::PendingSpool;

use super::registry::RecordRow;
use super::{open_registry, CommandContext};

#[derive(Debug, Args)]
pub struct ReconcileArgs {
    /// Only list unverified references; leave the pending file alone.
    #[arg(long)]
    list_only: bool,
}

/// Result of replaying the pending spool.
#[derive(Debug, Default, PartialEq, Eq)]
struct Replay {
    recorded: Vec<ReferenceCode>,
    /// Slots already held by another reference; their documents need a new one.
    conflicts: Vec<ReferenceCode>,
}

#[derive(Debug, Serialize)]
struct ReconcileResponse {
    recorded: Vec<String>,
    conflicts: Vec<String>,
    unverified: Vec<RecordRow>,
}

pub async fn run(ctx: CommandContext, args: ReconcileArgs) -> Result<()> {
    let config = ctx.config()?;
    let registry = open_registry(&config).await?;

    let replayed = if args.list_only {
        Replay::default()
    } else {
        replay(&registry, &PendingSpool::new(&config.pending_file)).await?
    };
    let unverified = registry.unverified().await?;

    let response = ReconcileResponse {
        recorded: replayed.recorded.iter().map(ToString::to_string).collect(),
        conflicts: replayed.conflicts.iter().map(ToString::to_string).collect(),
        unverified: unverified.iter().map(RecordRow::from).collect(),
    };

    match ctx.format {
        OutputFormat::Json => print_single(&response),
        OutputFormat::Table => {
            if !response.recorded.is_empty() {
                print_success(&format!(
                    "Recorded {} pending reference(s)",
                    response.recorded.len()
                ));
            }
            for reference in &response.conflicts {
                print_warning(&format!(
                    "{reference} collides with an issued reference; give its document a new one"
                ));
            }
            print_output(&response.unverified, ctx.format);
        }
    }
    Ok(())
}

/// Records every spooled reference as unverified.
///
/// Conflicting entries are reported and dropped. If the registry fails
/// midway, entries not yet recorded stay in the spool.
async fn replay(registry: &Registry, spool: &PendingSpool) -> Result<Replay> {
    let mut result = Replay::default();
    let mut pending = spool.load()?.into_iter();

    while let Some(entry) = pending.next() {
        match registry.record(&entry.reference, false).await {
            Ok(()) => {
                info!(reference = %entry.reference, "Recorded pending reference");
                result.recorded.push(entry.reference);
            }
            Err(e) if e.is_duplicate() => {
                if already_recorded(registry, &entry.reference).await? {
                    result.recorded.push(entry.reference);
                } else {
                    warn!(
                        reference = %entry.reference,
                        "Pending reference conflicts with registry"
                    );
                    result.conflicts.push(entry.reference);
                }
            }
            Err(e) => {
                let mut left = vec![entry];
                left.extend(pending);
                spool.replace(&left)?;
                return Err(CliError::RegistryUnavailable(e.to_string()).into());
            }
        }
    }

    spool.replace(&[])?;
    Ok(result)
}

/// Whether an earlier, interrupted replay already recorded `reference`.
async fn already_recorded(registry: &Registry, reference: &ReferenceCode) -> Result<bool> {
    let record = registry.find(&reference.to_string()).await?;
    Ok(record.is_some_and(|record| !record.verified && &record.reference == reference))
}

#[cfg(test)]
mod tests {
    use super::*;
    use we_registry::DbConfig;

    fn code(text: &str) -> ReferenceCode {
        ReferenceCode::parse(text).unwrap()
    }

    #[tokio::test]
    async fn replays_spool_and_reports_conflicts() {
        let registry = Registry::open(&DbConfig::in_memory()).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let spool = PendingSpool::new(dir.path().join("pending.jsonl"));

        // Verified reference issued after the registry came back, same slot.
        registry
            .record(&code("FAC-20250902-143027-9123"), true)
            .await
            .unwrap();
        // Left behind by an interrupted replay.
        registry
            .record(&code("FAC-20250902-143027-9777"), false)
            .await
            .unwrap();

        spool.push(&code("FAC-20250902-143027-9123-COPIE001")).unwrap();
        spool.push(&code("FAC-20250902-143027-9456")).unwrap();
        spool.push(&code("FAC-20250902-143027-9777")).unwrap();

        let result = replay(&registry, &spool).await.unwrap();
        assert_eq!(
            result,
            Replay {
                recorded: vec![
                    code("FAC-20250902-143027-9456"),
                    code("FAC-20250902-143027-9777"),
                ],
                conflicts: vec![code("FAC-20250902-143027-9123-COPIE001")],
            }
        );
        assert!(spool.load().unwrap().is_empty());

        let unverified: Vec<String> = registry
            .unverified()
            .await
            .unwrap()
            .iter()
            .map(|record| record.reference.to_string())
            .collect();
        assert_eq!(unverified.len(), 2);
        assert!(unverified.contains(&"FAC-20250902-143027-9456".to_string()));

        assert_eq!(replay(&registry, &spool).await.unwrap(), Replay::default());
    }

    #[tokio::test]
    async fn failed_replay_keeps_spool() {
        let registry = Registry::open(&DbConfig::in_memory()).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let spool = PendingSpool::new(dir.path().join("pending.jsonl"));
        spool.push(&code("LIV-20250902-143027-9001")).unwrap();
        spool.push(&code("LIV-20250902-143027-9002")).unwrap();

        registry.pool().close().await;
        let err = replay(&registry, &spool).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::RegistryUnavailable(_))
        ));
        assert_eq!(spool.load().unwrap().len(), 2);
    }
}
