//! Reference generation.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tracing::{info, warn};
use we_reference::{
    DocumentType, FallbackPolicy, Issued, MemorySource, ReferenceGenerator, StoreError,
};
use we_registry::Registry;

use crate::error::CliError;
use crate::output::{print_single, print_success, print_warning, OutputFormat};
use crate::pending::PendingSpool;

use super::{open_registry, CommandContext};

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Document type (quotation, supplier_order, client_order, ...).
    document_type: DocumentType,

    /// Variant suffix appended after the sequence (e.g. COPIE001).
    #[arg(long)]
    suffix: Option<String>,

    /// Only compute the next reference; do not record it.
    #[arg(long)]
    dry_run: bool,

    /// Issue an unverified reference if the registry cannot be reached.
    #[arg(long)]
    allow_unverified: bool,
}

/// What to generate and how hard to try.
#[derive(Debug, Clone)]
struct Request<'a> {
    document_type: DocumentType,
    suffix: Option<&'a str>,
    dry_run: bool,
    policy: FallbackPolicy,
    max_attempts: u32,
}

/// Where a generated reference ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum Storage {
    /// Dry run.
    NotRecorded,
    Registry,
    /// Spooled for `refctl reconcile`.
    Pending,
}

#[derive(Debug)]
struct Outcome {
    issued: Issued,
    storage: Storage,
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    reference: String,
    document_type: DocumentType,
    verified: bool,
    storage: Storage,
}

pub async fn run(ctx: CommandContext, args: GenerateArgs) -> Result<()> {
    let config = ctx.config()?;
    let request = Request {
        document_type: args.document_type,
        suffix: args.suffix.as_deref(),
        dry_run: args.dry_run,
        policy: if args.allow_unverified {
            FallbackPolicy::AllowUnverified
        } else {
            config.fallback
        },
        max_attempts: config.max_attempts,
    };

    let registry = open_registry(&config).await;
    let spool = PendingSpool::new(&config.pending_file);
    let outcome = generate_reference(registry, &spool, &request).await?;

    print_outcome(ctx.format, request.document_type, &outcome, &spool);
    Ok(())
}

/// Generates against the registry, or into the pending spool when the
/// registry could not be opened and the policy allows it.
async fn generate_reference(
    registry: Result<Registry>,
    spool: &PendingSpool,
    request: &Request<'_>,
) -> Result<Outcome> {
    let registry = match registry {
        Ok(registry) => registry,
        Err(e) if request.policy == FallbackPolicy::AllowUnverified => {
            warn!(error = %e, "Registry unavailable, issuing unverified reference");
            return issue_unverified(spool, request).await;
        }
        Err(e) => return Err(e),
    };

    let generator = ReferenceGenerator::new(registry.clone())
        .fallback_policy(request.policy)
        .max_attempts(request.max_attempts);

    if request.dry_run {
        let issued = generator
            .generate_or_unverified(request.document_type, request.suffix)
            .await
            .map_err(CliError::from)?;
        return Ok(Outcome {
            issued,
            storage: Storage::NotRecorded,
        });
    }

    let issued = generator
        .issue(request.document_type, request.suffix, |issued| {
            let registry = registry.clone();
            async move {
                registry
                    .record(issued.code(), issued.is_verified())
                    .await
                    .map_err(StoreError::from)?;
                Ok(issued)
            }
        })
        .await
        .map_err(CliError::from)?;

    info!(reference = %issued.code(), "Reference recorded");
    Ok(Outcome {
        issued,
        storage: Storage::Registry,
    })
}

/// Draws an unverified reference and spools it, retrying past codes that
/// are already pending.
async fn issue_unverified(spool: &PendingSpool, request: &Request<'_>) -> Result<Outcome> {
    let generator = ReferenceGenerator::new(MemorySource::unavailable())
        .fallback_policy(FallbackPolicy::AllowUnverified)
        .max_attempts(request.max_attempts);

    if request.dry_run {
        let issued = generator
            .generate_or_unverified(request.document_type, request.suffix)
            .await
            .map_err(CliError::from)?;
        return Ok(Outcome {
            issued,
            storage: Storage::NotRecorded,
        });
    }

    let issued = generator
        .issue(request.document_type, request.suffix, |issued| {
            let pushed = spool.push(issued.code());
            async move {
                match pushed {
                    Ok(true) => Ok(issued),
                    Ok(false) => Err(StoreError::Duplicate(issued.code().to_string())),
                    Err(e) => Err(StoreError::Unavailable(format!("{e:#}"))),
                }
            }
        })
        .await
        .map_err(CliError::from)?;

    Ok(Outcome {
        issued,
        storage: Storage::Pending,
    })
}

fn print_outcome(
    format: OutputFormat,
    document_type: DocumentType,
    outcome: &Outcome,
    spool: &PendingSpool,
) {
    let response = GenerateResponse {
        reference: outcome.issued.code().to_string(),
        document_type,
        verified: outcome.issued.is_verified(),
        storage: outcome.storage,
    };

    match format {
        OutputFormat::Json => print_single(&response),
        OutputFormat::Table => {
            match outcome.storage {
                Storage::Registry => print_success(&format!("Issued {}", response.reference)),
                Storage::NotRecorded | Storage::Pending => println!("{}", response.reference),
            }
            if outcome.storage == Storage::Pending {
                print_warning(&format!(
                    "Registry unreachable; reference saved to {} as unverified. \
                     Run `refctl reconcile` once the registry is back.",
                    spool.path().display()
                ));
            } else if !response.verified {
                print_warning("Reference is unverified; run `refctl reconcile` to review it.");
            }
        }
    }
}
