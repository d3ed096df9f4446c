//! Registry commands: list, show and retire issued references.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;
use we_reference::DocumentType;
use we_registry::IssuedRecord;

use crate::error::CliError;
use crate::output::{print_output, print_success};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Document type to list.
    document_type: DocumentType,

    /// Maximum number of references to return.
    #[arg(long, default_value = "20")]
    limit: u32,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Reference to look up.
    reference: String,
}

#[derive(Debug, Args)]
pub struct RetireArgs {
    /// Reference whose document was deleted.
    reference: String,
}

#[derive(Debug, Serialize, Tabled)]
pub(super) struct RecordRow {
    #[tabled(rename = "Reference")]
    reference: String,

    #[tabled(rename = "Type")]
    document_type: String,

    #[tabled(rename = "Verified")]
    verified: bool,

    #[tabled(rename = "Issued at")]
    issued_at: String,
}

impl From<&IssuedRecord> for RecordRow {
    fn from(record: &IssuedRecord) -> Self {
        Self {
            reference: record.reference.to_string(),
            document_type: record.reference.document_type().to_string(),
            verified: record.verified,
            issued_at: record.issued_at.to_rfc3339(),
        }
    }
}

pub async fn list(ctx: CommandContext, args: ListArgs) -> Result<()> {
    let registry = ctx.registry().await?;
    let records = registry.list(args.document_type, args.limit).await?;
    let rows: Vec<RecordRow> = records.iter().map(RecordRow::from).collect();
    print_output(&rows, ctx.format);
    Ok(())
}

pub async fn show(ctx: CommandContext, args: ShowArgs) -> Result<()> {
    let registry = ctx.registry().await?;
    let record = registry
        .find(&args.reference)
        .await?
        .ok_or_else(|| CliError::NotFound(args.reference.clone()))?;
    let rows = vec![RecordRow::from(&record)];
    print_output(&rows, ctx.format);
    Ok(())
}

pub async fn retire(ctx: CommandContext, args: RetireArgs) -> Result<()> {
    let registry = ctx.registry().await?;
    if !registry.retire(&args.reference).await? {
        return Err(CliError::NotFound(args.reference).into());
    }
    print_success(&format!("Retired {}", args.reference));
    Ok(())
}
