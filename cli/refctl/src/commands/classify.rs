//! Migration audit: classify stored references in bulk.
//!
//! Feed it an export of a reference column (one value per line) to see how
//! many rows are standardized, legacy or malformed before migrating. With
//! `--preview`, every non-standardized value is paired with the reference
//! it would be rewritten to, carrying the old text as its suffix.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::TimeDelta;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;
use we_reference::{
    extract_info, Census, CensusClass, Clock, DocumentType, ManualClock, MemorySource,
    ReferenceCode, ReferenceError, ReferenceGenerator, Suffix, SystemClock, DEFAULT_SAMPLE_LIMIT,
};

use crate::error::CliError;
use crate::output::{print_info, print_output, print_single, print_success, OutputFormat};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct ClassifyArgs {
    /// File with one reference per line (reads stdin when omitted).
    file: Option<PathBuf>,

    /// Number of sample values shown per class.
    #[arg(long, default_value_t = DEFAULT_SAMPLE_LIMIT)]
    samples: usize,

    /// Show the standardized reference each value would get as this
    /// document type. Nothing is recorded.
    #[arg(long, value_name = "DOCUMENT_TYPE")]
    preview: Option<DocumentType>,
}

type PreviewGenerator = ReferenceGenerator<MemorySource, ManualClock>;

#[derive(Debug, Serialize, Tabled)]
struct PreviewRow {
    #[tabled(rename = "Current")]
    current: String,

    #[tabled(rename = "Status")]
    status: &'static str,

    #[tabled(rename = "Suggested")]
    suggested: String,
}

impl PreviewRow {
    fn changes(&self) -> bool {
        self.current != self.suggested
    }
}

#[derive(Debug, Serialize)]
struct PreviewResponse {
    document_type: DocumentType,
    total: usize,
    changed: usize,
    rows: Vec<PreviewRow>,
}

#[derive(Debug, Serialize, Tabled)]
struct ClassRow {
    #[tabled(rename = "Class")]
    class: &'static str,

    #[tabled(rename = "Count")]
    count: usize,

    #[tabled(rename = "Samples")]
    samples: String,
}

/// Classifies every line of `reader`.
fn census_from_reader<R: BufRead>(reader: R, sample_limit: usize) -> io::Result<Census> {
    let mut census = Census::new(sample_limit);
    for line in reader.lines() {
        census.observe(&line?);
    }
    Ok(census)
}

/// Pairs every non-blank line with its suggested replacement.
///
/// Standardized values are kept. Suggestions come from `generator`, whose
/// in-memory source keeps them unique within the run.
async fn preview_from_reader<R: BufRead>(
    reader: R,
    document_type: DocumentType,
    generator: &PreviewGenerator,
) -> Result<Vec<PreviewRow>> {
    let mut rows = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let value = line.trim();
        let Some(suffix) = Suffix::normalized(value) else {
            continue;
        };

        let classification = extract_info(value);
        let suggested = match classification.reference() {
            Some(code) => code.to_string(),
            None => {
                let code = suggest(generator, document_type, &suffix).await?;
                generator.source().record(&code)?;
                code.to_string()
            }
        };

        rows.push(PreviewRow {
            current: value.to_string(),
            status: classification.label(),
            suggested,
        });
    }

    Ok(rows)
}

/// Generates in the generator's current second, moving on to the next one
/// when it is full.
async fn suggest(
    generator: &PreviewGenerator,
    document_type: DocumentType,
    suffix: &Suffix,
) -> Result<ReferenceCode> {
    loop {
        match generator.generate(document_type, Some(suffix.as_str())).await {
            Ok(code) => return Ok(code),
            Err(ReferenceError::SequenceExhausted { .. }) => {
                generator.clock().advance(TimeDelta::seconds(1));
            }
            Err(e) => return Err(CliError::from(e).into()),
        }
    }
}

fn rows(census: &Census) -> Vec<ClassRow> {
    [
        CensusClass::Standardized,
        CensusClass::Legacy,
        CensusClass::Malformed,
        CensusClass::Empty,
    ]
    .into_iter()
    .map(|class| ClassRow {
        class: class.as_str(),
        count: census.count(class),
        samples: census.samples(class).join("; "),
    })
    .collect()
}

pub async fn run(ctx: CommandContext, args: ClassifyArgs) -> Result<()> {
    if let Some(document_type) = args.preview {
        return run_preview(ctx, args.file, document_type).await;
    }

    let census = match &args.file {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
            census_from_reader(BufReader::new(file), args.samples)
                .with_context(|| format!("Failed to read {:?}", path))?
        }
        None => census_from_reader(io::stdin().lock(), args.samples)
            .context("Failed to read references from stdin")?,
    };

    match ctx.format {
        OutputFormat::Json => print_single(&census),
        OutputFormat::Table => {
            print_output(&rows(&census), ctx.format);
            for (kind, count) in &census.legacy_kinds {
                print_info(&format!("legacy {kind}: {count}"));
            }
            if census.is_fully_standardized() {
                print_success(&format!("All {} references are standardized", census.standardized));
            }
        }
    }
    Ok(())
}

async fn run_preview(
    ctx: CommandContext,
    file: Option<PathBuf>,
    document_type: DocumentType,
) -> Result<()> {
    let generator = ReferenceGenerator::with_clock(
        MemorySource::new(),
        ManualClock::new(SystemClock.now()),
    );
    let rows = match &file {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
            preview_from_reader(BufReader::new(file), document_type, &generator)
                .await
                .with_context(|| format!("Failed to preview {:?}", path))?
        }
        None => preview_from_reader(io::stdin().lock(), document_type, &generator)
            .await
            .context("Failed to preview references from stdin")?,
    };

    let response = PreviewResponse {
        document_type,
        total: rows.len(),
        changed: rows.iter().filter(|row| row.changes()).count(),
        rows,
    };

    match ctx.format {
        OutputFormat::Json => print_single(&response),
        OutputFormat::Table => {
            print_output(&response.rows, ctx.format);
            print_info(&format!(
                "{} of {} references would change (preview only, nothing recorded)",
                response.changed, response.total
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn classifies_file_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "DEV-20250902-143027-0001").unwrap();
        writeln!(file, "BC16/2025").unwrap();
        writeln!(file, "DV001").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "DEV-20251302-143027-0001").unwrap();

        let reader = BufReader::new(File::open(file.path()).unwrap());
        let census = census_from_reader(reader, 1).unwrap();

        assert_eq!(census.total, 5);
        assert_eq!(census.standardized, 1);
        assert_eq!(census.legacy, 2);
        assert_eq!(census.empty, 1);
        assert_eq!(census.malformed, 1);

        let rows = rows(&census);
        assert_eq!(rows[1].class, "legacy");
        assert_eq!(rows[1].samples, "BC16/2025");
    }

    fn preview_generator() -> PreviewGenerator {
        let start = chrono::NaiveDate::from_ymd_opt(2025, 9, 2)
            .unwrap()
            .and_hms_opt(14, 30, 27)
            .unwrap();
        ReferenceGenerator::with_clock(MemorySource::new(), ManualClock::new(start))
    }

    #[tokio::test]
    async fn preview_suggests_replacements() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "BC-20250902-101500-0001").unwrap();
        writeln!(file, "BC16/2025").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "DV001").unwrap();
        writeln!(file, "old ref").unwrap();

        let generator = preview_generator();
        let reader = BufReader::new(File::open(file.path()).unwrap());
        let rows = preview_from_reader(reader, DocumentType::SupplierOrder, &generator)
            .await
            .unwrap();

        let pairs: Vec<(&str, &str, &str)> = rows
            .iter()
            .map(|row| (row.current.as_str(), row.status, row.suggested.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("BC-20250902-101500-0001", "standardized", "BC-20250902-101500-0001"),
                ("BC16/2025", "legacy", "BC-20250902-143027-0001-BC16_2025"),
                ("DV001", "legacy", "BC-20250902-143027-0002-DV001"),
                ("old ref", "malformed", "BC-20250902-143027-0003-old_ref"),
            ]
        );
        assert_eq!(rows.iter().filter(|row| row.changes()).count(), 3);
        assert_eq!(generator.source().len(), 3);
    }

    #[tokio::test]
    async fn preview_moves_to_next_second_when_full() {
        let generator = preview_generator();
        for sequence in we_reference::Sequence::all() {
            let code = ReferenceCode::new(
                DocumentType::Invoice,
                generator.clock().now(),
                sequence,
                None,
            );
            generator.source().record(&code).unwrap();
        }

        let rows = preview_from_reader("42\n".as_bytes(), DocumentType::Invoice, &generator)
            .await
            .unwrap();
        assert_eq!(rows[0].suggested, "FAC-20250902-143028-0001-42");
    }
}
