//! Document type table.

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;
use we_reference::DocumentType;

use crate::output::print_output;

use super::CommandContext;

#[derive(Debug, Serialize, Tabled)]
struct PrefixRow {
    #[tabled(rename = "Document type")]
    document_type: &'static str,

    #[tabled(rename = "Prefix")]
    prefix: &'static str,

    #[tabled(rename = "Legacy short")]
    legacy_short_prefix: &'static str,
}

fn rows() -> Vec<PrefixRow> {
    DocumentType::ALL
        .iter()
        .map(|t| PrefixRow {
            document_type: t.as_str(),
            prefix: t.prefix(),
            legacy_short_prefix: t.legacy_short_prefix(),
        })
        .collect()
}

pub fn run(ctx: CommandContext) -> Result<()> {
    print_output(&rows(), ctx.format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_cover_every_document_type() {
        let rows = rows();
        assert_eq!(rows.len(), 11);
        assert_eq!(rows[0].prefix, "DEV");
        assert_eq!(rows[9].document_type, "production");
        assert_eq!(rows[9].prefix, "PROD");
    }
}
