//! Validation and inspection of reference strings.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;
use we_reference::{extract_info, is_standardized_format, Classification};

use crate::error::CliError;
use crate::output::{print_output, print_single, print_success, OutputFormat};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Reference text to check.
    reference: String,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Reference text to inspect.
    reference: String,
}

#[derive(Debug, Default, PartialEq, Serialize)]
struct InspectResponse {
    input: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    document_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prefix: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    suffix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    legacy_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl InspectResponse {
    fn from_classification(input: &str, classification: &Classification) -> Self {
        let mut response = Self {
            input: input.to_string(),
            status: classification.label(),
            document_type: classification.document_type().map(|t| t.to_string()),
            ..Default::default()
        };

        match classification {
            Classification::Standardized(code) => {
                response.prefix = Some(code.prefix());
                response.date = Some(code.date().format("%Y-%m-%d").to_string());
                response.time = Some(code.time().format("%H:%M:%S").to_string());
                response.sequence = Some(code.sequence().value());
                response.suffix = code.suffix().map(|s| s.to_string());
            }
            Classification::Legacy(legacy) => {
                response.legacy_kind = Some(legacy.kind.as_str());
            }
            Classification::Malformed(failure) => {
                response.reason_code = Some(failure.reason_code());
                response.reason = Some(failure.to_string());
            }
        }

        response
    }

    fn rows(&self) -> Vec<FieldRow> {
        let fields = [
            ("Input", Some(self.input.clone())),
            ("Status", Some(self.status.to_string())),
            ("Document type", self.document_type.clone()),
            ("Prefix", self.prefix.map(str::to_string)),
            ("Date", self.date.clone()),
            ("Time", self.time.clone()),
            ("Sequence", self.sequence.map(|s| format!("{s:04}"))),
            ("Suffix", self.suffix.clone()),
            ("Legacy format", self.legacy_kind.map(str::to_string)),
            ("Reason", self.reason.clone()),
        ];

        fields
            .into_iter()
            .filter_map(|(field, value)| value.map(|value| FieldRow { field, value }))
            .collect()
    }
}

#[derive(Debug, Serialize, Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: &'static str,

    #[tabled(rename = "Value")]
    value: String,
}

pub fn check(ctx: CommandContext, args: CheckArgs) -> Result<()> {
    let standardized = is_standardized_format(&args.reference);

    if ctx.format == OutputFormat::Json {
        print_single(&serde_json::json!({
            "reference": args.reference,
            "standardized": standardized,
        }));
    } else if standardized {
        print_success(&format!("{} is a standardized reference", args.reference));
    }

    if !standardized {
        return Err(CliError::NotStandardized(args.reference).into());
    }
    Ok(())
}

pub fn inspect(ctx: CommandContext, args: InspectArgs) -> Result<()> {
    let classification = extract_info(&args.reference);
    let response = InspectResponse::from_classification(&args.reference, &classification);

    match ctx.format {
        OutputFormat::Json => print_single(&response),
        OutputFormat::Table => print_output(&response.rows(), ctx.format),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inspect_text(text: &str) -> InspectResponse {
        InspectResponse::from_classification(text, &extract_info(text))
    }

    #[test]
    fn standardized_fields() {
        let response = inspect_text("FPF-20250902-143027-0001-COPIE001");
        assert_eq!(response.status, "standardized");
        assert_eq!(response.document_type.as_deref(), Some("finished_product"));
        assert_eq!(response.date.as_deref(), Some("2025-09-02"));
        assert_eq!(response.time.as_deref(), Some("14:30:27"));
        assert_eq!(response.sequence, Some(1));
        assert_eq!(response.suffix.as_deref(), Some("COPIE001"));
    }

    #[test]
    fn legacy_fields() {
        let response = inspect_text("BC16/2025");
        assert_eq!(response.status, "legacy");
        assert_eq!(response.legacy_kind, Some("supplier_order_year"));
        assert_eq!(response.document_type.as_deref(), Some("supplier_order"));
        assert_eq!(response.sequence, None);
    }

    #[test]
    fn malformed_fields() {
        let response = inspect_text("DEV-20251302-143027-0001");
        assert_eq!(response.status, "malformed");
        assert_eq!(response.reason_code, Some("invalid_date"));
        assert_eq!(response.rows().len(), 3);
    }
}
