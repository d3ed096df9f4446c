//! Error handling and display for the CLI.

use colored::Colorize;
use thiserror::Error;
use we_reference::{IssueError, ReferenceError};

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Reference registry unavailable: {0}")]
    RegistryUnavailable(String),

    #[error("'{0}' is not a standardized reference")]
    NotStandardized(String),

    #[error("Reference not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Reference(#[from] ReferenceError),

    #[error(transparent)]
    Issue(#[from] IssueError),
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    if let Some(hint) = err.downcast_ref::<CliError>().and_then(hint_for) {
        eprintln!("\n{}", format!("Hint: {hint}").yellow());
    }
}

fn hint_for(err: &CliError) -> Option<&'static str> {
    match err {
        CliError::RegistryUnavailable(_) => {
            Some("Check --database-url / REFCTL_DATABASE_URL, or pass --allow-unverified.")
        }
        CliError::Reference(e) | CliError::Issue(IssueError::Generate(e)) => reference_hint(e),
        CliError::Issue(IssueError::RetriesExhausted { .. }) => {
            Some("Another writer keeps claiming the same slot. Retry the save.")
        }
        CliError::NotStandardized(_) => {
            Some("Run `refctl inspect` to see why, or whether it is a known legacy format.")
        }
        _ => None,
    }
}

fn reference_hint(err: &ReferenceError) -> Option<&'static str> {
    match err {
        ReferenceError::SequenceExhausted { .. } => Some("Wait a second and retry."),
        ReferenceError::InvalidSuffix(_) => {
            Some("Suffixes may only contain letters, digits, '_' and '.'.")
        }
        ReferenceError::UnknownDocumentType(_) | ReferenceError::UnknownPrefix(_) => {
            Some("Run `refctl prefixes` to list document types.")
        }
        ReferenceError::PersistenceUnavailable(_) => {
            Some("The registry could not be queried. Retry, or pass --allow-unverified.")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhaustion_hint() {
        let err = CliError::Reference(ReferenceError::SequenceExhausted {
            prefix: "DEV",
            stamp: "20250902-143027".into(),
        });
        assert_eq!(hint_for(&err), Some("Wait a second and retry."));
    }

    #[test]
    fn test_issue_wraps_reference_hint() {
        let err = CliError::Issue(IssueError::Generate(ReferenceError::UnknownPrefix(
            "MAT".into(),
        )));
        assert!(hint_for(&err).unwrap().contains("refctl prefixes"));
    }
}
