use crate::commands::MutationResult;
use std::fmt;
use thiserror::Error;

/// Every failure surfaced by the client.
///
/// The type is `Clone` because a single in-flight status fetch hands the same
/// outcome to every caller that joined it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("supra api request to {url} failed{}: {detail}", status_suffix(.status))]
    Transport {
        url: String,
        status: Option<u16>,
        detail: String,
    },

    #[error("malformed payload from {url}: {reason}")]
    MalformedPayload { url: String, reason: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(
        "command {command} (step {step}/{total}) exited with code {returncode}: {detail}{}",
        CompletedSteps(.completed)
    )]
    CommandExecution {
        step: usize,
        total: usize,
        command: String,
        returncode: i32,
        detail: String,
        completed: Vec<CompletedStep>,
    },

    /// A later step could not be submitted after earlier steps already
    /// changed remote state.
    #[error(
        "command {command} (step {step}/{total}) failed: {cause}{}",
        CompletedSteps(.completed)
    )]
    PartiallyApplied {
        step: usize,
        total: usize,
        command: String,
        cause: Box<Error>,
        completed: Vec<CompletedStep>,
    },
}

impl Error {
    /// Malformed bodies propagate like any other transport failure.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport { .. } | Error::MalformedPayload { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_command_execution(&self) -> bool {
        matches!(
            self,
            Error::CommandExecution { .. } | Error::PartiallyApplied { .. }
        )
    }

    /// Steps of a multi-step command that were applied before this failure.
    pub fn completed_steps(&self) -> &[CompletedStep] {
        match self {
            Error::CommandExecution { completed, .. }
            | Error::PartiallyApplied { completed, .. } => completed,
            _ => &[],
        }
    }

    pub(crate) fn malformed(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        Error::MalformedPayload {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error(
        "{field} mismatch: server expects {expected}, got {supplied} (off by {})",
        signed_difference(.expected, .supplied)
    )]
    FieldMismatch {
        field: &'static str,
        expected: u128,
        supplied: u128,
    },

    #[error("status payload is missing the calculated {field}; check the monitoring config")]
    MissingExpectation { field: &'static str },

    #[error("distribution must total 10000 bps, got {total}")]
    DistributionSum { total: u64 },

    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("{}", join_mismatches(.0))]
    Mismatches(Vec<ValidationError>),
}

impl ValidationError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}

/// A step that already changed remote state before a later step failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedStep {
    pub command: String,
    pub result: MutationResult,
}

struct CompletedSteps<'a>(&'a [CompletedStep]);

impl fmt::Display for CompletedSteps<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in self.0 {
            write!(
                f,
                " ({} already applied, tx {})",
                step.command, step.result.tx_hash
            )?;
        }
        Ok(())
    }
}

fn signed_difference(expected: &u128, supplied: &u128) -> String {
    if supplied >= expected {
        format!("+{}", supplied - expected)
    } else {
        format!("-{}", expected - supplied)
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|code| format!(" with {code}")).unwrap_or_default()
}

fn join_mismatches(items: &[ValidationError]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[allow(non_snake_case)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display__command_execution_names_step_and_prior_tx() {
        // given
        let error = Error::CommandExecution {
            step: 2,
            total: 2,
            command: "configure-vrf-request".to_string(),
            returncode: 1,
            detail: "request failed".to_string(),
            completed: vec![CompletedStep {
                command: "configure-vrf-gas".to_string(),
                result: MutationResult {
                    tx_hash: "0xabc".to_string(),
                    submitted_at: "2024-06-02T00:00:00.000Z".to_string(),
                },
            }],
        };

        // when
        let message = error.to_string();

        // then
        assert_eq!(
            message,
            "command configure-vrf-request (step 2/2) exited with code 1: request failed \
             (configure-vrf-gas already applied, tx 0xabc)"
        );
    }

    #[test]
    fn display__field_mismatch_reports_difference() {
        // given
        let error = ValidationError::FieldMismatch {
            field: "maxGasFee",
            expected: 2000,
            supplied: 1999,
        };

        // when
        let message = Error::from(error).to_string();

        // then
        assert_eq!(
            message,
            "maxGasFee mismatch: server expects 2000, got 1999 (off by -1)"
        );
    }

    #[test]
    fn is_transport__includes_malformed_payloads() {
        let error = Error::malformed("http://localhost:8000/status", "not an object");
        assert!(error.is_transport());
        assert!(!error.is_validation());
    }
}
