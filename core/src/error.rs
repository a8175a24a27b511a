//! Error types for draft construction.
//!
//! Every fallible step of a build returns a [`BuildError`]. The variants are
//! grouped into seven [`ErrorKind`]s so callers (and receipts) can react to a
//! class of failure without matching on every variant.

use std::fmt;

use thiserror::Error;

use crate::codec::draft::SignMode;
use crate::draft::DraftHandle;
use crate::finalize::HashServiceError;
use crate::ledger::types::OutPoint;
use crate::selection::SelectionError;

/// Coarse classification of a [`BuildError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The wire document is not valid JSON for the draft schema.
    Parse,
    /// A field violates the schema (length, encoding, unknown tag, empty draft).
    Validation,
    /// The draft handle is unknown to the calling execution.
    NotFound,
    /// UTXO selection failed or no sponsor UTXO covers the fee.
    Selection,
    /// Mode-specific parameters are missing.
    Policy,
    /// The transaction cannot be sealed or encoded.
    Finalize,
    /// The hash service is unreachable or rejected the transaction.
    HashService,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse => write!(f, "parse"),
            Self::Validation => write!(f, "validation"),
            Self::NotFound => write!(f, "not_found"),
            Self::Selection => write!(f, "selection"),
            Self::Policy => write!(f, "policy"),
            Self::Finalize => write!(f, "finalize"),
            Self::HashService => write!(f, "hash_service"),
        }
    }
}

/// Errors that can occur while turning a draft into an unsigned transaction.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The draft document could not be decoded.
    #[error("failed to parse draft document: {0}")]
    Parse(#[source] serde_json::Error),

    /// A type-specific JSON payload (intent params, output metadata) is malformed.
    #[error("malformed {context}: {source}")]
    MalformedPayload {
        /// Which payload failed to decode.
        context: &'static str,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// A field has the wrong length, encoding or value.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// `sign_mode` is not one of the four supported modes.
    #[error("invalid sign mode: {0}")]
    UnknownSignMode(String),

    /// Output `type` is not asset, resource or state.
    #[error("unsupported output type: {0}")]
    UnsupportedOutputType(String),

    /// Resource `category` has no mapping.
    #[error("unsupported resource category: {0}")]
    UnsupportedCategory(String),

    /// Intent `type` is not supported.
    #[error("unsupported intent type: {0}")]
    UnsupportedIntent(String),

    /// A contract-token output was requested outside a contract execution.
    #[error("contract token output requires the executing contract address")]
    MissingContractAddress,

    /// The draft has no inputs, outputs or intents.
    #[error("empty transaction: draft has no inputs, outputs or intents")]
    EmptyDraft,

    /// A mutation was attempted on a sealed draft.
    #[error("draft {0} is sealed and can no longer be modified")]
    DraftSealed(DraftHandle),

    /// The open-draft cap has been reached.
    #[error("draft limit reached: {limit} drafts already open")]
    TooManyDrafts {
        /// Configured cap.
        limit: usize,
    },

    /// Appending would exceed a per-transaction limit.
    #[error("too many {what} in draft: limit is {limit}")]
    TxLimitExceeded {
        /// "inputs" or "outputs".
        what: &'static str,
        /// Configured limit.
        limit: usize,
    },

    /// An input would spend an outpoint the draft already spends.
    #[error("outpoint {0} is already spent by this draft")]
    DuplicateInput(OutPoint),

    /// The handle is unknown, already released, or owned by another execution.
    #[error("draft {0} not found")]
    DraftNotFound(DraftHandle),

    /// The UTXO selector failed.
    #[error(transparent)]
    Selection(#[from] SelectionError),

    /// The sponsor pool returned no UTXOs at all.
    #[error("no available UTXO in sponsor pool")]
    SponsorPoolEmpty,

    /// No sponsor UTXO carries a native-coin amount covering the fee.
    #[error("no UTXO with sufficient amount in sponsor pool to cover fee {fee}")]
    NoSufficientSponsorUtxo {
        /// Fee that had to be covered, as supplied.
        fee: String,
    },

    /// The sign mode needs a parameter block the draft did not provide.
    #[error("{mode} mode requires {param}")]
    MissingPolicyParams {
        /// Mode being applied.
        mode: SignMode,
        /// Name of the missing metadata block.
        param: &'static str,
    },

    /// Finalization found neither inputs nor outputs.
    #[error("empty transaction: no inputs and no outputs to finalize")]
    EmptyTransaction,

    /// Canonical serialization failed.
    #[error("failed to encode transaction: {0}")]
    Encoding(#[from] bincode::Error),

    /// The hash service could not be reached.
    #[error(transparent)]
    HashService(#[from] HashServiceError),

    /// The hash service reported the transaction structure as invalid.
    #[error("transaction structure is invalid")]
    InvalidTransactionStructure,
}

impl BuildError {
    /// Shorthand for [`BuildError::InvalidField`].
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    /// Returns the class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse(_) => ErrorKind::Parse,
            Self::MalformedPayload { .. }
            | Self::InvalidField { .. }
            | Self::UnknownSignMode(_)
            | Self::UnsupportedOutputType(_)
            | Self::UnsupportedCategory(_)
            | Self::UnsupportedIntent(_)
            | Self::MissingContractAddress
            | Self::EmptyDraft
            | Self::DraftSealed(_)
            | Self::TooManyDrafts { .. }
            | Self::TxLimitExceeded { .. }
            | Self::DuplicateInput(_) => ErrorKind::Validation,
            Self::DraftNotFound(_) => ErrorKind::NotFound,
            Self::Selection(_) | Self::SponsorPoolEmpty | Self::NoSufficientSponsorUtxo { .. } => {
                ErrorKind::Selection
            }
            Self::MissingPolicyParams { .. } => ErrorKind::Policy,
            Self::EmptyTransaction | Self::Encoding(_) => ErrorKind::Finalize,
            Self::HashService(_) | Self::InvalidTransactionStructure => ErrorKind::HashService,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_errors_mention_empty_transaction() {
        assert!(BuildError::EmptyDraft.to_string().contains("empty transaction"));
        assert!(BuildError::EmptyTransaction
            .to_string()
            .contains("empty transaction"));
    }

    #[test]
    fn sponsor_errors_are_distinct() {
        let empty = BuildError::SponsorPoolEmpty.to_string();
        let short = BuildError::NoSufficientSponsorUtxo { fee: "100".into() }.to_string();
        assert_eq!(empty, "no available UTXO in sponsor pool");
        assert_ne!(empty, short);
        assert!(short.contains("no UTXO with sufficient amount"));
    }

    #[test]
    fn kinds_cover_taxonomy() {
        assert_eq!(BuildError::EmptyDraft.kind(), ErrorKind::Validation);
        assert_eq!(BuildError::EmptyTransaction.kind(), ErrorKind::Finalize);
        assert_eq!(BuildError::SponsorPoolEmpty.kind(), ErrorKind::Selection);
        assert_eq!(
            BuildError::DuplicateInput(OutPoint::new([1; 32], 0)).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            BuildError::MissingPolicyParams {
                mode: SignMode::Paymaster,
                param: "paymaster_params"
            }
            .kind(),
            ErrorKind::Policy
        );
        assert_eq!(
            BuildError::InvalidTransactionStructure.kind(),
            ErrorKind::HashService
        );
    }

    #[test]
    fn missing_params_message_names_mode() {
        let err = BuildError::MissingPolicyParams {
            mode: SignMode::Delegated,
            param: "delegation_params",
        };
        assert_eq!(err.to_string(), "delegated mode requires delegation_params");
    }
}
