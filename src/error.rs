//! Error types for transaction planning and signing

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("Missing input UTXOs")]
    MissingInputUtxos,

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Missing private key: {0}")]
    MissingPrivateKey(String),

    #[error("Invalid redeem script: {0}")]
    InvalidRedeemScript(String),

    #[error("Invalid output script: {0}")]
    InvalidOutputScript(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid chain configuration: {0}")]
    InvalidConfig(String),
}

/// Wire-level error code carried by plans and signing outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ErrorCode {
    #[default]
    Ok,
    MissingInputUtxos,
    InsufficientFunds,
    MissingPrivateKey,
    InvalidRedeemScript,
    InvalidOutputScript,
    InvalidAddress,
    InvalidAmount,
    Signing,
    Serialization,
    InvalidConfig,
}

impl SigningError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SigningError::MissingInputUtxos => ErrorCode::MissingInputUtxos,
            SigningError::InsufficientFunds(_) => ErrorCode::InsufficientFunds,
            SigningError::MissingPrivateKey(_) => ErrorCode::MissingPrivateKey,
            SigningError::InvalidRedeemScript(_) => ErrorCode::InvalidRedeemScript,
            SigningError::InvalidOutputScript(_) => ErrorCode::InvalidOutputScript,
            SigningError::InvalidAddress(_) => ErrorCode::InvalidAddress,
            SigningError::InvalidAmount(_) => ErrorCode::InvalidAmount,
            SigningError::Signing(_) => ErrorCode::Signing,
            SigningError::Serialization(_) => ErrorCode::Serialization,
            SigningError::InvalidConfig(_) => ErrorCode::InvalidConfig,
        }
    }
}

impl ErrorCode {
    pub fn is_ok(self) -> bool {
        self == ErrorCode::Ok
    }

    /// Rebuild an error from a stored code. `Ok` has no error counterpart.
    pub fn into_error(self) -> Option<SigningError> {
        let err = match self {
            ErrorCode::Ok => return None,
            ErrorCode::MissingInputUtxos => SigningError::MissingInputUtxos,
            ErrorCode::InsufficientFunds => {
                SigningError::InsufficientFunds("plan carries insufficient funds".to_string())
            }
            ErrorCode::MissingPrivateKey => {
                SigningError::MissingPrivateKey("plan carries missing private key".to_string())
            }
            ErrorCode::InvalidRedeemScript => {
                SigningError::InvalidRedeemScript("plan carries invalid redeem script".to_string())
            }
            ErrorCode::InvalidOutputScript => {
                SigningError::InvalidOutputScript("plan carries invalid output script".to_string())
            }
            ErrorCode::InvalidAddress => {
                SigningError::InvalidAddress("plan carries invalid address".to_string())
            }
            ErrorCode::InvalidAmount => {
                SigningError::InvalidAmount("plan carries invalid amount".to_string())
            }
            ErrorCode::Signing => SigningError::Signing("plan carries signing failure".to_string()),
            ErrorCode::Serialization => {
                SigningError::Serialization("plan carries serialization failure".to_string())
            }
            ErrorCode::InvalidConfig => {
                SigningError::InvalidConfig("plan carries invalid configuration".to_string())
            }
        };
        Some(err)
    }
}

pub type Result<T> = std::result::Result<T, SigningError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        let err = SigningError::InvalidAddress("bogus".to_string());
        let code = err.code();
        assert_eq!(code, ErrorCode::InvalidAddress);
        assert_eq!(code.into_error().map(|e| e.code()), Some(ErrorCode::InvalidAddress));

        let err = SigningError::InvalidAmount("byte fee -10".to_string());
        assert_eq!(err.code().into_error().map(|e| e.code()), Some(ErrorCode::InvalidAmount));
        assert_eq!(err.to_string(), "Invalid amount: byte fee -10");
    }

    #[test]
    fn test_ok_has_no_error() {
        assert!(ErrorCode::Ok.is_ok());
        assert!(ErrorCode::Ok.into_error().is_none());
        assert_eq!(ErrorCode::default(), ErrorCode::Ok);
    }

    #[test]
    fn test_error_display() {
        let err = SigningError::MissingPrivateKey("b7cd046b".to_string());
        assert_eq!(err.to_string(), "Missing private key: b7cd046b");
    }
}
