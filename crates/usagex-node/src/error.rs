//! Errors surfaced by the node and their HTTP rendering.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use usagex_ledger::attestor::AttestorError;
use usagex_ledger::{LedgerError, TokenError};
use usagex_types::proto::ErrorResponse;

use crate::call_auth::CallAuthError;

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    CallAuth(#[from] CallAuthError),
    #[error("This node does not attest settlements")]
    AttestorDisabled,
    #[error("Only the ledger operator may request attestations")]
    NotOperator,
    #[error("A {0} call is not accepted on this route")]
    UnexpectedCall(&'static str),
    #[error(transparent)]
    Attestor(#[from] AttestorError),
}

impl NodeError {
    pub fn reason(&self) -> &'static str {
        match self {
            NodeError::Ledger(e) => e.reason(),
            NodeError::Token(e) => e.reason(),
            NodeError::CallAuth(e) => e.reason(),
            NodeError::AttestorDisabled => "attestor_disabled",
            NodeError::NotOperator => "not_operator",
            NodeError::UnexpectedCall(_) => "unexpected_call",
            NodeError::Attestor(_) => "attestor_failure",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            NodeError::Ledger(e) => match e {
                LedgerError::ZeroAmount
                | LedgerError::ZeroAddress
                | LedgerError::InvalidSignature => StatusCode::BAD_REQUEST,
                LedgerError::NotOwner => StatusCode::FORBIDDEN,
                LedgerError::InsufficientBalance
                | LedgerError::UsedExceedsBalance
                | LedgerError::Transfer(_) => StatusCode::UNPROCESSABLE_ENTITY,
            },
            NodeError::Token(TokenError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            NodeError::Token(TokenError::ZeroRecipient) => StatusCode::BAD_REQUEST,
            NodeError::Token(_) => StatusCode::UNPROCESSABLE_ENTITY,
            NodeError::CallAuth(_) => StatusCode::UNAUTHORIZED,
            NodeError::AttestorDisabled => StatusCode::NOT_FOUND,
            NodeError::NotOperator => StatusCode::FORBIDDEN,
            NodeError::UnexpectedCall(_) => StatusCode::BAD_REQUEST,
            NodeError::Attestor(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for NodeError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::warn!(error = %self, reason = self.reason(), "Request rejected");
        }
        let body = ErrorResponse {
            reason: self.reason().to_string(),
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            NodeError::from(LedgerError::InvalidSignature).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            NodeError::from(LedgerError::NotOwner).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            NodeError::from(LedgerError::UsedExceedsBalance).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            NodeError::from(CallAuthError::Replayed).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(NodeError::AttestorDisabled.status(), StatusCode::NOT_FOUND);
        assert_eq!(NodeError::NotOperator.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            NodeError::UnexpectedCall("attest").status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_reason_passes_through() {
        assert_eq!(
            NodeError::from(LedgerError::InsufficientBalance).reason(),
            LedgerError::InsufficientBalance.reason()
        );
        assert_eq!(
            NodeError::from(CallAuthError::BadSignature).reason(),
            "call_bad_signature"
        );
    }
}
