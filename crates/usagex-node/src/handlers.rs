//! HTTP endpoints of a ledger node.
//!
//! Reads are open. `POST /settle` is open as well, since the operator's
//! attestation already binds the user and funds only move to the treasury and
//! back to that user. Everything that would be `msg.sender`-gated on a chain
//! goes through `POST /calls` as a [`SignedCall`]. `POST /attest` takes a
//! signed [`Call::Attest`](crate::call_auth::Call::Attest) and only answers the
//! ledger's current operator.
//!
//! | Method | Path | Body / Query | Response |
//! |--------|------|--------------|----------|
//! | GET | `/health` | | `{"status":"ok"}` |
//! | GET | `/config` | | [`LedgerInfoResponse`] |
//! | GET | `/accounts/{user}` | | [`AccountResponse`] |
//! | GET | `/settlement-hashes` | [`SettlementHashesQuery`] | [`SettlementHashesResponse`] |
//! | POST | `/settle` | [`SettleRequest`] | [`SettleResponse`] |
//! | POST | `/calls` | [`SignedCall`] | [`CallResponse`] |
//! | GET | `/token/{holder}` | | [`TokenHoldingResponse`] |
//! | POST | `/attest` | [`SignedCall`] | [`AttestResponse`] |
//!
//! Failures are rendered as [`ErrorResponse`](usagex_types::proto::ErrorResponse).

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use usagex_types::address::ChecksummedAddress;
use usagex_types::proto::{
    AccountResponse, AttestResponse, LedgerInfoResponse, SettleRequest,
    SettleResponse, SettlementHashesQuery, SettlementHashesResponse, TokenHoldingResponse,
};
use usagex_types::timestamp::UnixTimestamp;
use usagex_types::util::format_token_units;

use crate::call_auth::SignedCall;
use crate::error::NodeError;
use crate::node::{CallResponse, LedgerNode};

pub fn routes() -> Router<Arc<LedgerNode>> {
    Router::new()
        .route("/health", get(get_health))
        .route("/config", get(get_config))
        .route("/accounts/{user}", get(get_account))
        .route("/settlement-hashes", get(get_settlement_hashes))
        .route("/settle", post(post_settle))
        .route("/calls", post(post_call))
        .route("/token/{holder}", get(get_token_holding))
        .route("/attest", post(post_attest))
}

#[tracing::instrument(skip_all)]
pub async fn get_health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[tracing::instrument(skip_all)]
pub async fn get_config(State(node): State<Arc<LedgerNode>>) -> Json<LedgerInfoResponse> {
    Json(node.info().await)
}

#[tracing::instrument(skip_all)]
pub async fn get_account(
    State(node): State<Arc<LedgerNode>>,
    Path(user): Path<ChecksummedAddress>,
) -> Json<AccountResponse> {
    Json(node.account(user.0).await)
}

/// Diagnostic: the two hashes behind a settlement attestation, so an
/// operator integration can compare its own canonicalization.
#[tracing::instrument(skip_all)]
pub async fn get_settlement_hashes(
    State(node): State<Arc<LedgerNode>>,
    Query(query): Query<SettlementHashesQuery>,
) -> Json<SettlementHashesResponse> {
    Json(node.settlement_hashes(&query))
}

#[tracing::instrument(skip_all)]
pub async fn post_settle(
    State(node): State<Arc<LedgerNode>>,
    Json(body): Json<SettleRequest>,
) -> Result<Json<SettleResponse>, NodeError> {
    let response = node.settle(&body).await?;
    let decimals = node.ledger().medium().decimals();
    tracing::info!(
        user = %body.user,
        used = %format_token_units(response.used_amount, decimals),
        refund = %format_token_units(response.refund_amount, decimals),
        "Settled"
    );
    Ok(Json(response))
}

#[tracing::instrument(skip_all)]
pub async fn post_call(
    State(node): State<Arc<LedgerNode>>,
    Json(body): Json<SignedCall>,
) -> Result<Json<CallResponse>, NodeError> {
    let response = node.execute(&body, UnixTimestamp::now()).await?;
    Ok(Json(response))
}

#[tracing::instrument(skip_all)]
pub async fn get_token_holding(
    State(node): State<Arc<LedgerNode>>,
    Path(holder): Path<ChecksummedAddress>,
) -> Result<Json<TokenHoldingResponse>, NodeError> {
    Ok(Json(node.token_holding(holder.0).await?))
}

#[tracing::instrument(skip_all)]
pub async fn post_attest(
    State(node): State<Arc<LedgerNode>>,
    Json(body): Json<SignedCall>,
) -> Result<Json<AttestResponse>, NodeError> {
    Ok(Json(node.attest(&body, UnixTimestamp::now()).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256, U256, address, b256};
    use alloy_signer_local::PrivateKeySigner;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde::de::DeserializeOwned;
    use tower::ServiceExt;
    use usagex_ledger::attestor::OperatorAttestor;
    use usagex_ledger::{LedgerIdentity, MemoryToken, SettlementLedger};
    use usagex_types::proto::ErrorResponse;

    use crate::call_auth::Call;

    const LEDGER: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");
    const TOKEN: Address = address!("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512");
    const TREASURY: Address = address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8");
    const OPERATOR_KEY: B256 =
        b256!("0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80");

    struct Harness {
        router: Router,
        node: Arc<LedgerNode>,
        owner: PrivateKeySigner,
        user: PrivateKeySigner,
        operator: OperatorAttestor,
    }

    async fn harness(with_attestor: bool) -> Harness {
        let owner = PrivateKeySigner::random();
        let user = PrivateKeySigner::random();
        let operator = OperatorAttestor::from_private_key(&OPERATOR_KEY).unwrap();
        let ledger = SettlementLedger::new(
            LedgerIdentity::new(LEDGER, 31337),
            MemoryToken::new(TOKEN, 6),
            TOKEN,
            TREASURY,
            operator.address(),
            owner.address(),
        )
        .unwrap();
        let mut node = LedgerNode::new(ledger);
        if with_attestor {
            node = node.with_attestor(operator.clone());
        }
        node.mint(user.address(), U256::from(1_000_000_000_000u64))
            .await
            .unwrap();
        let node = Arc::new(node);
        let router = routes().with_state(node.clone());
        Harness {
            router,
            node,
            owner,
            user,
            operator,
        }
    }

    impl Harness {
        async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            (status, body.to_vec())
        }

        async fn get<T: DeserializeOwned>(&self, uri: &str) -> (StatusCode, T) {
            let request = Request::get(uri).body(Body::empty()).unwrap();
            let (status, body) = self.send(request).await;
            (status, serde_json::from_slice(&body).unwrap())
        }

        async fn post<T: DeserializeOwned>(
            &self,
            uri: &str,
            body: &impl serde::Serialize,
        ) -> (StatusCode, T) {
            let request = Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(body).unwrap()))
                .unwrap();
            let (status, body) = self.send(request).await;
            (status, serde_json::from_slice(&body).unwrap())
        }

        fn signed(&self, signer: &PrivateKeySigner, call: Call) -> SignedCall {
            SignedCall::sign(
                signer,
                &self.node.ledger().identity(),
                call,
                UnixTimestamp::now() + 300,
            )
            .unwrap()
        }

        async fn call(
            &self,
            signer: &PrivateKeySigner,
            call: Call,
        ) -> (StatusCode, serde_json::Value) {
            self.post("/calls", &self.signed(signer, call)).await
        }

        fn attest_call(&self, used: u64) -> Call {
            Call::Attest {
                user: self.user.address().into(),
                used_amount: U256::from(used),
            }
        }

        async fn deposit(&self, amount: u64) {
            let amount = U256::from(amount);
            let (status, _) = self.call(&self.user, Call::Approve { amount }).await;
            assert_eq!(status, StatusCode::OK);
            let (status, body) = self.call(&self.user, Call::Deposit { amount }).await;
            assert_eq!(status, StatusCode::OK, "{body}");
            assert_eq!(body["event"]["event"], "Deposit");
        }

        fn settle_request(&self, used: u64, nonce: u64) -> SettleRequest {
            let user = self.user.address();
            let signature = self
                .operator
                .sign_settlement(
                    &self.node.ledger().identity(),
                    user,
                    U256::from(used),
                    U256::from(nonce),
                )
                .unwrap();
            SettleRequest {
                user: user.into(),
                used_amount: U256::from(used),
                nonce: U256::from(nonce),
                signature,
            }
        }
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness(false).await;
        let (status, body): (_, serde_json::Value) = h.get("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_config_reports_identity_and_admin() {
        let h = harness(false).await;
        let (status, info): (_, LedgerInfoResponse) = h.get("/config").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(info.chain_id, 31337);
        assert_eq!(info.ledger.0, LEDGER);
        assert_eq!(info.token_decimals, 6);
        assert_eq!(info.operator.0, h.operator.address());
        assert_eq!(info.owner.0, h.owner.address());
    }

    #[tokio::test]
    async fn test_deposit_then_settle_over_http() {
        let h = harness(false).await;
        h.deposit(100_000_000).await;

        let uri = format!("/accounts/{}", h.user.address());
        let (_, account): (_, AccountResponse) = h.get(&uri).await;
        assert_eq!(account.balance, U256::from(100_000_000u64));
        assert_eq!(account.nonce, U256::ZERO);

        let (status, settled): (_, SettleResponse) =
            h.post("/settle", &h.settle_request(30_000_000, 0)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(settled.refund_amount, U256::from(70_000_000u64));
        assert_eq!(settled.nonce, U256::from(1u8));

        let (_, treasury): (_, TokenHoldingResponse) =
            h.get(&format!("/token/{TREASURY}")).await;
        assert_eq!(treasury.balance, U256::from(30_000_000u64));

        let (_, account): (_, AccountResponse) = h.get(&uri).await;
        assert_eq!(account.balance, U256::ZERO);
        assert_eq!(account.nonce, U256::from(1u8));
    }

    #[tokio::test]
    async fn test_replayed_settlement_rejected() {
        let h = harness(false).await;
        h.deposit(100).await;
        let request = h.settle_request(30, 0);
        let (status, _): (_, SettleResponse) = h.post("/settle", &request).await;
        assert_eq!(status, StatusCode::OK);

        h.deposit(100).await;
        let (status, error): (_, ErrorResponse) = h.post("/settle", &request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error.reason, "invalid_signature");
    }

    #[tokio::test]
    async fn test_settle_without_balance() {
        let h = harness(false).await;
        let (status, error): (_, ErrorResponse) =
            h.post("/settle", &h.settle_request(0, 0)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error.reason, "insufficient_balance");
    }

    #[tokio::test]
    async fn test_settlement_hashes_match_ledger() {
        let h = harness(false).await;
        let user = h.user.address();
        let uri = format!("/settlement-hashes?user={user}&usedAmount=30&nonce=0");
        let (status, hashes): (_, SettlementHashesResponse) = h.get(&uri).await;
        assert_eq!(status, StatusCode::OK);
        let expected = h
            .node
            .ledger()
            .settlement_hashes(user, U256::from(30u8), U256::ZERO);
        assert_eq!(hashes.message_hash, expected.message_hash);
        assert_eq!(hashes.prefixed_signed_hash, expected.prefixed_signed_hash);
    }

    #[tokio::test]
    async fn test_admin_call_requires_owner() {
        let h = harness(false).await;
        let new_treasury = address!("0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC");
        let call = Call::SetTreasury {
            address: new_treasury.into(),
        };

        let (status, body) = h.call(&h.user, call).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["reason"], "not_owner");

        let (status, body) = h.call(&h.owner, call).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["event"]["event"], "TreasuryUpdated");
        assert_eq!(h.node.ledger().treasury().await, new_treasury);
    }

    #[tokio::test]
    async fn test_replayed_call_unauthorized() {
        let h = harness(false).await;
        let signed = SignedCall::sign(
            &h.user,
            &h.node.ledger().identity(),
            Call::Approve {
                amount: U256::from(5u8),
            },
            UnixTimestamp::now() + 300,
        )
        .unwrap();
        let (status, _): (_, serde_json::Value) = h.post("/calls", &signed).await;
        assert_eq!(status, StatusCode::OK);
        let (status, error): (_, ErrorResponse) = h.post("/calls", &signed).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error.reason, "call_replayed");
    }

    #[tokio::test]
    async fn test_deposit_without_allowance() {
        let h = harness(false).await;
        let (status, body) = h
            .call(
                &h.user,
                Call::Deposit {
                    amount: U256::from(10u8),
                },
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["reason"], "token_insufficient_allowance");
    }

    fn operator_wallet() -> PrivateKeySigner {
        PrivateKeySigner::from_bytes(&OPERATOR_KEY).unwrap()
    }

    #[tokio::test]
    async fn test_attest_disabled_by_default() {
        let h = harness(false).await;
        let request = h.signed(&operator_wallet(), h.attest_call(1));
        let (status, error): (_, ErrorResponse) = h.post("/attest", &request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error.reason, "attestor_disabled");
    }

    #[tokio::test]
    async fn test_attest_requires_signed_call() {
        let h = harness(true).await;
        let bare = serde_json::json!({
            "user": h.user.address().to_checksum(None),
            "usedAmount": "1",
        });
        let request = Request::post("/attest")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&bare).unwrap()))
            .unwrap();
        let (status, _) = h.send(request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_attest_rejects_non_operator() {
        let h = harness(true).await;
        h.deposit(50).await;

        let request = h.signed(&h.user, h.attest_call(50));
        let (status, error): (_, ErrorResponse) = h.post("/attest", &request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(error.reason, "not_operator");

        let mut impersonated = h.signed(&h.user, h.attest_call(50));
        impersonated.caller = h.operator.address().into();
        let (status, error): (_, ErrorResponse) = h.post("/attest", &impersonated).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error.reason, "call_bad_signature");
    }

    #[tokio::test]
    async fn test_attest_not_accepted_as_call() {
        let h = harness(true).await;
        let (status, body) = h.call(&operator_wallet(), h.attest_call(1)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["reason"], "unexpected_call");

        let deposit = h.signed(&operator_wallet(), Call::Deposit { amount: U256::from(1u8) });
        let (status, error): (_, ErrorResponse) = h.post("/attest", &deposit).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error.reason, "unexpected_call");
    }

    #[tokio::test]
    async fn test_attested_settlement() {
        let h = harness(true).await;
        h.deposit(50).await;
        let request = h.signed(&operator_wallet(), h.attest_call(20));
        let (status, attested): (_, AttestResponse) = h.post("/attest", &request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(attested.nonce, U256::ZERO);

        let settle = SettleRequest {
            user: attested.user,
            used_amount: attested.used_amount,
            nonce: attested.nonce,
            signature: attested.signature,
        };
        let (status, settled): (_, SettleResponse) = h.post("/settle", &settle).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(settled.refund_amount, U256::from(30u8));
    }
}
