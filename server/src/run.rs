//! Ledger bootstrap and the CLI subcommands.

use axum::Router;
use axum::http::Method;
use clap::Parser;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors;
use usagex_ledger::attestor::{AttestorError, OperatorAttestor};
use usagex_ledger::{LedgerError, LedgerIdentity, MemoryToken, SettlementLedger};
use usagex_node::util::SigDown;
use usagex_node::{LedgerNode, NodeError, handlers};
use usagex_types::util::MoneyAmountParseError;

#[cfg(feature = "telemetry")]
use usagex_node::util::Telemetry;

use crate::config::{CliArgs, Command, Config, ConfigError, SettlementArgs};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Invalid ledger setup: {0}")]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Attestor(#[from] AttestorError),
    #[error("Invalid amount: {0}")]
    Amount(#[from] MoneyAmountParseError),
    #[error(transparent)]
    Node(#[from] NodeError),
    #[error("No operatorKey configured")]
    MissingOperatorKey,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Parses the command line and dispatches to the selected subcommand.
pub async fn run() -> Result<(), RunError> {
    dotenv().ok();
    let cli_args = CliArgs::parse();
    let config = Config::load(&cli_args.config)?;
    match cli_args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::SignSettlement(args) => {
            println!("{}", sign_settlement(&config, &args)?);
            Ok(())
        }
        Command::Hashes(args) => {
            let (message_hash, prefixed_signed_hash) = settlement_hashes(&config, &args)?;
            println!("messageHash:        {message_hash}");
            println!("prefixedSignedHash: {prefixed_signed_hash}");
            Ok(())
        }
    }
}

/// Builds the node described by `config`: ledger, initial mints and, when an
/// operator key is configured, the attestor behind `POST /attest`.
pub async fn build_node(config: &Config) -> Result<LedgerNode, RunError> {
    let token = config.token();
    let token_address = token.address.inner().0;
    let ledger = SettlementLedger::new(
        identity(config),
        MemoryToken::new(token_address, token.decimals),
        token_address,
        config.treasury().0,
        config.operator().0,
        config.owner().0,
    )?;
    let mut node = LedgerNode::new(ledger);

    if let Some(key) = config.operator_key() {
        let attestor = OperatorAttestor::from_private_key(key.as_b256())?;
        if attestor.address() != config.operator().0 {
            tracing::warn!(
                key_address = %attestor.address(),
                operator = %config.operator(),
                "operatorKey does not belong to the configured operator; its attestations will be rejected"
            );
        }
        node = node.with_attestor(attestor);
    }

    for (holder, amount) in &token.mints {
        let units = amount.to_token_units(token.decimals)?;
        node.mint(holder.0, units).await?;
        tracing::info!(%holder, %amount, "Minted");
    }
    Ok(node)
}

async fn serve(config: Config) -> Result<(), RunError> {
    #[cfg(feature = "telemetry")]
    let telemetry_layer = {
        let telemetry = Telemetry::new()
            .with_name(env!("CARGO_PKG_NAME"))
            .with_version(env!("CARGO_PKG_VERSION"))
            .register();
        telemetry.http_tracing()
    };

    let node = Arc::new(build_node(&config).await?);
    tracing::info!(
        ledger = %config.ledger_address(),
        chain_id = config.chain_id(),
        attestor = node.attestor().is_some(),
        "Ledger ready"
    );

    let http_endpoints = Router::new().merge(handlers::routes().with_state(node));
    #[cfg(feature = "telemetry")]
    let http_endpoints = http_endpoints.layer(telemetry_layer);
    let http_endpoints = http_endpoints.layer(
        cors::CorsLayer::new()
            .allow_origin(cors::Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(cors::Any),
    );

    let addr = SocketAddr::new(config.host(), config.port());
    tracing::info!("Starting server at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .inspect_err(|e| tracing::error!("Failed to bind to {}: {}", addr, e))?;

    let sig_down = SigDown::try_new()?;
    let axum_cancellation_token = sig_down.cancellation_token();
    let axum_graceful_shutdown = async move { axum_cancellation_token.cancelled().await };
    axum::serve(listener, http_endpoints)
        .with_graceful_shutdown(axum_graceful_shutdown)
        .await?;
    Ok(())
}

fn identity(config: &Config) -> LedgerIdentity {
    LedgerIdentity::new(config.ledger_address().0, config.chain_id())
}

fn sign_settlement(config: &Config, args: &SettlementArgs) -> Result<String, RunError> {
    let key = config.operator_key().ok_or(RunError::MissingOperatorKey)?;
    let attestor = OperatorAttestor::from_private_key(key.as_b256())?;
    let used_amount = args.used.to_token_units(config.token().decimals)?;
    let signature =
        attestor.sign_settlement(&identity(config), args.user.0, used_amount, args.nonce)?;
    Ok(signature.to_string())
}

fn settlement_hashes(
    config: &Config,
    args: &SettlementArgs,
) -> Result<(String, String), RunError> {
    let used_amount = args.used.to_token_units(config.token().decimals)?;
    let hashes = identity(config)
        .attestation(args.user.0, used_amount, args.nonce)
        .hashes();
    Ok((
        hashes.message_hash.to_string(),
        hashes.prefixed_signed_hash.to_string(),
    ))
}
