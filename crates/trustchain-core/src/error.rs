//! Error type for the engine façade.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("signer error: {0}")]
    Signer(#[from] trustchain_signer::SignerError),

    #[error("chain error: {0}")]
    Chain(#[from] trustchain_chain::ChainError),

    #[error("pki error: {0}")]
    Pki(#[from] trustchain_pki::PkiError),

    #[error("registry error: {0}")]
    Registry(#[from] trustchain_registry::RegistryError),

    #[error("PKI is not enabled on this engine")]
    PkiDisabled,

    #[error("tool registry is not enabled on this engine")]
    RegistryDisabled,

    #[error("replay detected: nonce '{0}' already used")]
    NonceReplay(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
