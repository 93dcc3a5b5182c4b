//! TrustChain CLI — a thin, synchronous-core/async-shell wrapper
//! around `trustchain-core`'s `TrustChain` façade.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use trustchain_core::{EngineConfig, ParentRef, TrustChain};
use trustchain_registry::CertifyMetadata;

#[derive(Parser)]
#[command(name = "trustchain")]
#[command(about = "Cryptographic audit trail for AI agent tool calls")]
struct Cli {
    /// Directory holding chain.log, index.db, HEAD, refs/, and pki/.
    #[arg(long, global = true, default_value = "./.trustchain")]
    chain_dir: PathBuf,

    /// Optional JSON config file; overrides `--chain-dir` when given.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign a JSON payload and append it to the chain.
    Sign {
        tool_id: String,
        /// Inline JSON, e.g. '{"command": "ls -la"}'
        data: String,
        #[arg(long)]
        session_id: Option<String>,
    },
    /// Re-verify a previously committed record by content id.
    Verify { content_id: String },
    /// Show chain history, newest first.
    Log {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show chain health: length, HEAD, tool counts.
    Status,
    /// Recompute the Merkle root from the journal and compare to HEAD.
    VerifyChain,
    /// Tool certificate registry operations.
    #[command(subcommand)]
    Cert(CertCommands),
    /// Bootstrap (or reuse) the root/intermediate CA hierarchy and
    /// print this engine's agent certificate.
    PkiBootstrap {
        #[arg(long, default_value = "TrustChain")]
        organization: String,
    },
}

#[derive(Subcommand)]
enum CertCommands {
    /// Certify a tool's current source against a new certificate.
    Issue {
        module: String,
        name: String,
        /// Path to the tool's source file; omitted falls back to a
        /// qualified-identifier hash.
        #[arg(long)]
        source_file: Option<PathBuf>,
        #[arg(long, default_value = "0.1.0")]
        version: String,
    },
    /// Check a tool's certificate against its current source.
    Verify {
        module: String,
        name: String,
        #[arg(long)]
        source_file: Option<PathBuf>,
    },
    /// Revoke a tool's certificate.
    Revoke {
        module: String,
        name: String,
        reason: String,
    },
    /// Print this engine's own agent certificate summary.
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Sign { tool_id, data, session_id } => {
            let attestation = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
                let engine = TrustChain::new(config)?;
                let value: serde_json::Value = serde_json::from_str(&data)?;
                Ok(engine.sign(&tool_id, value, ParentRef::Auto, session_id.as_deref(), None, 0)?)
            })
            .await??;
            println!("{}", serde_json::to_string_pretty(&attestation)?);
        }
        Commands::Verify { content_id } => {
            let valid = tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
                let engine = TrustChain::new(config)?;
                let chain = engine.chain().ok_or_else(|| anyhow::anyhow!("chain disabled"))?;
                let record = chain.show(&content_id)?;
                let attestation = trustchain_signer::Attestation {
                    tool_id: record.tool_id,
                    data: record.data,
                    timestamp: record.timestamp,
                    nonce: record.nonce,
                    parent_signature: record.parent_signature,
                    signature: record.signature,
                    signature_id: record.signature_id,
                    key_id: record.key_id,
                    algorithm: record.algorithm,
                };
                Ok(engine.verify(&attestation)?)
            })
            .await??;
            println!("{}", if valid { "VALID" } else { "INVALID" });
        }
        Commands::Log { limit } => {
            let entries = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
                let engine = TrustChain::new(config)?;
                let chain = engine.chain().ok_or_else(|| anyhow::anyhow!("chain disabled"))?;
                let mut records = chain.log_reverse()?;
                records.truncate(limit);
                Ok(records)
            })
            .await??;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Commands::Status => {
            let status = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
                let engine = TrustChain::new(config)?;
                let chain = engine.chain().ok_or_else(|| anyhow::anyhow!("chain disabled"))?;
                Ok(chain.status()?)
            })
            .await??;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::VerifyChain => {
            let report = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
                let engine = TrustChain::new(config)?;
                let chain = engine.chain().ok_or_else(|| anyhow::anyhow!("chain disabled"))?;
                Ok(chain.verify()?)
            })
            .await??;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.valid {
                std::process::exit(1);
            }
        }
        Commands::Cert(cert_command) => run_cert_command(config, cert_command).await?,
        Commands::PkiBootstrap { organization } => {
            let cert = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
                let mut config = config;
                config.pki.enabled = true;
                config.pki.organization = organization;
                let engine = TrustChain::new(config)?;
                Ok(engine.pki()?.agent_cert.to_pem())
            })
            .await??;
            println!("{cert}");
        }
    }

    Ok(())
}

async fn run_cert_command(mut config: EngineConfig, command: CertCommands) -> anyhow::Result<()> {
    if matches!(command, CertCommands::Show) {
        config.pki.enabled = true;
        let summary = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
            let engine = TrustChain::new(config)?;
            Ok(engine.pki()?.agent_cert.to_summary())
        })
        .await??;
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    config.registry.enabled = true;
    match command {
        CertCommands::Show => unreachable!("handled above"),
        CertCommands::Issue { module, name, source_file, version } => {
            let cert = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
                let engine = TrustChain::new(config)?;
                let source = source_file.map(std::fs::read_to_string).transpose()?;
                let metadata = CertifyMetadata {
                    version,
                    ..Default::default()
                };
                Ok(engine.certify_tool(&module, &name, source.as_deref(), metadata)?)
            })
            .await??;
            println!("{}", serde_json::to_string_pretty(&cert)?);
        }
        CertCommands::Verify { module, name, source_file } => {
            let result = tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
                let engine = TrustChain::new(config)?;
                let source = source_file.map(std::fs::read_to_string).transpose()?;
                Ok(engine.verify_tool(&module, &name, source.as_deref()).is_ok())
            })
            .await??;
            println!("{}", if result { "TRUSTED" } else { "UNTRUSTED" });
            if !result {
                std::process::exit(1);
            }
        }
        CertCommands::Revoke { module, name, reason } => {
            tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
                let engine = TrustChain::new(config)?;
                let registry = engine.registry()?;
                registry.revoke(&module, &name, &reason)?;
                Ok(())
            })
            .await??;
            println!("revoked");
        }
    }
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    if let Some(path) = &cli.config {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    } else {
        let mut config = EngineConfig::default();
        config.chain.dir = cli.chain_dir.clone();
        config.registry.dir = cli.chain_dir.join("tools");
        Ok(config)
    }
}
