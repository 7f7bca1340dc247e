//! Developer CLI for kyckit.
//!
//! Two offline utilities: checking a field's Merkle inclusion proof against
//! a root hash, and inspecting session tokens issued by a service.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use eyre::{eyre, Result, WrapErr};

use kyckit_core::merkle::{validate_field, ProofNode};
use kyckit_core::session::{SessionCodec, SignedSessionCodec};

/// Developer tooling for kyckit-based services.
#[derive(Parser, Debug)]
#[command(name = "kyckit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify a field's inclusion proof against a root hash, offline.
    VerifyProof {
        /// Root hash the provider published for the profile.
        #[arg(long)]
        root: String,
        /// Raw field value to check. Prefix with `@` to read from a file.
        #[arg(long)]
        value: String,
        /// Path to the proof-path JSON (an array of
        /// `{parent, left, right}` entries, as served by the provider).
        #[arg(long)]
        proof: PathBuf,
    },
    /// Decode and verify a session token issued under the service secret.
    DecodeToken {
        /// The opaque token, e.g. from an `accessToken` response field.
        token: String,
        /// Service secret the token was signed with.
        #[arg(long, env = "KYCKIT_CLIENT_SECRET", hide_env_values = true)]
        secret: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    match Cli::parse().command {
        Command::VerifyProof { root, value, proof } => {
            let raw = read_value(&value)?;
            let path: Vec<ProofNode> = serde_json::from_slice(
                &fs::read(&proof)
                    .wrap_err_with(|| format!("reading {}", proof.display()))?,
            )
            .wrap_err("proof file is not a valid proof-path array")?;

            if validate_field(&root, &raw, &path) {
                println!("valid: field is included under {root}");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("INVALID: proof does not connect the value to {root}");
                Ok(ExitCode::FAILURE)
            }
        }
        Command::DecodeToken { token, secret } => {
            let codec = SignedSessionCodec::new(secret);
            let claims = codec
                .decode(&token)
                .ok_or_else(|| eyre!("invalid access token"))?;
            println!("{}", serde_json::to_string_pretty(&claims)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read_value(value: &str) -> Result<Vec<u8>> {
    value.strip_prefix('@').map_or_else(
        || Ok(value.as_bytes().to_vec()),
        |path| fs::read(path).wrap_err_with(|| format!("reading {path}")),
    )
}
