//! `inspect`: decode a captured certificate offline

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use super::output::{self, OutputFormat};
use crate::certificate::{self, Certificate, Expectation, PublicKeyAlgorithm};

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// PEM file or raw `openssl s_client -showcerts` output
    pub file: PathBuf,

    /// Fail unless the leaf's public key algorithm matches (rsa, ecdsa, ed25519, dsa)
    #[arg(long, value_name = "ALG")]
    pub expect_algorithm: Option<String>,

    /// Decode every certificate in the file, leaf first
    #[arg(long)]
    pub chain: bool,

    /// Output format (json, yaml, or table)
    #[arg(short, long, default_value = "table", value_parser = ["json", "yaml", "table"])]
    pub output: String,
}

/// Decode and print; returns `false` when an expectation failed
pub fn handle_inspect(args: InspectArgs) -> Result<bool> {
    let format: OutputFormat = args.output.parse()?;
    let expectation = args
        .expect_algorithm
        .as_deref()
        .map(|name| {
            PublicKeyAlgorithm::from_name(name)
                .map(Expectation::PublicKeyAlgorithm)
                .with_context(|| format!("Unknown public key algorithm '{}'", name))
        })
        .transpose()?;

    let raw = std::fs::read(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let chain = if args.chain {
        certificate::decode_chain(&raw)?
    } else {
        vec![certificate::decode(&raw)?]
    };

    output::print_with(&chain, format, |chain| {
        for (i, cert) in chain.iter().enumerate() {
            print_certificate(i, cert);
        }
    })?;

    let Some(expectation) = expectation else {
        return Ok(true);
    };
    match certificate::assert(&chain[0], &expectation) {
        Ok(()) => {
            let detail =
                format!("{} is {}", expectation.property(), chain[0].public_key_algorithm);
            output::print_verdict(format, true, detail);
            Ok(true)
        }
        Err(e) => {
            output::print_verdict(format, false, e);
            Ok(false)
        }
    }
}

fn print_certificate(index: usize, cert: &Certificate) {
    println!();
    println!("Certificate {}", index);
    output::print_separator(60);
    println!("{:<22} {}", "Subject", cert.subject);
    println!("{:<22} {}", "Issuer", cert.issuer);
    println!("{:<22} {}", "Serial", cert.serial);
    println!("{:<22} {}", "Not before", cert.not_before);
    println!("{:<22} {}", "Not after", cert.not_after);
    println!("{:<22} {}", "Public key algorithm", cert.public_key_algorithm);
    println!("{:<22} {}", "Signature algorithm", cert.signature_algorithm);
    for uri in &cert.uris {
        println!("{:<22} {}", "URI SAN", uri);
    }
    for dns in &cert.dns_names {
        println!("{:<22} {}", "DNS SAN", dns);
    }
}
