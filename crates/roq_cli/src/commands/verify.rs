//! Verify command - checks one credential against one service.

use std::sync::Arc;

use roq_core::{Catalog, VerificationResult};
use roq_verify::Verifier;

use crate::ui::{colors, create_spinner, exit, indicators};

/// Verifies `key` for `service` and prints the verdict.
///
/// Exits with [`exit::INVALID`] when the key is not confirmed valid.
pub fn run(catalog: Catalog, service: &str, key: &str, secret: Option<&str>, json: bool) -> super::Result {
    let verifier = Verifier::new(Arc::new(catalog))?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow::anyhow!("failed to create async runtime: {e}"))?;

    let spinner = (!json).then(|| create_spinner(format!("verifying {}", service.to_lowercase())));
    let result = rt.block_on(verifier.verify(service, key, secret));
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    if json {
        println!("{}", serde_json::to_string(&result)?);
    } else {
        print_result(&result);
    }

    if !result.valid {
        std::process::exit(exit::INVALID);
    }

    Ok(())
}

fn print_result(result: &VerificationResult) {
    println!();
    if result.valid {
        println!(
            "{} {}",
            colors::success().bold().apply_to(indicators::SUCCESS),
            result.service
        );
        if let Some(details) = &result.details {
            println!("  {}", colors::muted().apply_to(details.to_lowercase()));
        }
    } else {
        println!(
            "{} {}",
            colors::error().bold().apply_to(indicators::ERROR),
            result.service
        );
        println!("  {}", colors::muted().apply_to(result.message.to_lowercase()));
        if let Some(details) = &result.details {
            println!("  {}", colors::muted().apply_to(details.to_lowercase()));
        }
    }
    println!();
}
