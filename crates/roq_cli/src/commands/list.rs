//! List command - prints every service in the catalog.

use roq_core::Catalog;

use crate::ui::{colors, indicators};

/// Prints the catalog's services ordered by identifier.
pub fn run(catalog: &Catalog) {
    println!();
    println!(
        "{} {}",
        colors::accent().bold().apply_to("supported services"),
        colors::muted().apply_to(format!("({})", catalog.len()))
    );
    println!();

    for service in catalog.iter() {
        let secret_info = service
            .secret
            .as_ref()
            .map(|s| format!(" (requires secret: {})", s.name))
            .unwrap_or_default();

        println!(
            "  {} {} {}{}",
            colors::muted().apply_to(indicators::BULLET),
            colors::accent().apply_to(&service.id),
            colors::secondary().apply_to(format!("- {}", service.name)),
            colors::muted().apply_to(secret_info)
        );
    }

    println!();
}
