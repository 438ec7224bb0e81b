//! Model catalog listing.

use crate::core::catalog;

pub fn list_models() {
    println!("Available models");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    let mut provider = "";
    for model in catalog::all_models() {
        if model.provider != provider {
            provider = model.provider;
            println!("{provider}:");
        }
        let featured = if model.featured { "  ★" } else { "" };
        println!("  {:<32} {}{}", model.id, model.name, featured);
        println!("      {}", model.capabilities.join(", "));
    }

    println!();
    println!("Open panels with: chorus -m <model-id> -m <model-id> ...");
}
