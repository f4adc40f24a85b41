//! Model listing

use std::error::Error;
use std::io::{self, Write};

use crate::api::models::{fetch_models, ModelCatalog};

pub async fn list_models(server_url: &str, free_only: bool) -> Result<(), Box<dyn Error>> {
    let client = reqwest::Client::new();
    let catalog = ModelCatalog::new(fetch_models(&client, server_url).await?);
    let mut stdout = io::stdout().lock();
    write_model_listing(&mut stdout, &catalog, server_url, free_only)?;
    Ok(())
}

pub fn write_model_listing<W: Write>(
    out: &mut W,
    catalog: &ModelCatalog,
    server_url: &str,
    free_only: bool,
) -> io::Result<()> {
    writeln!(out, "🤖 Models available from {server_url}")?;
    writeln!(out, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
    writeln!(out)?;

    let models = catalog.filtered(free_only);
    if models.is_empty() {
        if free_only {
            writeln!(out, "No free models found.")?;
        } else {
            writeln!(out, "No models found.")?;
        }
        return Ok(());
    }

    let qualifier = if free_only { " free" } else { "" };
    writeln!(out, "Found {}{qualifier} models:", models.len())?;
    writeln!(out)?;
    for model in models {
        writeln!(out, "  • {}", model.id)?;
        let description = model.describe();
        if description.is_empty() {
            writeln!(out, "    {}", model.display_name())?;
        } else {
            writeln!(out, "    {} · {description}", model.display_name())?;
        }
    }
    Ok(())
}
