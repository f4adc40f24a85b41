//! Prompt listing

use std::error::Error;
use std::io::{self, Write};

use crate::api::PromptSummary;
use crate::core::config::Config;
use crate::core::prompts::prompt_source_for;

/// `selected` is the prompt in effect, after any `--prompt` override.
pub async fn list_prompts(
    config: &Config,
    server_url: &str,
    selected: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    let source = prompt_source_for(config, reqwest::Client::new(), server_url);
    let prompts = source.list().await?;
    let mut stdout = io::stdout().lock();
    write_prompt_listing(
        &mut stdout,
        &prompts,
        &source.location(),
        selected,
    )?;
    Ok(())
}

pub fn write_prompt_listing<W: Write>(
    out: &mut W,
    prompts: &[PromptSummary],
    location: &str,
    selected: Option<&str>,
) -> io::Result<()> {
    writeln!(out, "📝 Prompts from {location}")?;
    writeln!(out)?;

    if prompts.is_empty() {
        writeln!(out, "No prompts found.")?;
        return Ok(());
    }

    for prompt in prompts {
        let marker = if selected == Some(prompt.id.as_str()) {
            "*"
        } else {
            " "
        };
        writeln!(out, "{marker} {} ({})", prompt.display_title(), prompt.id)?;
        if let Some(description) = prompt.description.as_deref().filter(|d| !d.is_empty()) {
            writeln!(out, "    {description}")?;
        }
    }

    if selected.is_some() {
        writeln!(out)?;
        writeln!(out, "* = selected")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_the_selected_prompt() {
        let prompts = vec![
            PromptSummary {
                id: "concise".into(),
                title: Some("Concise".into()),
                description: Some("Short answers".into()),
            },
            PromptSummary {
                id: "tutor".into(),
                title: None,
                description: None,
            },
        ];
        let mut buf = Vec::new();
        write_prompt_listing(&mut buf, &prompts, "~/prompts", Some("tutor")).expect("write");
        let output = String::from_utf8(buf).expect("utf8");

        assert!(output.contains("  Concise (concise)\n    Short answers\n"));
        assert!(output.contains("* tutor (tutor)\n"));
        assert!(output.ends_with("* = selected\n"));
    }

    #[test]
    fn empty_listing_says_so() {
        let mut buf = Vec::new();
        write_prompt_listing(&mut buf, &[], "http://localhost:5000", None).expect("write");
        let output = String::from_utf8(buf).expect("utf8");
        assert!(output.contains("No prompts found."));
    }
}
