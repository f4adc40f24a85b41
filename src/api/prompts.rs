use crate::api::{PromptContent, PromptSummary};
use crate::utils::url::construct_api_url;

pub async fn fetch_prompts(
    client: &reqwest::Client,
    server_url: &str,
) -> Result<Vec<PromptSummary>, Box<dyn std::error::Error + Send + Sync>> {
    let url = construct_api_url(server_url, "api/prompts");
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        let status = response.status();
        return Err(format!("Prompt directory request failed with status {status}").into());
    }

    Ok(response.json::<Vec<PromptSummary>>().await?)
}

/// Returns `Ok(None)` when the backend does not know the prompt.
pub async fn fetch_prompt_content(
    client: &reqwest::Client,
    server_url: &str,
    prompt_id: &str,
) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
    let url = construct_api_url(server_url, &format!("api/prompts/{prompt_id}"));
    let response = client.get(url).send().await?;

    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !response.status().is_success() {
        let status = response.status();
        return Err(format!("Prompt request for '{prompt_id}' failed with status {status}").into());
    }

    Ok(Some(response.json::<PromptContent>().await?.content))
}
