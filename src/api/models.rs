use std::collections::HashMap;

use crate::api::{ModelInfo, ModelsResponse};
use crate::utils::url::construct_api_url;

pub async fn fetch_models(
    client: &reqwest::Client,
    server_url: &str,
) -> Result<Vec<ModelInfo>, Box<dyn std::error::Error>> {
    let models_url = construct_api_url(server_url, "api/models");
    tracing::debug!(url = %models_url, "fetching model directory");

    let response = client
        .get(models_url)
        .header("Accept", "application/json")
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(format!("Model directory request failed with status {status}: {error_text}").into());
    }

    let models = response.json::<ModelsResponse>().await?.into_models();
    tracing::debug!(count = models.len(), "model directory loaded");
    Ok(models)
}

pub fn sort_models(models: &mut [ModelInfo]) {
    models.sort_by(|a, b| {
        a.display_name()
            .to_lowercase()
            .cmp(&b.display_name().to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Keep only free models when `free_only` is set.
pub fn filter_models(models: &[ModelInfo], free_only: bool) -> Vec<&ModelInfo> {
    models
        .iter()
        .filter(|model| !free_only || model.is_free())
        .collect()
}

impl ModelInfo {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.id)
    }

    /// A model is free when both its prompt and completion prices are zero.
    /// Models without pricing information are not considered free.
    pub fn is_free(&self) -> bool {
        let Some(pricing) = &self.pricing else {
            return false;
        };
        let is_zero = |price: &Option<String>| {
            price
                .as_deref()
                .and_then(|p| p.trim().parse::<f64>().ok())
                .is_some_and(|p| p == 0.0)
        };
        is_zero(&pricing.prompt) && is_zero(&pricing.completion)
    }

    pub fn supports_parameter(&self, parameter: &str) -> bool {
        self.supported_parameters
            .as_ref()
            .is_some_and(|params| params.iter().any(|p| p == parameter))
    }

    /// One-line description used by the CLI listing and the settings view.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(context) = self.context_length {
            parts.push(format!("{}k ctx", context / 1000));
        }
        if self.is_free() {
            parts.push("free".to_string());
        } else if let Some(pricing) = &self.pricing {
            if let (Some(prompt), Some(completion)) = (
                per_million(pricing.prompt.as_deref()),
                per_million(pricing.completion.as_deref()),
            ) {
                parts.push(format!("${prompt:.2}/${completion:.2} per 1M"));
            }
        }
        if let Some(arch) = &self.architecture {
            if arch.input_modalities.iter().any(|m| m != "text") {
                parts.push(format!("in: {}", arch.input_modalities.join("+")));
            }
        }
        parts.join(" · ")
    }
}

fn per_million(price: Option<&str>) -> Option<f64> {
    price
        .and_then(|p| p.trim().parse::<f64>().ok())
        .map(|p| p * 1_000_000.0)
}

/// Capability lookup over the model directory.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: Vec<ModelInfo>,
    index: HashMap<String, usize>,
}

impl ModelCatalog {
    pub fn new(mut models: Vec<ModelInfo>) -> Self {
        sort_models(&mut models);
        let index = models
            .iter()
            .enumerate()
            .map(|(i, model)| (model.id.clone(), i))
            .collect();
        Self { models, index }
    }

    pub fn models(&self) -> &[ModelInfo] {
        &self.models
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ModelInfo> {
        self.index.get(id).map(|&i| &self.models[i])
    }

    /// Unknown models support nothing optional.
    pub fn supports(&self, model_id: &str, parameter: &str) -> bool {
        self.get(model_id)
            .is_some_and(|model| model.supports_parameter(parameter))
    }

    pub fn filtered(&self, free_only: bool) -> Vec<&ModelInfo> {
        filter_models(&self.models, free_only)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ModelPricing;

    fn model(id: &str, name: Option<&str>, prompt: &str, completion: &str) -> ModelInfo {
        ModelInfo {
            id: id.into(),
            name: name.map(str::to_string),
            context_length: Some(128_000),
            pricing: Some(ModelPricing {
                prompt: Some(prompt.into()),
                completion: Some(completion.into()),
            }),
            architecture: None,
            supported_parameters: None,
        }
    }

    #[test]
    fn free_requires_both_prices_zero() {
        assert!(model("a", None, "0", "0").is_free());
        assert!(model("a", None, "0.000", " 0 ").is_free());
        assert!(!model("a", None, "0", "0.000002").is_free());
        assert!(!model("a", None, "n/a", "0").is_free());

        let mut unpriced = model("a", None, "0", "0");
        unpriced.pricing = None;
        assert!(!unpriced.is_free());
    }

    #[test]
    fn filter_models_respects_free_only_flag() {
        let models = vec![
            model("paid", None, "0.000001", "0.000002"),
            model("free", None, "0", "0"),
        ];
        assert_eq!(filter_models(&models, false).len(), 2);
        let free: Vec<_> = filter_models(&models, true).iter().map(|m| m.id.as_str()).collect();
        assert_eq!(free, vec!["free"]);
    }

    #[test]
    fn sort_models_orders_by_display_name_case_insensitively() {
        let mut models = vec![
            model("z/one", Some("beta"), "0", "0"),
            model("a/two", Some("Alpha"), "0", "0"),
            model("m/three", None, "0", "0"),
        ];
        sort_models(&mut models);
        let ids: Vec<_> = models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a/two", "z/one", "m/three"]);
    }

    #[test]
    fn catalog_reports_supported_parameters() {
        let mut with_temp = model("with-temp", None, "0", "0");
        with_temp.supported_parameters = Some(vec!["temperature".into(), "top_p".into()]);
        let bare = model("bare", None, "0", "0");
        let catalog = ModelCatalog::new(vec![with_temp, bare]);

        assert!(catalog.supports("with-temp", "temperature"));
        assert!(catalog.supports("with-temp", "top_p"));
        assert!(!catalog.supports("bare", "temperature"));
        assert!(!catalog.supports("missing", "temperature"));
    }

    #[test]
    fn describe_summarises_pricing_and_context() {
        let paid = model("p", None, "0.000001", "0.000002");
        assert_eq!(paid.describe(), "128k ctx · $1.00/$2.00 per 1M");
        assert_eq!(model("f", None, "0", "0").describe(), "128k ctx · free");
    }
}
