use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use tracing::{debug, info};

use crate::clients::blob::BlobStore;

const BODY_PLACEHOLDER: &str = "%{body}%";

/// Loads a named template from blob storage and substitutes the body
/// placeholder. A fetch failure is fatal for the whole batch being rendered;
/// there is no partial templating.
#[derive(Clone)]
pub struct TemplateRenderer {
    store: Arc<dyn BlobStore>,
    template_key: String,
}

/// A fetched template, decoded as UTF-8. Rendering is pure: the same
/// template bytes and body text always produce the same output.
#[derive(Debug, Clone)]
pub struct EmailTemplate {
    text: String,
}

impl TemplateRenderer {
    pub fn new(store: Arc<dyn BlobStore>, template_key: impl Into<String>) -> Self {
        Self {
            store,
            template_key: template_key.into(),
        }
    }

    pub async fn load(&self) -> Result<EmailTemplate, Error> {
        debug!(key = %self.template_key, "Loading template from blob store");

        let bytes = self
            .store
            .fetch(&self.template_key)
            .await
            .map_err(|e| anyhow!("Failed to fetch template {}: {}", self.template_key, e))?;

        let text = String::from_utf8(bytes)
            .map_err(|_| anyhow!("Template {} is not valid UTF-8", self.template_key))?;

        info!(key = %self.template_key, "Template loaded");

        Ok(EmailTemplate { text })
    }

    pub async fn render(&self, body: &str) -> Result<String, Error> {
        Ok(self.load().await?.render(body))
    }
}

impl EmailTemplate {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn render(&self, body: &str) -> String {
        self.text.replace(BODY_PLACEHOLDER, body)
    }
}
