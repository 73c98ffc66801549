use std::sync::Arc;

use tracing::{error, warn};

use crate::{clients::directory::UserDirectory, models::channel::Channel};

/// Best-effort recipient resolution. A user that cannot be resolved, for
/// whatever reason, is dropped from the batch; one bad id must never abort
/// the remaining ids.
#[derive(Clone)]
pub struct ContactResolver {
    directory: Arc<dyn UserDirectory>,
}

impl ContactResolver {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    pub async fn resolve(&self, user_id: &str, channel: Channel) -> Option<String> {
        match self.directory.contact(user_id, channel).await {
            Ok(Some(address)) => Some(address),
            Ok(None) => {
                warn!(user_id, channel = %channel, "No address on file for user");
                None
            }
            Err(e) => {
                error!(user_id, channel = %channel, error = %e, "Directory lookup failed");
                None
            }
        }
    }
}
