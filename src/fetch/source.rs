//! Page sources

use crate::auth::Session;
use crate::error::{Error, Result};
use crate::types::{RawPage, ResourceRef};
use async_trait::async_trait;
use serde_json::Value;

/// Anything that can turn a `ResourceRef` into a fetched page
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch one page
    async fn fetch(&self, reference: &ResourceRef) -> Result<RawPage>;

    /// Call a Moodle AJAX web service method
    async fn call_service(&self, sesskey: &str, method: &str, args: Value) -> Result<Value> {
        let _ = (sesskey, args);
        Err(Error::Other(format!("{method}: web services not available")))
    }
}

#[async_trait]
impl PageSource for Session {
    async fn fetch(&self, reference: &ResourceRef) -> Result<RawPage> {
        let url = reference.url(self.base_url())?;
        let (final_url, html) = self.client().get_text(&url).await?;

        // Moodle answers an expired session with a redirect to the login form
        if final_url.contains("/login/index.php") {
            return Err(Error::fetch(
                reference.to_string(),
                "session expired (redirected to login)",
            ));
        }

        Ok(RawPage::new(reference.clone(), final_url, html))
    }

    async fn call_service(&self, sesskey: &str, method: &str, args: Value) -> Result<Value> {
        Session::call_service(self, sesskey, method, args).await
    }
}
