use serde_json::Value;

use crate::client::Client;
use crate::config::ServiceKey;
use crate::error::Result;
use crate::request::ApiRequest;

impl Client {
    /// Full-text search over published laws. The result shape belongs to the
    /// law service and is returned as-is.
    pub async fn search_laws(&self, query: &str) -> Result<Value> {
        let request = ApiRequest::get(ServiceKey::Law, "/laws/search").query("q", query);
        self.dispatch(&request).await?.json()
    }

    pub async fn law_detail(&self, id: &str) -> Result<Value> {
        let request = ApiRequest::get(ServiceKey::Law, format!("/laws/{id}"));
        self.dispatch(&request).await?.json()
    }
}
