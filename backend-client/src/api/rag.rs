use serde_json::Value;

use crate::client::Client;
use crate::config::ServiceKey;
use crate::error::Result;
use crate::request::ApiRequest;
use crate::types::AskRequest;
use crate::types::AskResponse;

impl Client {
    pub async fn ask(&self, question: &AskRequest) -> Result<AskResponse> {
        let request = ApiRequest::post(ServiceKey::Rag, "/ask").json_body(question)?;
        self.dispatch(&request).await?.json()
    }

    pub async fn rag_reindex(&self) -> Result<Value> {
        let request = ApiRequest::post(ServiceKey::Rag, "/admin/reindex");
        self.dispatch(&request).await?.json()
    }

    pub async fn rag_status(&self) -> Result<Value> {
        let request = ApiRequest::get(ServiceKey::Rag, "/admin/status");
        self.dispatch(&request).await?.json()
    }

    pub async fn rag_reload_patterns(&self) -> Result<Value> {
        let request = ApiRequest::post(ServiceKey::Rag, "/admin/reload_patterns");
        self.dispatch(&request).await?.json()
    }
}
