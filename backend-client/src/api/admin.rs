//! Moderation endpoints of the social service and the law ingestion admin.
//!
//! Social moderation goes through [`Client::dispatch`] with the user's bearer
//! token. The law admin is guarded by an API key instead and never touches
//! the session.

use std::time::Duration;

use reqwest::Method;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use serde_json::Value;
use serde_json::json;

use crate::client::Client;
use crate::config::ServiceBaseUrls;
use crate::config::ServiceKey;
use crate::error::ClientError;
use crate::error::Result;
use crate::request::ApiRequest;
use crate::request::AuthRequirement;
use crate::request::MultipartField;
use crate::types::Attachment;
use crate::types::DEFAULT_ADMIN_PAGE_SIZE;
use crate::types::PostFilter;
use crate::types::UserFilter;

const API_KEY_HEADER: &str = "x-api-key";
const LAW_ADMIN_PREFIX: &str = "/api/admin/laws";
/// Ingestion endpoints parse whole documents and answer slowly.
const LAW_ADMIN_TIMEOUT: Duration = Duration::from_secs(180);

/// Moderation prefix for the configured admin base URL. A base that already
/// ends in `/api` must not get a second `/api` segment.
pub fn social_admin_prefix(services: &ServiceBaseUrls) -> &'static str {
    let base = services.base_url(ServiceKey::SocialAdmin);
    let has_api = base
        .rsplit('/')
        .next()
        .is_some_and(|last| last.eq_ignore_ascii_case("api"));
    if has_api {
        "/admin/social"
    } else {
        "/api/admin/social"
    }
}

/// Page index and size for admin listings; `None` means the first page of
/// [`DEFAULT_ADMIN_PAGE_SIZE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminPage {
    pub page: u32,
    pub size: u32,
}

impl Default for AdminPage {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_ADMIN_PAGE_SIZE,
        }
    }
}

impl Client {
    fn social_admin(&self, method: Method, suffix: &str) -> ApiRequest {
        let prefix = social_admin_prefix(self.services());
        ApiRequest::new(ServiceKey::SocialAdmin, method, format!("{prefix}{suffix}"))
            .auth(AuthRequirement::Required)
    }

    pub async fn admin_list_users(&self, filter: &UserFilter, page: AdminPage) -> Result<Value> {
        let request = self
            .social_admin(Method::GET, "/users")
            .query_opt("status", filter.status.as_deref())
            .query_opt("keyword", filter.keyword.as_deref())
            .query("page", page.page)
            .query("size", page.size);
        self.dispatch(&request).await?.data()
    }

    pub async fn admin_get_user(&self, id: i64) -> Result<Value> {
        let request = self.social_admin(Method::GET, &format!("/users/{id}"));
        self.dispatch(&request).await?.data()
    }

    pub async fn admin_update_user_status(&self, id: i64, status: &str) -> Result<Value> {
        let request = self
            .social_admin(Method::PATCH, &format!("/users/{id}/status"))
            .json(json!({ "status": status }));
        self.dispatch(&request).await?.data()
    }

    /// The service stores roles as one comma separated string.
    pub async fn admin_update_user_roles(&self, id: i64, roles: &[String]) -> Result<Value> {
        let request = self
            .social_admin(Method::PATCH, &format!("/users/{id}/roles"))
            .json(json!({ "roles": roles.join(",") }));
        self.dispatch(&request).await?.data()
    }

    pub async fn admin_list_posts(&self, filter: &PostFilter, page: AdminPage) -> Result<Value> {
        let request = self
            .social_admin(Method::GET, "/posts")
            .query_opt("authorId", filter.author_id)
            .query_opt("visibility", filter.visibility.as_deref())
            .query("page", page.page)
            .query("size", page.size);
        self.dispatch(&request).await?.data()
    }

    pub async fn admin_get_post(&self, post_id: i64) -> Result<Value> {
        let request = self.social_admin(Method::GET, &format!("/posts/{post_id}"));
        self.dispatch(&request).await?.data()
    }

    pub async fn admin_update_post_visibility(
        &self,
        post_id: i64,
        visibility: &str,
    ) -> Result<Value> {
        let request = self
            .social_admin(
                Method::PATCH,
                &format!("/posts/{post_id}/visibility"),
            )
            .json(json!({ "visibility": visibility }));
        self.dispatch(&request).await?.data()
    }

    pub async fn admin_delete_post(&self, post_id: i64) -> Result<Value> {
        let request = self.social_admin(Method::DELETE, &format!("/posts/{post_id}"));
        self.dispatch(&request).await?.data()
    }

    pub async fn admin_list_comments(&self, post_id: i64, page: AdminPage) -> Result<Value> {
        let request = self
            .social_admin(Method::GET, &format!("/posts/{post_id}/comments"))
            .query("page", page.page)
            .query("size", page.size);
        self.dispatch(&request).await?.data()
    }

    pub async fn admin_delete_comment(&self, post_id: i64, comment_id: i64) -> Result<Value> {
        let request = self.social_admin(
            Method::DELETE,
            &format!("/posts/{post_id}/comments/{comment_id}"),
        );
        self.dispatch(&request).await?.data()
    }
}

/// Client for the law ingestion admin, authenticated by `X-API-KEY` rather
/// than by the user session.
#[derive(Debug, Clone)]
pub struct LawAdmin<'a> {
    client: &'a Client,
    api_key: Option<HeaderValue>,
}

impl Client {
    pub fn law_admin(&self, api_key: Option<&str>) -> Result<LawAdmin<'_>> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .map(|k| {
                HeaderValue::from_str(k.trim())
                    .map_err(|_| ClientError::InvalidRequest("api key is not a valid header".into()))
            })
            .transpose()?;
        Ok(LawAdmin {
            client: self,
            api_key,
        })
    }
}

impl LawAdmin<'_> {
    fn request(&self, suffix: &str) -> ApiRequest {
        self.request_with(Method::GET, suffix)
    }

    fn request_with(&self, method: Method, suffix: &str) -> ApiRequest {
        let path = format!("{LAW_ADMIN_PREFIX}{suffix}");
        let request = ApiRequest::new(ServiceKey::Law, method, path)
            .auth(AuthRequirement::Anonymous)
            .timeout(LAW_ADMIN_TIMEOUT);
        match &self.api_key {
            Some(key) => request.header(HeaderName::from_static(API_KEY_HEADER), key.clone()),
            None => request,
        }
    }

    async fn fetch(&self, request: ApiRequest) -> Result<Value> {
        self.client.dispatch(&request).await?.json()
    }

    pub async fn list_laws(&self, keyword: Option<&str>, page: AdminPage) -> Result<Value> {
        let request = self
            .request("")
            .query_opt("keyword", keyword)
            .query("page", page.page)
            .query("size", page.size);
        self.fetch(request).await
    }

    pub async fn get_law(&self, id: i64) -> Result<Value> {
        self.fetch(self.request(&format!("/{id}"))).await
    }

    pub async fn toc(&self, id: i64) -> Result<Value> {
        self.fetch(self.request(&format!("/{id}/toc"))).await
    }

    pub async fn related(&self, id: i64, doc_type: Option<&str>) -> Result<Value> {
        let request = self
            .request(&format!("/{id}/related"))
            .query_opt("docType", doc_type);
        self.fetch(request).await
    }

    pub async fn list_nodes(
        &self,
        law_id: i64,
        effective_at: Option<&str>,
        page: AdminPage,
    ) -> Result<Value> {
        let request = self
            .request(&format!("/{law_id}/nodes"))
            .query_opt("effectiveAt", effective_at)
            .query("page", page.page)
            .query("size", page.size);
        self.fetch(request).await
    }

    pub async fn get_node(&self, id: i64) -> Result<Value> {
        self.fetch(self.request(&format!("/nodes/{id}"))).await
    }

    pub async fn suggest(&self, keyword: &str, limit: u32) -> Result<Value> {
        let request = self
            .request("/suggest")
            .query("keyword", keyword)
            .query("limit", limit);
        self.fetch(request).await
    }

    pub async fn search_nodes(
        &self,
        keyword: Option<&str>,
        effective_at: Option<&str>,
        page: AdminPage,
    ) -> Result<Value> {
        let request = self
            .request("/nodes/search")
            .query_opt("keyword", keyword)
            .query_opt("effectiveAt", effective_at)
            .query("page", page.page)
            .query("size", page.size);
        self.fetch(request).await
    }

    pub async fn search_nodes_fulltext(&self, q: Option<&str>, page: AdminPage) -> Result<Value> {
        let request = self
            .request("/nodes/search/fulltext")
            .query_opt("q", q)
            .query("page", page.page)
            .query("size", page.size);
        self.fetch(request).await
    }

    /// Run the question-analysis pipeline over `body` as of `effective_at`.
    pub async fn qa_analyze(&self, body: Value, effective_at: Option<&str>) -> Result<Value> {
        let request = self
            .request_with(Method::POST, "/qa/analyze")
            .query_opt("effectiveAt", effective_at)
            .json(body);
        self.fetch(request).await
    }

    /// Ingest a law document. `meta` travels as a JSON string in its own
    /// part; the file part is omitted when only metadata is sent.
    pub async fn upload_law(&self, file: Option<Attachment>, meta: &Value) -> Result<Value> {
        let mut fields = Vec::with_capacity(2);
        if let Some(file) = file {
            fields.push(MultipartField::file(
                "file",
                file.file_name,
                file.mime,
                file.bytes,
            ));
        }
        fields.push(MultipartField::text("meta", meta.to_string()));
        let request = self.request_with(Method::POST, "/upload").multipart(fields);
        self.fetch(request).await
    }
}
