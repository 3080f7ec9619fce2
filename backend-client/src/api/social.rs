use serde_json::json;

use crate::client::Client;
use crate::config::ServiceKey;
use crate::error::Result;
use crate::request::ApiRequest;
use crate::request::AuthRequirement;
use crate::request::MultipartField;
use crate::types::Comment;
use crate::types::NewPost;
use crate::types::Page;
use crate::types::PageParams;
use crate::types::Post;
use crate::types::UpdateProfileRequest;
use crate::types::UserProfile;

const POSTS_PREFIX: &str = "/api/social/posts";

fn paged(request: ApiRequest, page: PageParams) -> ApiRequest {
    request.query("page", page.page).query("size", page.size)
}

impl Client {
    pub async fn update_profile(&self, payload: &UpdateProfileRequest) -> Result<UserProfile> {
        let request = ApiRequest::patch(ServiceKey::Social, "/api/social/users/me")
            .auth(AuthRequirement::Required)
            .json_body(payload)?;
        self.dispatch(&request).await?.data()
    }

    pub async fn feed(&self, page: PageParams) -> Result<Page<Post>> {
        let request = paged(
            ApiRequest::get(ServiceKey::Social, format!("{POSTS_PREFIX}/feed")),
            page,
        );
        self.dispatch(&request).await?.data()
    }

    pub async fn my_posts(&self, page: PageParams) -> Result<Page<Post>> {
        let request = paged(
            ApiRequest::get(ServiceKey::Social, format!("{POSTS_PREFIX}/mine"))
                .auth(AuthRequirement::Required),
            page,
        );
        self.dispatch(&request).await?.data()
    }

    pub async fn user_posts(&self, user_id: i64, page: PageParams) -> Result<Page<Post>> {
        let request = paged(
            ApiRequest::get(
                ServiceKey::Social,
                format!("{POSTS_PREFIX}/users/{user_id}/posts"),
            ),
            page,
        );
        self.dispatch(&request).await?.data()
    }

    pub async fn create_post(&self, post: NewPost) -> Result<Post> {
        let NewPost {
            content,
            visibility,
            files,
        } = post;
        let mut fields = vec![
            MultipartField::text("content", content),
            MultipartField::text("visibility", visibility),
        ];
        fields.extend(
            files
                .into_iter()
                .map(|f| MultipartField::file("files", f.file_name, f.mime, f.bytes)),
        );
        let request = ApiRequest::post(ServiceKey::Social, POSTS_PREFIX)
            .auth(AuthRequirement::Required)
            .multipart(fields);
        self.dispatch(&request).await?.data()
    }

    /// Returns the new like count.
    pub async fn like_post(&self, post_id: i64) -> Result<u64> {
        let request = ApiRequest::post(ServiceKey::Social, format!("{POSTS_PREFIX}/{post_id}/like"))
            .auth(AuthRequirement::Required);
        self.dispatch(&request).await?.data()
    }

    /// Returns the new like count.
    pub async fn unlike_post(&self, post_id: i64) -> Result<u64> {
        let request =
            ApiRequest::delete(ServiceKey::Social, format!("{POSTS_PREFIX}/{post_id}/like"))
                .auth(AuthRequirement::Required);
        self.dispatch(&request).await?.data()
    }

    pub async fn list_comments(&self, post_id: i64, page: PageParams) -> Result<Page<Comment>> {
        let request = paged(
            ApiRequest::get(
                ServiceKey::Social,
                format!("{POSTS_PREFIX}/{post_id}/comments"),
            ),
            page,
        );
        self.dispatch(&request).await?.data()
    }

    pub async fn add_comment(&self, post_id: i64, content: &str) -> Result<Comment> {
        let request = ApiRequest::post(
            ServiceKey::Social,
            format!("{POSTS_PREFIX}/{post_id}/comments"),
        )
        .auth(AuthRequirement::Required)
        .json(json!({ "content": content }));
        self.dispatch(&request).await?.data()
    }
}
