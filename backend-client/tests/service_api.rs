#![expect(clippy::unwrap_used)]

use std::sync::Arc;

use base64::Engine;
use chrono::Utc;
use lawer_backend_client::AdminPage;
use lawer_backend_client::Client;
use lawer_backend_client::ClientConfig;
use lawer_backend_client::ClientError;
use lawer_backend_client::ServiceBaseUrls;
use lawer_backend_client::types::AskOptions;
use lawer_backend_client::types::AskRequest;
use lawer_backend_client::types::Attachment;
use lawer_backend_client::types::PostFilter;
use lawer_backend_client::types::RegisterRequest;
use lawer_backend_client::types::UserFilter;
use lawer_login::MemorySessionStore;
use lawer_login::Session;
use lawer_login::SessionStore;
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use serde_json::Value;
use serde_json::json;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::body_json;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::matchers::query_param;
use wiremock::matchers::query_param_is_missing;

const REFRESH_PATH: &str = "/api/social/auth/refresh-token";
const USERS_ADMIN: &str = "/api/admin/social/users";

fn jwt_expiring_in(seconds: i64) -> String {
    let b64 = |b: &[u8]| base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(b);
    let payload = json!({"sub": "7", "exp": Utc::now().timestamp() + seconds});
    format!(
        "{}.{}.{}",
        b64(br#"{"alg":"none","typ":"JWT"}"#),
        b64(&serde_json::to_vec(&payload).unwrap()),
        b64(b"sig")
    )
}

fn enveloped(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "code": 200,
        "message": "OK",
        "data": data,
    }))
}

/// Client logged in with a fresh token, every service pointed at `server`.
fn logged_in(server: &MockServer) -> (Client, Arc<MemorySessionStore>, String) {
    let uri = server.uri();
    let config = ClientConfig {
        services: ServiceBaseUrls {
            gateway: uri.clone(),
            auth: uri.clone(),
            social: uri.clone(),
            social_admin: uri.clone(),
            law: uri.clone(),
            rag: uri,
        },
        invalidation_delay_ms: 10,
        ..Default::default()
    };
    let token = jwt_expiring_in(3600);
    let store = Arc::new(MemorySessionStore::new(Some(Session::new(
        token.clone(),
        Some("R1".to_string()),
    ))));
    let client = Client::new(&config, store.clone()).unwrap();
    (client, store, token)
}

async fn no_refresh_expected(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accessToken": "T9"})))
        .expect(0)
        .mount(server)
        .await;
}

#[tokio::test]
async fn admin_role_update_joins_roles_into_one_string() {
    let server = MockServer::start().await;
    let (client, _store, token) = logged_in(&server);
    Mock::given(method("PATCH"))
        .and(path(format!("{USERS_ADMIN}/7/roles")))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .and(body_json(json!({"roles": "USER,ADMIN"})))
        .respond_with(enveloped(json!({"id": 7, "roles": "USER,ADMIN"})))
        .expect(1)
        .mount(&server)
        .await;

    let updated = client
        .admin_update_user_roles(7, &["USER".to_string(), "ADMIN".to_string()])
        .await
        .unwrap();
    assert_eq!(updated, json!({"id": 7, "roles": "USER,ADMIN"}));
}

#[tokio::test]
async fn admin_status_update_sends_status_body() {
    let server = MockServer::start().await;
    let (client, _store, _token) = logged_in(&server);
    Mock::given(method("PATCH"))
        .and(path(format!("{USERS_ADMIN}/12/status")))
        .and(body_json(json!({"status": "BANNED"})))
        .respond_with(enveloped(json!({"id": 12, "status": "BANNED"})))
        .expect(1)
        .mount(&server)
        .await;

    let updated = client.admin_update_user_status(12, "BANNED").await.unwrap();
    assert_eq!(updated["status"], "BANNED");
}

#[tokio::test]
async fn admin_user_list_drops_blank_filters() {
    let server = MockServer::start().await;
    let (client, _store, _token) = logged_in(&server);
    Mock::given(method("GET"))
        .and(path(USERS_ADMIN))
        .and(query_param("keyword", "lan"))
        .and(query_param_is_missing("status"))
        .and(query_param("page", "0"))
        .and(query_param("size", "20"))
        .respond_with(enveloped(json!({"content": [], "totalElements": 0})))
        .expect(1)
        .mount(&server)
        .await;

    let filter = UserFilter {
        status: Some("  ".to_string()),
        keyword: Some("lan".to_string()),
    };
    let page = client
        .admin_list_users(&filter, AdminPage::default())
        .await
        .unwrap();
    assert_eq!(page["totalElements"], 0);
}

#[tokio::test]
async fn admin_post_list_filters_by_author() {
    let server = MockServer::start().await;
    let (client, _store, _token) = logged_in(&server);
    Mock::given(method("GET"))
        .and(path("/api/admin/social/posts"))
        .and(query_param("authorId", "3"))
        .and(query_param_is_missing("visibility"))
        .and(query_param("size", "5"))
        .respond_with(enveloped(json!({"content": [{"id": 1}]})))
        .expect(1)
        .mount(&server)
        .await;

    let filter = PostFilter {
        author_id: Some(3),
        visibility: Some(String::new()),
    };
    let posts = client
        .admin_list_posts(&filter, AdminPage { page: 0, size: 5 })
        .await
        .unwrap();
    assert_eq!(posts["content"], json!([{"id": 1}]));
}

#[tokio::test]
async fn admin_comment_delete_targets_nested_path() {
    let server = MockServer::start().await;
    let (client, _store, _token) = logged_in(&server);
    Mock::given(method("DELETE"))
        .and(path("/api/admin/social/posts/4/comments/9"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(client.admin_delete_comment(4, 9).await.unwrap(), Value::Null);
}

#[tokio::test]
async fn like_and_unlike_decode_the_enveloped_count() {
    let server = MockServer::start().await;
    let (client, _store, token) = logged_in(&server);
    let bearer = format!("Bearer {token}");
    Mock::given(method("POST"))
        .and(path("/api/social/posts/5/like"))
        .and(header("authorization", bearer.as_str()))
        .respond_with(enveloped(json!(6)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/social/posts/5/like"))
        .and(header("authorization", bearer.as_str()))
        .respond_with(enveloped(json!(5)))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(client.like_post(5).await.unwrap(), 6);
    assert_eq!(client.unlike_post(5).await.unwrap(), 5);
}

#[tokio::test]
async fn otp_calls_carry_no_bearer_and_never_refresh() {
    let server = MockServer::start().await;
    let (client, store, _token) = logged_in(&server);
    no_refresh_expected(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/social/auth/verify-otp"))
        .and(body_json(json!({"email": "lan@example.com", "code": "123456"})))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad code"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/social/auth/resend-otp"))
        .and(body_json(json!({"email": "lan@example.com"})))
        .respond_with(enveloped(json!("sent")))
        .expect(1)
        .mount(&server)
        .await;

    let err = client
        .verify_otp("lan@example.com", "123456")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Upstream { .. }), "{err:?}");
    assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));

    let resent = client.resend_otp("lan@example.com").await.unwrap();
    assert_eq!(resent, json!("sent"));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert!(
        requests
            .iter()
            .all(|r| r.headers.get("authorization").is_none())
    );
    // An anonymous rejection says nothing about the stored session.
    assert!(store.load().unwrap().is_some());
}

#[tokio::test]
async fn register_sends_camel_case_payload_anonymously() {
    let server = MockServer::start().await;
    let (client, _store, _token) = logged_in(&server);
    Mock::given(method("POST"))
        .and(path("/api/social/auth/register"))
        .and(body_json(json!({
            "email": "lan@example.com",
            "password": "hunter22",
            "displayName": "Lan",
        })))
        .respond_with(enveloped(json!({"pendingVerification": true})))
        .expect(1)
        .mount(&server)
        .await;

    let registered = client
        .register(&RegisterRequest {
            email: "lan@example.com".to_string(),
            password: "hunter22".to_string(),
            display_name: "Lan".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(registered["pendingVerification"], true);
    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn law_search_returns_the_raw_body() {
    let server = MockServer::start().await;
    let (client, _store, _token) = logged_in(&server);
    Mock::given(method("GET"))
        .and(path("/laws/search"))
        .and(query_param("q", "land use"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"hits": [{"id": "L1"}]})))
        .expect(1)
        .mount(&server)
        .await;

    let hits = client.search_laws("land use").await.unwrap();
    assert_eq!(hits, json!({"hits": [{"id": "L1"}]}));
}

#[tokio::test]
async fn ask_posts_snake_case_question_to_rag() {
    let server = MockServer::start().await;
    let (client, _store, _token) = logged_in(&server);
    Mock::given(method("POST"))
        .and(path("/ask"))
        .and(body_json(json!({
            "question": "Who owns the land?",
            "effective_at": "2024-07-01",
            "options": {"k": 3},
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answer": "The state.",
            "decision": "answered",
            "citations": [{"law": "L1"}],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let answer = client
        .ask(&AskRequest {
            question: "Who owns the land?".to_string(),
            effective_at: Some("2024-07-01".to_string()),
            options: Some(AskOptions { k: 3 }),
        })
        .await
        .unwrap();
    assert_eq!(answer.answer.as_deref(), Some("The state."));
    assert_eq!(answer.decision.as_deref(), Some("answered"));
    assert_eq!(answer.citations, Some(json!([{"law": "L1"}])));
    assert_eq!(answer.context, None);
}

#[tokio::test]
async fn rag_admin_calls_hit_their_endpoints() {
    let server = MockServer::start().await;
    let (client, _store, _token) = logged_in(&server);
    Mock::given(method("GET"))
        .and(path("/admin/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"indexed": 42})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/admin/reindex"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"started": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/admin/reload_patterns"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"patterns": 7})))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(client.rag_status().await.unwrap(), json!({"indexed": 42}));
    assert_eq!(client.rag_reindex().await.unwrap(), json!({"started": true}));
    assert_eq!(
        client.rag_reload_patterns().await.unwrap(),
        json!({"patterns": 7})
    );
}

#[tokio::test]
async fn law_admin_node_searches_send_their_filters() {
    let server = MockServer::start().await;
    let (client, _store, _token) = logged_in(&server);
    Mock::given(method("GET"))
        .and(path("/api/admin/laws/nodes/search"))
        .and(header("x-api-key", "secret"))
        .and(query_param("keyword", "lease"))
        .and(query_param("effectiveAt", "2024-01-01"))
        .and(query_param("page", "1"))
        .and(query_param("size", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": [{"id": 8}]})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/admin/laws/nodes/search/fulltext"))
        .and(header("x-api-key", "secret"))
        .and(query_param("q", "lease term"))
        .and(query_param("page", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": []})))
        .expect(1)
        .mount(&server)
        .await;

    let admin = client.law_admin(Some("secret")).unwrap();
    let nodes = admin
        .search_nodes(
            Some("lease"),
            Some("2024-01-01"),
            AdminPage {
                page: 1,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(nodes["content"], json!([{"id": 8}]));

    let fulltext = admin
        .search_nodes_fulltext(Some("lease term"), AdminPage::default())
        .await
        .unwrap();
    assert_eq!(fulltext, json!({"content": []}));
}

#[tokio::test]
async fn law_admin_qa_analyze_posts_body_with_effective_date() {
    let server = MockServer::start().await;
    let (client, _store, _token) = logged_in(&server);
    Mock::given(method("POST"))
        .and(path("/api/admin/laws/qa/analyze"))
        .and(header("x-api-key", "secret"))
        .and(query_param("effectiveAt", "2023-05-01"))
        .and(body_json(json!({"question": "Is a verbal lease valid?"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"nodes": [3, 4]})))
        .expect(1)
        .mount(&server)
        .await;

    let analysis = client
        .law_admin(Some("secret"))
        .unwrap()
        .qa_analyze(
            json!({"question": "Is a verbal lease valid?"}),
            Some("2023-05-01"),
        )
        .await
        .unwrap();
    assert_eq!(analysis, json!({"nodes": [3, 4]}));
}

#[tokio::test]
async fn law_upload_sends_file_and_meta_parts() {
    let server = MockServer::start().await;
    let (client, _store, _token) = logged_in(&server);
    Mock::given(method("POST"))
        .and(path("/api/admin/laws/upload"))
        .and(header("x-api-key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"lawId": 11})))
        .expect(2)
        .mount(&server)
        .await;

    let admin = client.law_admin(Some("secret")).unwrap();
    let meta = json!({"title": "Civil Code", "docType": "LAW"});
    let uploaded = admin
        .upload_law(
            Some(Attachment {
                file_name: "civil.pdf".to_string(),
                mime: Some("application/pdf".to_string()),
                bytes: b"%PDF-1.7".to_vec(),
            }),
            &meta,
        )
        .await
        .unwrap();
    assert_eq!(uploaded, json!({"lawId": 11}));
    admin.upload_law(None, &meta).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let with_file = String::from_utf8_lossy(&requests[0].body);
    assert!(with_file.contains(r#"name="file"; filename="civil.pdf""#));
    assert!(with_file.contains("%PDF-1.7"));
    assert!(with_file.contains(r#"name="meta""#));
    assert!(with_file.contains(&meta.to_string()));

    let meta_only = String::from_utf8_lossy(&requests[1].body);
    assert!(!meta_only.contains(r#"name="file""#));
    assert!(meta_only.contains(&meta.to_string()));
    assert!(requests[1].headers.get("authorization").is_none());
}
