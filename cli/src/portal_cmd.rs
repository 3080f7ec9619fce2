use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use lawer_backend_client::Client;
use lawer_backend_client::types::AskOptions;
use lawer_backend_client::types::AskRequest;
use lawer_backend_client::types::Attachment;
use lawer_backend_client::types::DEFAULT_PAGE_SIZE;
use lawer_backend_client::types::DEFAULT_VISIBILITY;
use lawer_backend_client::types::NewPost;
use lawer_backend_client::types::PageParams;
use serde_json::json;

use crate::print_json;

#[derive(Debug, Clone, Copy, clap::Args)]
pub struct PageArgs {
    /// Zero-based page index.
    #[arg(long, default_value_t = 0)]
    pub page: u32,

    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub size: u32,
}

impl From<PageArgs> for PageParams {
    fn from(args: PageArgs) -> Self {
        PageParams {
            page: args.page,
            size: args.size,
        }
    }
}

#[derive(Debug, clap::Parser)]
pub struct PostArgs {
    #[arg(long)]
    pub content: String,

    /// PUBLIC, FRIENDS or PRIVATE.
    #[arg(long, default_value = DEFAULT_VISIBILITY)]
    pub visibility: String,

    /// Image or video to attach; repeat for several files.
    #[arg(long = "file", value_name = "PATH")]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, clap::Parser)]
pub struct AskArgs {
    pub question: String,

    /// Answer as of this date (YYYY-MM-DD).
    #[arg(long)]
    pub effective_at: Option<String>,

    /// Number of passages to retrieve.
    #[arg(short = 'k')]
    pub k: Option<u32>,
}

pub(crate) async fn run_profile(client: &Client) -> Result<()> {
    print_json(&client.profile().await?)
}

pub(crate) async fn run_feed(client: &Client, page: PageArgs) -> Result<()> {
    print_json(&client.feed(page.into()).await?)
}

pub(crate) async fn run_post(client: &Client, args: PostArgs) -> Result<()> {
    let PostArgs {
        content,
        visibility,
        files,
    } = args;
    let files = files
        .iter()
        .map(PathBuf::as_path)
        .map(read_attachment)
        .collect::<Result<Vec<_>>>()?;
    let post = client
        .create_post(NewPost {
            content,
            visibility,
            files,
        })
        .await?;
    print_json(&post)
}

fn read_attachment(path: &Path) -> Result<Attachment> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    let mime = mime_guess::from_path(path).first().map(|m| m.essence_str().to_string());
    Ok(Attachment {
        file_name,
        mime,
        bytes,
    })
}

pub(crate) async fn run_like(client: &Client, post_id: i64, like: bool) -> Result<()> {
    let like_count = if like {
        client.like_post(post_id).await?
    } else {
        client.unlike_post(post_id).await?
    };
    print_json(&json!({ "postId": post_id, "likeCount": like_count }))
}

pub(crate) async fn run_comments(client: &Client, post_id: i64, page: PageArgs) -> Result<()> {
    print_json(&client.list_comments(post_id, page.into()).await?)
}

pub(crate) async fn run_comment(client: &Client, post_id: i64, content: &str) -> Result<()> {
    print_json(&client.add_comment(post_id, content).await?)
}

pub(crate) async fn run_search_laws(client: &Client, query: &str) -> Result<()> {
    print_json(&client.search_laws(query).await?)
}

pub(crate) async fn run_ask(client: &Client, args: AskArgs) -> Result<()> {
    let AskArgs {
        question,
        effective_at,
        k,
    } = args;
    let request = AskRequest {
        question,
        effective_at,
        options: k.map(|k| AskOptions { k }),
    };
    print_json(&client.ask(&request).await?)
}
