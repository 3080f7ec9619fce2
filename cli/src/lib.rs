//! `lawer`: command line front end for the Lawer portal services.

mod config_command;
mod portal_cmd;
mod session_cmd;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use lawer_backend_client::Client;
use lawer_backend_client::ClientError;
use lawer_backend_client::find_lawer_home;
use lawer_login::FileSessionStore;
use lawer_login::SessionEvent;
use tracing::warn;
use tracing_subscriber::EnvFilter;

pub use portal_cmd::AskArgs;
pub use portal_cmd::PageArgs;
pub use portal_cmd::PostArgs;
pub use session_cmd::LoginArgs;

#[derive(Debug, Parser)]
#[command(name = "lawer", version, about = "Lawer portal client")]
pub struct Cli {
    /// Client home directory. Defaults to `$LAWER_HOME` or `~/.lawer`.
    #[arg(long, global = true, value_name = "DIR")]
    pub home: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in with email and password and store the session.
    Login(LoginArgs),
    /// Forget the stored session.
    Logout,
    /// Show who the stored access token belongs to and when it expires.
    Whoami,
    /// Fetch the profile of the logged-in user.
    Profile,
    /// List the public feed.
    Feed(PageArgs),
    /// Publish a post.
    Post(PostArgs),
    /// Like a post.
    Like { post_id: i64 },
    /// Remove a like from a post.
    Unlike { post_id: i64 },
    /// List comments of a post.
    Comments {
        post_id: i64,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Comment on a post.
    Comment { post_id: i64, content: String },
    /// Search the law corpus.
    SearchLaws { query: String },
    /// Ask the legal assistant a question.
    Ask(AskArgs),
    /// Print the effective configuration.
    Config,
}

/// Install the stderr logger. `RUST_LOG` selects the level, `warn` otherwise.
pub fn init_tracing() {
    let default_level = "warn";
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let lawer_home = match self.home {
            Some(home) => home,
            None => find_lawer_home().context("failed to resolve LAWER_HOME")?,
        };
        let print_config = matches!(self.command, Command::Config);
        let config = config_command::validate_config(&lawer_home, print_config);
        if print_config {
            return Ok(());
        }

        let store = Arc::new(FileSessionStore::new(&lawer_home));
        let client = Client::new(&config, store).context("failed to build HTTP client")?;
        spawn_session_watcher(&client);

        let result = match self.command {
            Command::Login(args) => session_cmd::run_login(&client, args).await,
            Command::Logout => session_cmd::run_logout(&client),
            Command::Whoami => session_cmd::run_whoami(&client),
            Command::Profile => portal_cmd::run_profile(&client).await,
            Command::Feed(page) => portal_cmd::run_feed(&client, page).await,
            Command::Post(args) => portal_cmd::run_post(&client, args).await,
            Command::Like { post_id } => portal_cmd::run_like(&client, post_id, true).await,
            Command::Unlike { post_id } => portal_cmd::run_like(&client, post_id, false).await,
            Command::Comments { post_id, page } => {
                portal_cmd::run_comments(&client, post_id, page).await
            }
            Command::Comment { post_id, content } => {
                portal_cmd::run_comment(&client, post_id, &content).await
            }
            Command::SearchLaws { query } => portal_cmd::run_search_laws(&client, &query).await,
            Command::Ask(args) => portal_cmd::run_ask(&client, args).await,
            Command::Config => Ok(()),
        };
        result.map_err(explain_auth_failure)
    }
}

/// Log when the session is dropped after a failed refresh. The CLI may exit
/// before the delayed notification arrives; the error returned to the user
/// carries the same hint.
fn spawn_session_watcher(client: &Client) {
    let mut events = client.session().subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let SessionEvent::Invalidated { reason } = event {
                warn!("session expired ({reason}); please log in again with `lawer login`");
            }
        }
    });
}

fn explain_auth_failure(err: anyhow::Error) -> anyhow::Error {
    let unauthenticated = err
        .downcast_ref::<ClientError>()
        .is_some_and(ClientError::is_unauthenticated);
    if unauthenticated {
        err.context("not logged in or session expired; run `lawer login`")
    } else {
        err
    }
}

pub(crate) fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    println!("{text}");
    Ok(())
}
