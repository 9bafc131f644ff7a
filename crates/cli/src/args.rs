//! Command-line arguments for the `newsfeed` binary.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "Browse the news feed from the terminal")]
pub struct Args {
    /// Origin the client behaves as if it were served from
    #[arg(long, env = "NEWSFEED_LOCATION", default_value = "http://localhost")]
    pub location: String,

    /// Print raw JSON instead of a summary
    #[arg(long)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the feed, newest first
    Articles {
        /// Number of pages to load
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Show one article and mark it read
    Article { id: i64 },
    /// Articles related to the given one
    Related { id: i64 },
    /// Save an article for later
    Save { id: i64 },
    /// Remove an article from the saved list
    Unsave { id: i64 },
    /// List RSS sources
    Sources,
    /// Register a new RSS source
    AddSource {
        name: String,
        url: String,
        #[arg(long)]
        category: Option<String>,
    },
    /// Sign in and remember the session
    Login {
        username: String,
        #[arg(env = "NEWSFEED_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in
    Register {
        username: String,
        #[arg(env = "NEWSFEED_PASSWORD", hide_env_values = true)]
        password: String,
        /// Repeat the password
        #[arg(long)]
        confirm: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Saved articles
    Saved,
    /// Reading history
    History,
    /// Ask the backend to crawl all sources now
    Crawl,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_articles_pages() {
        let args = Args::try_parse_from(["newsfeed", "articles", "--pages", "3"]).unwrap();
        assert!(matches!(args.command, Command::Articles { pages: 3 }));
        assert_eq!(args.location, "http://localhost");
    }

    #[test]
    fn test_parse_add_source() {
        let args =
            Args::try_parse_from(["newsfeed", "add-source", "Tech Feed", "https://example.com/rss", "--category", "tech"])
                .unwrap();
        match args.command {
            Command::AddSource { name, url, category } => {
                assert_eq!(name, "Tech Feed");
                assert_eq!(url, "https://example.com/rss");
                assert_eq!(category.as_deref(), Some("tech"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_article_requires_numeric_id() {
        assert!(Args::try_parse_from(["newsfeed", "article", "abc"]).is_err());
    }
}
