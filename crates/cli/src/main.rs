//! newsfeed command-line entry point.
//!
//! Behaves like a page served from `--location`, so it uses the same base-URL
//! rules and persisted session as the browser client. Logging goes to stderr.

use std::sync::Arc;

use anyhow::{Result, bail};
use clap::Parser;
use newsfeed_client::{ExecutionContext, NewsQueries, PageLocation, Session};
use newsfeed_core::{AppConfig, Article, CredentialStore, FileCredentials, Source, SourceCreate};
use tracing_subscriber::EnvFilter;

mod args;

use args::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = AppConfig::load()?;
    let location = PageLocation::parse(&args.location)?;
    let store: Arc<dyn CredentialStore> = Arc::new(FileCredentials::open(&config.credentials_path)?);

    let news = NewsQueries::from_config(&config, ExecutionContext::Page(location), Some(store.clone()))?;
    let session = Session::new(news.auth().clone(), store);
    let listener = session.spawn_listener(news.transport().subscribe(), |to| {
        eprintln!("Session expired. Sign in again ({to}).");
    });

    let result = run(args.command, args.json, &news, &session).await;

    // The listener ends once every transport is gone; a queued 401 notice still prints.
    drop(news);
    drop(session);
    if let Err(e) = listener.await {
        tracing::warn!("session listener failed: {}", e);
    }

    result
}

async fn run(command: Command, json: bool, news: &NewsQueries, session: &Session) -> Result<()> {
    match command {
        Command::Articles { pages } => {
            let mut feed = news.feed().await?;
            while (feed.page_count() as u32) < pages && feed.has_next_page() {
                feed = news.feed_next_page().await?;
            }
            print_articles(&feed.into_items(), json)?;
        }
        Command::Article { id } => {
            let article = news.article(id).await?;
            if session.init().await?.is_some() {
                news.mark_read(id).await?;
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&article)?);
            } else {
                print_article_detail(&article);
            }
        }
        Command::Related { id } => print_articles(&news.related_articles(id).await?, json)?,
        Command::Save { id } => {
            news.save_article(id).await?;
            println!("Saved article {id}");
        }
        Command::Unsave { id } => {
            news.unsave_article(id).await?;
            println!("Removed article {id} from saved");
        }
        Command::Sources => print_sources(&news.sources().await?, json)?,
        Command::AddSource { name, url, category } => {
            let source = news.create_source(SourceCreate { name, url, category }).await?;
            println!("Added source {} ({})", source.name, source.id);
        }
        Command::Login { username, password } => {
            let user = session.login(&username, &password).await?;
            println!("Signed in as {} ({})", user.username, user.role.as_str());
        }
        Command::Register { username, password, confirm } => {
            let user = session.register(&username, &password, &confirm).await?;
            println!("Registered and signed in as {}", user.username);
        }
        Command::Logout => {
            session.logout()?;
            println!("Signed out");
        }
        Command::Whoami => match session.init().await? {
            Some(user) => println!("{} ({})", user.username, user.role.as_str()),
            None => bail!("not signed in"),
        },
        Command::Saved => print_articles(&news.saved_articles().await?, json)?,
        Command::History => print_articles(&news.reading_history().await?, json)?,
        Command::Crawl => {
            let ack = news.trigger_crawl().await?;
            println!("{ack}");
        }
    }

    Ok(())
}

fn print_articles(articles: &[Article], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(articles)?);
        return Ok(());
    }

    if articles.is_empty() {
        println!("No articles");
    }
    for article in articles {
        let date = article
            .published_at()
            .map(|at| at.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "----------".to_string());
        let source = article.source.as_ref().map(|s| s.name.as_str()).unwrap_or("-");
        println!("{:>6}  {}  {:<16}  {}", article.id, date, source, article.title);
    }
    Ok(())
}

fn print_article_detail(article: &Article) {
    println!("{}", article.title);
    println!("{}", article.link);
    if let Some(at) = article.published_at() {
        println!("Published {}", at.format("%Y-%m-%d %H:%M"));
    }
    if let Some(summary) = &article.summary {
        println!();
        println!("{summary}");
    }
}

fn print_sources(sources: &[Source], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(sources)?);
        return Ok(());
    }

    for source in sources {
        let status = if source.is_active { "active" } else { "paused" };
        let category = source.category.as_deref().unwrap_or("-");
        println!("{:>4}  {:<6}  {:<12}  {}  {}", source.id, status, category, source.name, source.url);
    }
    Ok(())
}
