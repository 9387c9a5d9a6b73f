pub mod article;
pub mod client;
pub mod links;
pub mod store;

pub use article::extract_article;
pub use client::Crawler;
pub use links::{extract_article_links, ArticleLink};
pub use store::{latest_articles_file, load_articles, resolve_and_load, save_articles};
