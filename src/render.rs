//! Plain-text views for the command line.
//!
//! Everything here is a pure function of the controller state so the CLI can
//! print it and tests can assert on it.

use chrono::{DateTime, Local};
use std::fmt::Write as _;

use crate::app::App;
use crate::model::{Article, Comment, User};
use crate::util::{display_width, first_line, truncate_to_width};

pub const DEFAULT_WIDTH: usize = 100;

const TICKER_LABEL: &str = "מבזק";
const SEPARATOR: &str = " | ";

/// `dd/mm/yyyy HH:MM` in local time; unknown instants render as `-`.
pub fn format_timestamp(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|utc| utc.with_timezone(&Local).format("%d/%m/%Y %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn rule(width: usize) -> String {
    "-".repeat(width.min(DEFAULT_WIDTH))
}

/// One line with every live breaking headline, or `None` when there are none.
pub fn ticker(breaking: &[&Article], width: usize) -> Option<String> {
    if breaking.is_empty() {
        return None;
    }
    let titles: Vec<&str> = breaking.iter().map(|a| a.title.as_str()).collect();
    let line = format!("[{}] {}", TICKER_LABEL, titles.join(SEPARATOR));
    Some(truncate_to_width(&line, width).into_owned())
}

/// Single grid row: id, category, headline and byline.
pub fn article_row(article: &Article, width: usize) -> String {
    let prefix = format!("{:<10} {:<10} ", article.id, article.category.label());
    let byline = format!("  ({}, {})", article.author, format_timestamp(article.created_at));
    let budget = width.saturating_sub(display_width(&prefix) + display_width(&byline));
    format!("{}{}{}", prefix, truncate_to_width(&article.title, budget.max(8)), byline)
}

fn hero(article: &Article, width: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", truncate_to_width(&article.title, width));
    if !article.subtitle.is_empty() {
        let _ = writeln!(out, "{}", truncate_to_width(&article.subtitle, width));
    }
    let _ = writeln!(
        out,
        "{} · {} · {} · id {}",
        article.category.label(),
        article.author,
        format_timestamp(article.created_at),
        article.id
    );
    let _ = writeln!(out, "{}", truncate_to_width(first_line(&article.content), width));
    out
}

/// Home view: ticker, hero and the remaining grid.
pub fn home(app: &App, width: usize) -> String {
    let mut out = String::new();
    if let Some(line) = ticker(&app.breaking_news(), width) {
        let _ = writeln!(out, "{line}");
        let _ = writeln!(out, "{}", rule(width));
    }

    if let Some(category) = app.category() {
        let _ = writeln!(out, "קטגוריה: {}", category.label());
    }
    if !app.search().is_empty() {
        let _ = writeln!(out, "חיפוש: {}", app.search());
    }

    if let Some(article) = app.hero_article() {
        out.push_str(&hero(article, width));
        let _ = writeln!(out, "{}", rule(width));
    }

    let list = app.list_articles();
    if list.is_empty() && app.hero_article().is_none() {
        let _ = writeln!(out, "לא נמצאו כתבות.");
    }
    for article in list {
        let _ = writeln!(out, "{}", article_row(article, width));
    }
    out
}

fn comment_line(comment: &Comment, deletable: bool) -> String {
    let marker = if deletable { " [x]" } else { "" };
    format!(
        "  {} ({}, {}){}: {}",
        comment.user_name,
        comment.id,
        format_timestamp(comment.created_at),
        marker,
        comment.text
    )
}

/// Full article with its comments. Comments the viewer may delete are
/// marked `[x]`.
pub fn article_detail(app: &App, article: &Article, width: usize) -> String {
    let mut out = String::new();
    if article.is_breaking_at(app.now()) {
        let _ = writeln!(out, "[{TICKER_LABEL}]");
    }
    let _ = writeln!(out, "{}", article.title);
    if !article.subtitle.is_empty() {
        let _ = writeln!(out, "{}", article.subtitle);
    }
    let _ = writeln!(
        out,
        "{} · {} · {}",
        article.category.label(),
        article.author,
        format_timestamp(article.created_at)
    );
    if !article.image_url.is_empty() {
        let image = if article.image_url.starts_with("data:") {
            "<תמונה מוטמעת>"
        } else {
            article.image_url.as_str()
        };
        let _ = writeln!(out, "{image}");
    }
    let _ = writeln!(out, "{}", rule(width));
    let _ = writeln!(out, "{}", article.content);
    let _ = writeln!(out, "{}", rule(width));

    let _ = writeln!(out, "תגובות ({})", article.comments.len());
    for comment in &article.comments {
        let _ = writeln!(out, "{}", comment_line(comment, app.can_delete_comment(comment)));
    }
    out
}

pub fn user_line(user: Option<&User>) -> String {
    match user {
        Some(user) if user.is_admin() => format!("{} (מנהל)", user.name),
        Some(user) => user.name.clone(),
        None => "אורח".to_string(),
    }
}

/// Where articles are read from and written to.
pub fn storage_line(remote_backed: bool) -> &'static str {
    if remote_backed {
        "אחסון: מאגר מרוחק"
    } else {
        "אחסון: מקומי בלבד"
    }
}
