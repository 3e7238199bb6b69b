// Colored terminal output for transfer runs and source listings.
//
// This module handles all terminal-specific formatting. The pipeline and
// main.rs call into it and never print directly.

use colored::Colorize;

use crate::models::{SourcePost, TransferStats};
use crate::pipeline::normalize::html_to_text;

/// Rows shown by `display_posts_table`.
const TABLE_ROWS: usize = 10;

/// Show what a dry run would send for one post.
pub fn display_preview(post: &SourcePost, chunks: &[String], image_count: usize) {
    let mut header = format!("Would transfer post {}", post.id);
    if chunks.len() > 1 {
        header.push_str(&format!(" as a {}-post thread", chunks.len()));
    }
    if image_count > 0 {
        header.push_str(&format!(" with {image_count} image(s)"));
    }
    println!("{}", header.dimmed());

    for chunk in chunks {
        let preview = super::truncate_chars(&super::single_line(chunk), 70);
        println!("    {}", preview.dimmed());
    }
}

/// Report a failed post to the operator.
pub fn display_post_error(id: &str, error: &anyhow::Error) {
    println!("{}", format!("Error transferring post {id}: {error:#}").red());
}

/// Final run summary.
pub fn display_summary(stats: &TransferStats, dry_run: bool) {
    println!();
    println!("{}", "Transfer complete!".green().bold());
    println!("  Posts processed:   {}", stats.processed);
    println!("  Posts transferred: {}", stats.transferred);
    println!("  Posts skipped:     {}", stats.skipped);
    if stats.errors > 0 {
        println!("  {}", format!("Errors: {}", stats.errors).yellow());
    }

    if dry_run {
        println!();
        println!(
            "{}",
            "This was a dry run. No posts were actually transferred.".yellow()
        );
    }
}

/// Short label for what kind of post this is.
pub fn post_kind(post: &SourcePost) -> &'static str {
    if post.is_boost() {
        "boost"
    } else if post.is_reply() {
        "reply"
    } else {
        "post"
    }
}

/// Table of fetched source posts (first ten) followed by a summary.
pub fn display_posts_table(posts: &[SourcePost]) {
    println!(
        "  {:<20} {:<17} {:<50} {:>5}  {:<5}",
        "ID".dimmed(),
        "Date".dimmed(),
        "Content".dimmed(),
        "Media".dimmed(),
        "Type".dimmed(),
    );
    println!("  {}", "-".repeat(102).dimmed());

    for post in posts.iter().take(TABLE_ROWS) {
        let content = super::truncate_chars(&super::single_line(&html_to_text(&post.content)), 47);
        println!(
            "  {:<20} {:<17} {:<50} {:>5}  {:<5}",
            post.id,
            post.created_at.format("%Y-%m-%d %H:%M").to_string(),
            content,
            post.media.len(),
            post_kind(post),
        );
    }

    println!("\n{}", "Summary:".bold());
    println!("  Total posts:      {}", posts.len());
    println!(
        "  Posts with media: {}",
        posts.iter().filter(|p| !p.media.is_empty()).count()
    );
    println!("  Replies:          {}", posts.iter().filter(|p| p.is_reply()).count());
    println!("  Boosts:           {}", posts.iter().filter(|p| p.is_boost()).count());
}
