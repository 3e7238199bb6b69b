// Transfer status display - shows what the state file says has been moved.

use colored::Colorize;

use crate::pipeline::state::StateStore;

/// Display the state file summary to the terminal.
pub fn show(store: &StateStore) {
    let path = store.path();

    if let Some(warning) = store.load_warning() {
        println!("{} {}", "Warning:".yellow(), warning);
        return;
    }

    if !path.exists() {
        println!("State file: {} (not created yet)", path.display());
        println!("\nNo posts transferred. Run `mastodon-to-bluesky transfer` to start.");
        return;
    }

    let file_size = std::fs::metadata(path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("State file: {} ({})", path.display(), file_size);

    let state = store.state();
    println!("Posts transferred: {}", state.transferred_ids.len());
    match &state.last_mastodon_id {
        Some(id) => println!("Last Mastodon post: {id}"),
        None => println!("Last Mastodon post: none"),
    }
    println!(
        "Last updated: {}",
        state.last_updated.format("%Y-%m-%d %H:%M:%S UTC")
    );
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
