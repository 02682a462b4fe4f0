//! User-visible output
//!
//! [`Logger`] prints what the CLI reports to the user. Diagnostics from the
//! library go through `tracing` instead.

use std::time::{Duration, Instant};

/// Logger responsible for all user-visible output
#[derive(Debug, Clone)]
pub struct Logger {
    pub verbose: bool,
    pub quiet: bool,
    pub start_time: Instant,
}

impl Logger {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            quiet: false,
            start_time: Instant::now(),
        }
    }

    pub fn new_quiet() -> Self {
        Self {
            verbose: false,
            quiet: true,
            start_time: Instant::now(),
        }
    }

    /// Main section heading
    pub fn section(&self, title: &str) {
        if !self.quiet {
            println!("\n=== {} ===", title);
        }
    }

    /// Sub-section heading
    pub fn subsection(&self, title: &str) {
        if !self.quiet {
            println!("\n--- {} ---", title);
        }
    }

    pub fn info(&self, message: &str) {
        if !self.quiet {
            println!("ℹ️  {}", message);
        }
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("✅ {}", message);
        }
    }

    pub fn warning(&self, message: &str) {
        if !self.quiet {
            println!("⚠️  WARNING: {}", message);
        }
    }

    /// Always shown, even when quiet
    pub fn error(&self, message: &str) {
        eprintln!("❌ ERROR: {}", message);
    }

    pub fn step(&self, message: &str) {
        if !self.quiet {
            println!("▶️  {}", message);
        }
    }

    /// Detailed information (only shown in verbose mode)
    pub fn detail(&self, message: &str) {
        if self.verbose && !self.quiet {
            println!("   {}", message);
        }
    }

    /// Key-value pair summary display
    pub fn summary_kv(&self, title: &str, items: &[(&str, String)]) {
        if !self.quiet {
            self.subsection(title);
            for line in render_kv(items) {
                println!("{}", line);
            }
        }
    }

    /// Numbered list
    pub fn list(&self, title: &str, items: &[String]) {
        if !self.quiet {
            self.subsection(title);
            for line in render_list(items) {
                println!("{}", line);
            }
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Format duration in human-readable format
    pub fn format_duration(&self, duration: Duration) -> String {
        let secs = duration.as_secs();
        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m{}s", secs / 60, secs % 60)
        } else {
            format!("{}h{}m{}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }
}

fn render_kv(items: &[(&str, String)]) -> Vec<String> {
    let width = items.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    items
        .iter()
        .map(|(key, value)| format!("  {:<width$}  {}", format!("{}:", key), value, width = width + 1))
        .collect()
}

fn render_list(items: &[String]) -> Vec<String> {
    if items.is_empty() {
        return vec!["  (No items to display)".to_string()];
    }
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("  {}. {}", i + 1, item))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_keys_are_aligned() {
        let lines = render_kv(&[("Name", "widget".to_string()), ("Digest", "sha256:ab".to_string())]);
        assert_eq!(lines, vec!["  Name:    widget", "  Digest:  sha256:ab"]);
    }

    #[test]
    fn list_is_numbered() {
        assert_eq!(
            render_list(&["a".to_string(), "b".to_string()]),
            vec!["  1. a", "  2. b"]
        );
        assert_eq!(render_list(&[]), vec!["  (No items to display)"]);
    }

    #[test]
    fn durations_are_compact() {
        let logger = Logger::new_quiet();
        assert_eq!(logger.format_duration(Duration::from_secs(59)), "59s");
        assert_eq!(logger.format_duration(Duration::from_secs(3661)), "1h1m1s");
    }
}
