//! Renders the scan status line shown while a scan is in progress.

/// Format `(address, remaining seconds, clue count, replies, misses)` into
/// the fixed-width line the original printed during a scan.
pub struct StatusRenderer;

impl StatusRenderer {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, address: &str, remaining: i64, clues: usize, replies: u64, missed: u64) -> String {
        format!(
            "\r{address:>15} | remaining: {remaining:3} | clues: {clues:3} | replies: {replies:3} | missed: {missed:3}"
        )
    }
}

impl Default for StatusRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_all_fields() {
        let line = StatusRenderer::new().render("10.0.0.1", 5, 2, 7, 1);
        assert!(line.contains("10.0.0.1"));
        assert!(line.contains("remaining:   5"));
        assert!(line.contains("clues:   2"));
        assert!(line.contains("replies:   7"));
        assert!(line.contains("missed:   1"));
    }
}
