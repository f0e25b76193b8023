//! Consistent one-line messages.

use super::colors::SemanticStyle;

/// `✓ msg`
pub fn print_success(msg: &str) {
    println!("{} {}", "✓".success(), msg);
}

/// `✗ msg` on stderr.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".error(), msg);
}

/// `⚠ msg`
pub fn print_warn(msg: &str) {
    println!("{} {}", "⚠".warning(), msg);
}

/// A dimmed suggestion for what to run next.
pub fn print_hint(msg: &str) {
    println!("{} {}", "→".muted(), msg.muted());
}

/// An indented `key: value` line.
pub fn print_labeled(key: &str, value: &str) {
    println!("  {}: {}", key.muted(), value);
}

pub fn print_spacer() {
    println!();
}
