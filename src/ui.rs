use colored::Colorize;
use tfkit::ErrorCategory;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print one line of streamed command output
pub fn output_line(line: &str) {
    println!("{} {}", "│".dimmed(), line);
}

/// Print what kind of failure happened and how to get past it
pub fn category(category: ErrorCategory) {
    eprintln!("  {} {}", "kind:".dimmed(), category.description());
    eprintln!("  {} {}", "hint:".cyan(), category.advice());
}

// ============================================================================
// Trees
// ============================================================================

/// Print pre-rendered tree lines, emphasizing top-level nodes
pub fn tree(lines: &[String]) {
    for line in lines {
        if line.starts_with(' ') {
            println!("{line}");
        } else {
            println!("{}", line.bold());
        }
    }
}
