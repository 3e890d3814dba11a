use std::time::Duration;
use indicatif::HumanDuration;
use owo_colors::OwoColorize;
use crate::discovery::DiscoverySummary;
use crate::miner::MiningSummary;
use crate::ui::{theme, Icons};

pub fn header(text: &str) {
    println!("{} {}", Icons::ROCKET, text.style(theme().header.clone()));
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().info.clone()),
        label.style(theme().dim.clone()),
        value
    );
}

pub fn section(icon: &str, title: &str) {
    println!();
    println!("{} {}", icon, title.style(theme().header.clone()));
}

pub fn summary_row(label: &str, value: impl std::fmt::Display) {
    println!("  {:<18} {}", label.style(theme().dim.clone()), value.style(theme().count.clone()));
}

pub fn timing(elapsed: Duration) {
    println!("{} {}", Icons::CLOCK.style(theme().dim.clone()), HumanDuration(elapsed));
}

pub fn discovery_summary(summary: &DiscoverySummary, elapsed: Duration) {
    section(Icons::SEARCH, "Discovery finished");
    summary_row("New repositories", summary.found);
    summary_row("Pages fetched", summary.pages);
    summary_row("Star windows", summary.windows);
    summary_row("Rate limited", summary.rate_limited);
    timing(elapsed);
}

pub fn mining_summary(summary: &MiningSummary, elapsed: Duration) {
    section(Icons::PICK, "Mining finished");
    summary_row("Processed", summary.processed);
    summary_row("Analyzed", summary.analyzed);
    summary_row("Clone failures", summary.clone_failures);
    summary_row("Analyzer failures", summary.analyzer_failures);
    summary_row("Left pending", summary.unmarked);
    summary_row("New matches", summary.matches);
    timing(elapsed);
    if summary.unmarked > 0 {
        warn(&format!(
            "{} repositories could not be marked and will be retried on the next run",
            summary.unmarked
        ));
    }
}
