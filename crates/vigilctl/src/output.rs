//! Terminal output - ASCII only, color for status.

use owo_colors::OwoColorize;
use vigil::{CleanupSummary, ProbeSection, RunSummary};
use vigil_shared::Status;

fn colorize(text: &str, status: Status) -> String {
    match status {
        Status::Ok => text.bright_green().to_string(),
        Status::Warning => text.yellow().to_string(),
        Status::Error => text.bright_red().to_string(),
    }
}

/// `[STATUS]  title  rows  time` without color
pub fn section_line(section: &ProbeSection) -> String {
    format!(
        "{:<10} {:<24} {:>3} row(s) {:>7} ms",
        format!("[{}]", section.worst_status()),
        section.title,
        section.results.len(),
        section.elapsed_ms
    )
}

pub fn print_summary(summary: &RunSummary) {
    println!();
    println!("{}", format!("Cluster: {}", summary.cluster_name).bold());
    for section in &summary.sections {
        println!("  {}", colorize(&section_line(section), section.worst_status()));
    }

    println!();
    println!(
        "{} ok, {} warning, {} error in {:.1}s",
        summary.count(Status::Ok),
        summary.count(Status::Warning),
        summary.count(Status::Error),
        summary.elapsed.as_secs_f64()
    );
    println!("Report: {}", summary.report_path.display().cyan());
    if let Some(json) = &summary.json_path {
        println!("JSON:   {}", json.display().cyan());
    }
    print_cleanup(&summary.cleanup);
}

pub fn print_cleanup(cleanup: &CleanupSummary) {
    let text = cleanup.render();
    if cleanup.is_clean() {
        print!("{}", text);
    } else {
        print!("{}", text.bright_red());
    }
}

/// Catalog listing; `*` marks enabled probes
pub fn probe_list(entries: &[(&str, &str)], enabled: &[String]) -> String {
    let mut out = String::new();
    for (i, (name, title)) in entries.iter().enumerate() {
        let mark = if enabled.iter().any(|e| e == name) { "*" } else { " " };
        out.push_str(&format!("{} {:>2}. {:<16} {}\n", mark, i + 1, name, title));
    }
    out
}
