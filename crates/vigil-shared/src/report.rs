//! Deterministic report assembly.
//!
//! Sections are kept as structured `ProbeResult` rows and rendered to text
//! only here. Section order is the order of `add_section` calls.

use crate::error::{Result, VigilError};
use crate::result::{ProbeResult, Status};
use chrono::{DateTime, Local};
use comfy_table::{presets::ASCII_FULL, ContentArrangement, Table};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Timestamp format used in report file names (second precision)
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// Highest numeric suffix tried before giving up on a file name
const MAX_DISAMBIGUATION: u32 = 999;

/// One titled block of findings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    /// Key column and value column headers, e.g. ["Node", "Result"]
    pub headers: [String; 2],
    pub results: Vec<ProbeResult>,
}

impl Section {
    pub fn worst_status(&self) -> Status {
        crate::result::worst_status(&self.results)
    }

    /// Fixed-column table for this section
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(ASCII_FULL)
            .set_content_arrangement(ContentArrangement::Disabled)
            .set_header(vec![self.headers[0].as_str(), "Status", self.headers[1].as_str()]);

        if self.results.is_empty() {
            table.add_row(vec!["-", "-", "no results"]);
        }
        for result in &self.results {
            table.add_row(vec![
                result.title.clone(),
                result.status.to_string(),
                result.body.clone(),
            ]);
        }
        table
    }
}

/// Assembled, immutable report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub cluster_name: String,
    pub generated_at: DateTime<Local>,
    pub sections: Vec<Section>,
}

impl Report {
    /// Human readable text form
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("CLUSTER HEALTH REPORT\n");
        out.push_str("=====================\n");
        out.push_str(&format!("Cluster:   {}\n", self.cluster_name));
        out.push_str(&format!(
            "Generated: {}\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S %z")
        ));

        for section in &self.sections {
            out.push('\n');
            out.push_str(&format!("{}:\n", section.title));
            out.push_str(&section.to_table().to_string());
            out.push('\n');
        }
        out
    }

    /// Structured form for programmatic consumers
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// `{cluster}_report_{timestamp}`
    pub fn file_stem(&self) -> String {
        format!(
            "{}_report_{}",
            sanitize_cluster_name(&self.cluster_name),
            self.generated_at.format(FILE_TIMESTAMP_FORMAT)
        )
    }

    /// Write the text report into `dir` and return its path.
    ///
    /// Never overwrites: if the name is taken, `_1`, `_2`, ... is appended
    /// to the stem until a free name is found.
    pub fn persist(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let stem = self.file_stem();
        let (mut file, path) = create_unique(dir, &stem, "txt")?;
        file.write_all(self.render().as_bytes())?;
        file.sync_all()?;
        Ok(path)
    }

    /// Write the JSON form next to an already persisted text report
    pub fn persist_json(&self, text_path: &Path) -> Result<PathBuf> {
        let path = text_path.with_extension("json");
        let json = self.to_json()?;
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| VigilError::Report(format!("{}: {}", path.display(), e)))?;
        if let Err(e) = file.write_all(json.as_bytes()) {
            drop(file);
            let _ = std::fs::remove_file(&path);
            return Err(e.into());
        }
        Ok(path)
    }
}

/// Collects sections in registration order
#[derive(Debug, Clone)]
pub struct ReportAssembler {
    cluster_name: String,
    generated_at: DateTime<Local>,
    sections: Vec<Section>,
}

impl ReportAssembler {
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self::with_timestamp(cluster_name, Local::now())
    }

    pub fn with_timestamp(cluster_name: impl Into<String>, generated_at: DateTime<Local>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            generated_at,
            sections: Vec::new(),
        }
    }

    pub fn add_section(
        &mut self,
        title: impl Into<String>,
        headers: [&str; 2],
        results: Vec<ProbeResult>,
    ) -> &mut Self {
        self.sections.push(Section {
            title: title.into(),
            headers: [headers[0].to_string(), headers[1].to_string()],
            results,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn render(&self) -> String {
        self.snapshot().render()
    }

    pub fn persist(&self, dir: &Path) -> Result<PathBuf> {
        self.snapshot().persist(dir)
    }

    pub fn finish(self) -> Report {
        Report {
            cluster_name: self.cluster_name,
            generated_at: self.generated_at,
            sections: self.sections,
        }
    }

    fn snapshot(&self) -> Report {
        self.clone().finish()
    }
}

/// Keep `[A-Za-z0-9._-]`, replace everything else with `_`
pub fn sanitize_cluster_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "cluster".to_string()
    } else {
        cleaned
    }
}

fn create_unique(dir: &Path, stem: &str, ext: &str) -> Result<(File, PathBuf)> {
    for n in 0..=MAX_DISAMBIGUATION {
        let name = if n == 0 {
            format!("{}.{}", stem, ext)
        } else {
            format!("{}_{}.{}", stem, n, ext)
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((file, path)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(VigilError::Report(format!(
        "no free file name for {} in {}",
        stem,
        dir.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_cluster_name("prod-x7k2q"), "prod-x7k2q");
        assert_eq!(sanitize_cluster_name("'a b/c'"), "_a_b_c_");
        assert_eq!(sanitize_cluster_name("  "), "cluster");
    }

    #[test]
    fn test_file_stem() {
        let report = ReportAssembler::with_timestamp("lab", fixed_time()).finish();
        assert_eq!(report.file_stem(), "lab_report_2024-03-09T14-05-07");
    }

    #[test]
    fn test_empty_section_renders_placeholder() {
        let mut asm = ReportAssembler::with_timestamp("lab", fixed_time());
        asm.add_section("Empty", ["Node", "Result"], vec![]);
        assert!(asm.render().contains("no results"));
    }
}
