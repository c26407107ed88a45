use crate::Result;
use sonarup_types::Credential;
use std::fmt::Write as _;
use std::path::Path;

/// Per-project analysis properties read by the build tool's scanner.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub project_key: String,
    pub project_name: String,
    pub project_version: String,
    pub host_url: String,
    pub token: Credential,
    pub sources: String,
    pub tests: String,
    pub binaries: String,
    pub coverage_report: String,
    pub scm_provider: String,
    pub language: String,
    pub quality_gate: String,
    pub quality_profile: String,
}

impl AnalysisConfig {
    /// Maven layout with a JaCoCo XML report.
    pub fn maven(
        project_key: &str,
        project_name: &str,
        host_url: &str,
        token: &Credential,
        language: &str,
        quality_gate: &str,
        quality_profile: &str,
    ) -> Self {
        Self {
            project_key: project_key.to_string(),
            project_name: project_name.to_string(),
            project_version: "1.0".to_string(),
            host_url: host_url.to_string(),
            token: token.clone(),
            sources: "src/main/java".to_string(),
            tests: "src/test/java".to_string(),
            binaries: "target/classes".to_string(),
            coverage_report: "target/site/jacoco/jacoco.xml".to_string(),
            scm_provider: "git".to_string(),
            language: language.to_string(),
            quality_gate: quality_gate.to_string(),
            quality_profile: quality_profile.to_string(),
        }
    }

    fn entries(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("sonar.projectKey", self.project_key.as_str()),
            ("sonar.projectName", self.project_name.as_str()),
            ("sonar.projectVersion", self.project_version.as_str()),
            ("sonar.host.url", self.host_url.as_str()),
            ("sonar.token", self.token.expose()),
            ("sonar.sources", self.sources.as_str()),
            ("sonar.tests", self.tests.as_str()),
            ("sonar.java.binaries", self.binaries.as_str()),
            ("sonar.coverage.jacoco.xmlReportPaths", self.coverage_report.as_str()),
            ("sonar.scm.provider", self.scm_provider.as_str()),
            ("sonar.language", self.language.as_str()),
            ("sonar.qualitygate", self.quality_gate.as_str()),
            ("sonar.qualityprofile", self.quality_profile.as_str()),
            ("sonar.sourceEncoding", "UTF-8"),
        ]
    }

    pub fn render(&self) -> String {
        let mut out = String::from("# Generated by sonarup; removed after the run\n");
        for (key, value) in self.entries() {
            let _ = writeln!(out, "{}={}", key, escape_value(value));
        }
        out
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render())?;
        Ok(())
    }
}

/// Escape a value for a Java properties file.
fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            ' ' if i == 0 => escaped.push_str("\\ "),
            _ => escaped.push(c),
        }
    }
    escaped
}
