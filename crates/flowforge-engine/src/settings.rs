use std::ops::RangeInclusive;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Engine-wide behaviour switches and limits.
///
/// Every constructor validates ranges, so a `WorkflowSettings` value is
/// always usable as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowSettings {
    auto_compensate: bool,
    continue_on_compensation_failure: bool,
    compensation_retries: u32,
    max_concurrent_workflows: u32,
}

impl WorkflowSettings {
    pub const COMPENSATION_RETRIES: RangeInclusive<u32> = 1..=100;
    pub const MAX_CONCURRENT_WORKFLOWS: RangeInclusive<u32> = 1..=1000;

    pub const DEFAULT_COMPENSATION_RETRIES: u32 = 3;
    pub const DEFAULT_MAX_CONCURRENT_WORKFLOWS: u32 = 10;

    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] if `compensation_retries` is outside
    /// `1..=100` or `max_concurrent_workflows` is outside `1..=1000`.
    pub fn new(
        auto_compensate: bool,
        continue_on_compensation_failure: bool,
        compensation_retries: u32,
        max_concurrent_workflows: u32,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            auto_compensate,
            continue_on_compensation_failure,
            compensation_retries: check_range(
                "compensation-retries",
                i64::from(compensation_retries),
                &Self::COMPENSATION_RETRIES,
            )?,
            max_concurrent_workflows: check_range(
                "max-concurrent-workflows",
                i64::from(max_concurrent_workflows),
                &Self::MAX_CONCURRENT_WORKFLOWS,
            )?,
        })
    }

    #[must_use]
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// Whether failed runs roll back completed steps automatically.
    #[must_use]
    pub fn auto_compensate(&self) -> bool {
        self.auto_compensate
    }

    /// Whether rollback keeps going after a compensation fails.
    #[must_use]
    pub fn continue_on_compensation_failure(&self) -> bool {
        self.continue_on_compensation_failure
    }

    /// Maximum compensation attempts per step.
    #[must_use]
    pub fn compensation_retries(&self) -> u32 {
        self.compensation_retries
    }

    #[must_use]
    pub fn max_concurrent_workflows(&self) -> u32 {
        self.max_concurrent_workflows
    }

    /// Parse settings from TOML. Missing keys keep their defaults.
    ///
    /// ```
    /// use flowforge_engine::WorkflowSettings;
    ///
    /// let settings = WorkflowSettings::from_toml_str("compensation-retries = 5\n")?;
    /// assert_eq!(settings.compensation_retries(), 5);
    /// assert!(settings.auto_compensate());
    /// # Ok::<(), flowforge_engine::ConfigError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] for malformed input or unknown keys, and
    /// [`ConfigError::OutOfRange`] for values outside their bounds.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawSettings = toml::from_str(content)?;
        raw.into_settings()
    }

    /// Load settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read,
    /// [`ConfigError::Parse`] if it is not valid settings TOML, and
    /// [`ConfigError::OutOfRange`] for values outside their bounds.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawSettings = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        raw.into_settings()
    }
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            auto_compensate: true,
            continue_on_compensation_failure: true,
            compensation_retries: Self::DEFAULT_COMPENSATION_RETRIES,
            max_concurrent_workflows: Self::DEFAULT_MAX_CONCURRENT_WORKFLOWS,
        }
    }
}

/// Builder for [`WorkflowSettings`]; unset fields keep their defaults.
#[derive(Debug, Clone, Copy)]
pub struct SettingsBuilder {
    auto_compensate: bool,
    continue_on_compensation_failure: bool,
    compensation_retries: u32,
    max_concurrent_workflows: u32,
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        let defaults = WorkflowSettings::default();
        Self {
            auto_compensate: defaults.auto_compensate,
            continue_on_compensation_failure: defaults.continue_on_compensation_failure,
            compensation_retries: defaults.compensation_retries,
            max_concurrent_workflows: defaults.max_concurrent_workflows,
        }
    }
}

impl SettingsBuilder {
    #[must_use]
    pub fn auto_compensate(mut self, enabled: bool) -> Self {
        self.auto_compensate = enabled;
        self
    }

    #[must_use]
    pub fn continue_on_compensation_failure(mut self, enabled: bool) -> Self {
        self.continue_on_compensation_failure = enabled;
        self
    }

    #[must_use]
    pub fn compensation_retries(mut self, retries: u32) -> Self {
        self.compensation_retries = retries;
        self
    }

    #[must_use]
    pub fn max_concurrent_workflows(mut self, max: u32) -> Self {
        self.max_concurrent_workflows = max;
        self
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] for values outside their bounds.
    pub fn build(self) -> Result<WorkflowSettings, ConfigError> {
        WorkflowSettings::new(
            self.auto_compensate,
            self.continue_on_compensation_failure,
            self.compensation_retries,
            self.max_concurrent_workflows,
        )
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawSettings {
    auto_compensate: Option<bool>,
    continue_on_compensation_failure: Option<bool>,
    // Signed so that negative values report a range error rather than a type error.
    compensation_retries: Option<i64>,
    max_concurrent_workflows: Option<i64>,
}

impl RawSettings {
    fn into_settings(self) -> Result<WorkflowSettings, ConfigError> {
        let defaults = WorkflowSettings::default();
        Ok(WorkflowSettings {
            auto_compensate: self.auto_compensate.unwrap_or(defaults.auto_compensate),
            continue_on_compensation_failure: self
                .continue_on_compensation_failure
                .unwrap_or(defaults.continue_on_compensation_failure),
            compensation_retries: check_range(
                "compensation-retries",
                self.compensation_retries
                    .unwrap_or(i64::from(defaults.compensation_retries)),
                &WorkflowSettings::COMPENSATION_RETRIES,
            )?,
            max_concurrent_workflows: check_range(
                "max-concurrent-workflows",
                self.max_concurrent_workflows
                    .unwrap_or(i64::from(defaults.max_concurrent_workflows)),
                &WorkflowSettings::MAX_CONCURRENT_WORKFLOWS,
            )?,
        })
    }
}

fn check_range(
    field: &'static str,
    value: i64,
    range: &RangeInclusive<u32>,
) -> Result<u32, ConfigError> {
    u32::try_from(value)
        .ok()
        .filter(|v| range.contains(v))
        .ok_or(ConfigError::OutOfRange {
            field,
            value,
            min: i64::from(*range.start()),
            max: i64::from(*range.end()),
        })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = WorkflowSettings::default();

        assert!(settings.auto_compensate());
        assert!(settings.continue_on_compensation_failure());
        assert_eq!(settings.compensation_retries(), 3);
        assert_eq!(settings.max_concurrent_workflows(), 10);
    }

    #[test]
    fn bounds_are_inclusive() -> anyhow::Result<()> {
        WorkflowSettings::new(true, true, 1, 1)?;
        WorkflowSettings::new(true, true, 100, 1000)?;
        Ok(())
    }

    #[test]
    fn rejects_out_of_range_retries() {
        for retries in [0, 101] {
            let err = WorkflowSettings::new(true, true, retries, 10).expect_err("out of range");
            assert!(matches!(
                err,
                ConfigError::OutOfRange {
                    field: "compensation-retries",
                    ..
                }
            ));
        }
    }

    #[test]
    fn rejects_out_of_range_concurrency() {
        for max in [0, 1001] {
            let err = WorkflowSettings::new(true, true, 3, max).expect_err("out of range");
            assert!(matches!(
                err,
                ConfigError::OutOfRange {
                    field: "max-concurrent-workflows",
                    ..
                }
            ));
        }
    }

    #[test]
    fn builder_overrides_selected_fields() -> anyhow::Result<()> {
        let settings = WorkflowSettings::builder()
            .auto_compensate(false)
            .max_concurrent_workflows(2)
            .build()?;

        assert!(!settings.auto_compensate());
        assert!(settings.continue_on_compensation_failure());
        assert_eq!(settings.max_concurrent_workflows(), 2);
        Ok(())
    }

    #[test]
    fn toml_with_all_keys() -> anyhow::Result<()> {
        let settings = WorkflowSettings::from_toml_str(
            r"
auto-compensate = false
continue-on-compensation-failure = false
compensation-retries = 7
max-concurrent-workflows = 50
",
        )?;

        assert_eq!(settings, WorkflowSettings::new(false, false, 7, 50)?);
        Ok(())
    }

    #[test]
    fn empty_toml_gives_defaults() -> anyhow::Result<()> {
        assert_eq!(
            WorkflowSettings::from_toml_str("")?,
            WorkflowSettings::default()
        );
        Ok(())
    }

    #[test]
    fn toml_negative_value_is_range_error() {
        let err = WorkflowSettings::from_toml_str("compensation-retries = -1\n")
            .expect_err("negative retries");

        assert!(matches!(err, ConfigError::OutOfRange { value: -1, .. }));
    }

    #[test]
    fn toml_unknown_key_is_rejected() {
        let err = WorkflowSettings::from_toml_str("retries = 3\n").expect_err("unknown key");

        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn from_path_reads_file() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("flowforge.toml");
        fs::write(&path, "max-concurrent-workflows = 4\n")?;

        let settings = WorkflowSettings::from_path(&path)?;

        assert_eq!(settings.max_concurrent_workflows(), 4);
        Ok(())
    }

    #[test]
    fn from_path_reports_missing_file() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("absent.toml");

        let err = WorkflowSettings::from_path(&path).expect_err("missing file");

        assert!(matches!(err, ConfigError::Read { path: p, .. } if p == path));
    }

    #[test]
    fn from_path_reports_parse_error_with_path() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("broken.toml");
        fs::write(&path, "auto-compensate = maybe\n")?;

        let err = WorkflowSettings::from_path(&path).expect_err("bad value");

        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("broken.toml"));
        Ok(())
    }
}
