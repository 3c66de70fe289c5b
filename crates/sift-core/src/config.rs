use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::Context;
use chrono::Weekday;
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{
  debug,
  info,
  warn
};

use crate::datetime::{
  SystemClock,
  parse_timezone,
  parse_week_start
};
use crate::position::FlyoutMetrics;

pub const SETTINGS_ENV_VAR: &str =
  "SIFT_SETTINGS";
pub const TIMEZONE_ENV_VAR: &str =
  "SIFT_TIMEZONE";
const SETTINGS_DIR: &str = "sift";
const SETTINGS_FILE: &str = "sift.toml";

/// Engine-wide options for date
/// fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatePickerSettings {
  pub week_start: Weekday,
  pub metrics:    FlyoutMetrics
}

impl Default for DatePickerSettings {
  fn default() -> Self {
    Self {
      week_start: Weekday::Sun,
      metrics:    FlyoutMetrics::default()
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct Settings {
  pub timezone:     Option<Tz>,
  pub date_picker:  DatePickerSettings,
  pub loaded_files: Vec<PathBuf>
}

#[derive(Debug, Default, Deserialize)]
struct RawSettings {
  timezone:    Option<String>,
  #[serde(default)]
  date_picker: RawDatePicker
}

#[derive(Debug, Default, Deserialize)]
struct RawDatePicker {
  timezone:         Option<String>,
  week_start:       Option<String>,
  flyout_width:     Option<f64>,
  viewport_padding: Option<f64>
}

impl Settings {
  /// Resolves and loads the settings
  /// file, then applies the timezone
  /// environment override. A missing
  /// file means defaults.
  #[tracing::instrument(skip(
    settings_override
  ))]
  pub fn load(
    settings_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut settings = Settings::default();

    match resolve_settings_path(
      settings_override
    ) {
      | Some(path) => {
        info!(file = %path.display(), "loading settings");
        let raw = fs::read_to_string(
          &path
        )
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;
        settings.merge_toml(&raw).with_context(
          || {
            format!(
              "failed to parse {}",
              path.display()
            )
          }
        )?;
        settings.loaded_files.push(path);
      }
      | None => {
        debug!(
          "no settings file found; \
           using defaults"
        );
      }
    }

    if let Ok(raw) =
      std::env::var(TIMEZONE_ENV_VAR)
      && let Some(tz) =
        parse_timezone(&raw, TIMEZONE_ENV_VAR)
    {
      settings.timezone = Some(tz);
    }

    Ok(settings)
  }

  pub fn from_toml_str(
    raw: &str
  ) -> anyhow::Result<Self> {
    let mut settings = Settings::default();
    settings.merge_toml(raw)?;
    Ok(settings)
  }

  #[must_use]
  pub fn clock(&self) -> SystemClock {
    SystemClock::new(self.timezone)
  }

  fn merge_toml(
    &mut self,
    raw: &str
  ) -> anyhow::Result<()> {
    let parsed =
      toml::from_str::<RawSettings>(raw)
        .context(
          "invalid settings document"
        )?;

    let picker = parsed.date_picker;
    // The section key wins over the
    // top-level one.
    if let Some(timezone) = picker
      .timezone
      .as_deref()
      .or(parsed.timezone.as_deref())
    {
      self.timezone = parse_timezone(
        timezone, "settings"
      );
    }

    if let Some(raw_start) =
      picker.week_start
    {
      match parse_week_start(&raw_start) {
        | Some(day) => {
          self.date_picker.week_start = day;
        }
        | None => {
          warn!(
            week_start = %raw_start,
            "unsupported week start; \
             keeping default"
          );
        }
      }
    }
    if let Some(width) = picker.flyout_width
    {
      self.date_picker.metrics.width = width;
    }
    if let Some(padding) =
      picker.viewport_padding
    {
      self.date_picker.metrics.padding =
        padding;
    }

    sanitize_metrics(
      &mut self.date_picker.metrics
    );
    Ok(())
  }
}

fn sanitize_metrics(
  metrics: &mut FlyoutMetrics
) {
  let defaults = FlyoutMetrics::default();
  if !metrics.width.is_finite()
    || metrics.width <= 0.0
  {
    warn!(
      width = metrics.width,
      "invalid flyout width; using \
       default"
    );
    metrics.width = defaults.width;
  }
  if !metrics.padding.is_finite()
    || metrics.padding < 0.0
  {
    warn!(
      padding = metrics.padding,
      "invalid viewport padding; using \
       default"
    );
    metrics.padding = defaults.padding;
  }
}

fn resolve_settings_path(
  override_path: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = override_path {
    return Some(expand_tilde(path));
  }

  if let Ok(raw) =
    std::env::var(SETTINGS_ENV_VAR)
  {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(expand_tilde(
        Path::new(trimmed)
      ));
    }
  }

  let candidate = dirs::config_dir()?
    .join(SETTINGS_DIR)
    .join(SETTINGS_FILE);
  candidate.exists().then_some(candidate)
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}
