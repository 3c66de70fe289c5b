use std::fmt;
use std::path::Path;

use anyhow::Context;
use tracing::{
  debug,
  info
};

use crate::error::ConfigError;
use crate::schema::FilterConfig;

const SONGS_TOML: &str =
  include_str!("../presets/songs.toml");
const ALBUMS_TOML: &str =
  include_str!("../presets/albums.toml");
const ARTISTS_TOML: &str =
  include_str!("../presets/artists.toml");
const USERS_TOML: &str =
  include_str!("../presets/users.toml");
const GENRES_TOML: &str =
  include_str!("../presets/genres.toml");

/// Browse screens that ship with a
/// filter config.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
)]
pub enum Screen {
  Songs,
  Albums,
  Artists,
  Users,
  Genres
}

impl Screen {
  pub const ALL: [Screen; 5] = [
    Screen::Songs,
    Screen::Albums,
    Screen::Artists,
    Screen::Users,
    Screen::Genres
  ];

  #[must_use]
  pub fn as_key(self) -> &'static str {
    match self {
      | Screen::Songs => "songs",
      | Screen::Albums => "albums",
      | Screen::Artists => "artists",
      | Screen::Users => "users",
      | Screen::Genres => "genres"
    }
  }

  pub fn from_key(
    raw: &str
  ) -> Option<Self> {
    let key =
      raw.trim().to_ascii_lowercase();
    Self::ALL
      .into_iter()
      .find(|screen| screen.as_key() == key)
  }

  fn toml(self) -> &'static str {
    match self {
      | Screen::Songs => SONGS_TOML,
      | Screen::Albums => ALBUMS_TOML,
      | Screen::Artists => ARTISTS_TOML,
      | Screen::Users => USERS_TOML,
      | Screen::Genres => GENRES_TOML
    }
  }

  pub fn config(
    self
  ) -> Result<FilterConfig, ConfigError> {
    let config =
      FilterConfig::from_toml_str(
        self.toml()
      )?;
    debug!(
      screen = self.as_key(),
      fields = config.fields().len(),
      "loaded built-in filter config"
    );
    Ok(config)
  }
}

impl fmt::Display for Screen {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_key())
  }
}

/// Resolves a screen name or a path to
/// a TOML filter config.
#[tracing::instrument]
pub fn load_filter_config(
  source: &str
) -> anyhow::Result<FilterConfig> {
  if let Some(screen) =
    Screen::from_key(source)
  {
    return screen.config().with_context(
      || {
        format!(
          "built-in filter config \
           `{screen}` is invalid"
        )
      }
    );
  }

  let path = Path::new(source);
  info!(file = %path.display(), "loading filter config");
  let raw = std::fs::read_to_string(path)
    .with_context(|| {
      format!(
        "`{source}` is neither a \
         built-in screen nor a \
         readable file"
      )
    })?;
  FilterConfig::from_toml_str(&raw)
    .with_context(|| {
      format!(
        "failed to load filter config \
         from {}",
        path.display()
      )
    })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::schema::FieldKind;

  #[test]
  fn every_preset_is_valid() {
    for screen in Screen::ALL {
      let config = screen
        .config()
        .expect("preset parses");
      assert!(
        !config.fields().is_empty(),
        "{screen} has fields"
      );
      assert!(
        config.fields().iter().any(
          |field| {
            field.kind == FieldKind::Date
          }
        ),
        "{screen} has a date field"
      );
    }
  }

  #[test]
  fn screen_keys_round_trip() {
    for screen in Screen::ALL {
      assert_eq!(
        Screen::from_key(screen.as_key()),
        Some(screen)
      );
    }
    assert_eq!(
      Screen::from_key(" Songs "),
      Some(Screen::Songs)
    );
    assert_eq!(
      Screen::from_key("playlists"),
      None
    );
  }

  #[test]
  fn missing_file_is_reported() {
    let err = load_filter_config(
      "/definitely/not/here.toml"
    )
    .expect_err("missing file");
    assert!(
      format!("{err:#}")
        .contains("neither a built-in")
    );
  }
}
