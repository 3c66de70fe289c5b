use thiserror::Error;

/// Rejected filter configurations. Raised while building a
/// [`FilterConfig`](crate::schema::FilterConfig), so a panel can
/// never open over an invalid schema.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error(
    "duplicate field key `{key}` in \
     filter config `{title}`"
  )]
  DuplicateKey {
    title: String,
    key:   String
  },

  #[error(
    "field #{index} in filter config \
     `{title}` has an empty key"
  )]
  EmptyKey {
    title: String,
    index: usize
  },

  #[error(
    "default for `{key}` does not name \
     a field in filter config `{title}`"
  )]
  UnknownDefault {
    title: String,
    key:   String
  },

  #[error(
    "select field `{key}` declares no \
     options"
  )]
  MissingOptions { key: String },

  #[error(
    "field `{key}` is not a select but \
     declares options"
  )]
  UnexpectedOptions { key: String },

  #[error(
    "select field `{key}` repeats \
     option value `{value}`"
  )]
  DuplicateOption {
    key:   String,
    value: String
  },

  #[error("invalid filter config: {0}")]
  Toml(#[from] toml::de::Error)
}

#[derive(
  Debug, Clone, PartialEq, Eq, Error,
)]
pub enum PanelError {
  #[error("filter panel is not open")]
  NotOpen,

  #[error(
    "unknown filter field `{key}`"
  )]
  UnknownField { key: String },

  #[error(
    "filter field `{key}` is not a \
     date field"
  )]
  NotADateField { key: String }
}
