use std::collections::{
  BTreeMap,
  BTreeSet
};
use std::fmt;

use serde::{
  Deserialize,
  Serialize
};
use tracing::debug;

use crate::error::ConfigError;
use crate::layout::group_fields_by_row;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
  Text,
  Select,
  Date,
  Number
}

impl FieldKind {
  #[must_use]
  pub fn as_key(self) -> &'static str {
    match self {
      | Self::Text => "text",
      | Self::Select => "select",
      | Self::Date => "date",
      | Self::Number => "number"
    }
  }
}

impl fmt::Display for FieldKind {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_key())
  }
}

/// How many of the two row columns a
/// field occupies. Serialized as the
/// bare numbers `1` and `2`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
)]
#[serde(
  try_from = "u8",
  into = "u8"
)]
pub enum WidthHint {
  #[default]
  Half,
  Full
}

impl TryFrom<u8> for WidthHint {
  type Error = String;

  fn try_from(
    raw: u8
  ) -> Result<Self, Self::Error> {
    match raw {
      | 1 => Ok(Self::Half),
      | 2 => Ok(Self::Full),
      | other => {
        Err(format!(
          "width must be 1 or 2, got \
           {other}"
        ))
      }
    }
  }
}

impl From<WidthHint> for u8 {
  fn from(hint: WidthHint) -> Self {
    match hint {
      | WidthHint::Half => 1,
      | WidthHint::Full => 2
    }
  }
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
pub struct SelectOption {
  pub value: String,
  pub label: String
}

impl SelectOption {
  pub fn new(
    value: impl Into<String>,
    label: impl Into<String>
  ) -> Self {
    Self {
      value: value.into(),
      label: label.into()
    }
  }
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
pub struct FilterFieldSchema {
  pub key:         String,
  pub label:       String,
  #[serde(rename = "type")]
  pub kind:        FieldKind,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub placeholder: Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Vec::is_empty"
  )]
  pub options:     Vec<SelectOption>,
  #[serde(default)]
  pub width:       WidthHint
}

impl FilterFieldSchema {
  fn with_kind(
    key: impl Into<String>,
    label: impl Into<String>,
    kind: FieldKind
  ) -> Self {
    Self {
      key: key.into(),
      label: label.into(),
      kind,
      placeholder: None,
      options: Vec::new(),
      width: WidthHint::Half
    }
  }

  pub fn text(
    key: impl Into<String>,
    label: impl Into<String>
  ) -> Self {
    Self::with_kind(
      key,
      label,
      FieldKind::Text
    )
  }

  pub fn number(
    key: impl Into<String>,
    label: impl Into<String>
  ) -> Self {
    Self::with_kind(
      key,
      label,
      FieldKind::Number
    )
  }

  pub fn date(
    key: impl Into<String>,
    label: impl Into<String>
  ) -> Self {
    Self::with_kind(
      key,
      label,
      FieldKind::Date
    )
  }

  pub fn select(
    key: impl Into<String>,
    label: impl Into<String>,
    options: Vec<SelectOption>
  ) -> Self {
    Self {
      options,
      ..Self::with_kind(
        key,
        label,
        FieldKind::Select
      )
    }
  }

  #[must_use]
  pub fn full_width(mut self) -> Self {
    self.width = WidthHint::Full;
    self
  }

  #[must_use]
  pub fn with_placeholder(
    mut self,
    placeholder: impl Into<String>
  ) -> Self {
    self.placeholder =
      Some(placeholder.into());
    self
  }

  /// Label of the option whose value
  /// equals `value`, if any.
  pub fn option_label(
    &self,
    value: &str
  ) -> Option<&str> {
    self
      .options
      .iter()
      .find(|option| option.value == value)
      .map(|option| option.label.as_str())
  }
}

/// A validated filter schema. The only
/// ways to obtain one are
/// [`FilterConfig::new`] and
/// [`FilterConfig::from_toml_str`],
/// both of which reject duplicate keys.
#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
pub struct FilterConfig {
  title:    String,
  fields:   Vec<FilterFieldSchema>,
  #[serde(
    skip_serializing_if = "BTreeMap::is_empty"
  )]
  defaults: BTreeMap<String, String>
}

#[derive(Debug, Deserialize)]
struct RawFilterConfig {
  title:    String,
  #[serde(default)]
  fields:   Vec<FilterFieldSchema>,
  #[serde(default)]
  defaults: BTreeMap<String, String>
}

impl FilterConfig {
  pub fn new(
    title: impl Into<String>,
    fields: Vec<FilterFieldSchema>
  ) -> Result<Self, ConfigError> {
    let config = Self {
      title: title.into(),
      fields,
      defaults: BTreeMap::new()
    };
    config.validate()?;
    Ok(config)
  }

  /// Replaces the per-field defaults.
  /// Every default must name a declared
  /// field.
  pub fn with_defaults<I, K, V>(
    mut self,
    defaults: I
  ) -> Result<Self, ConfigError>
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>
  {
    self.defaults = defaults
      .into_iter()
      .map(|(k, v)| (k.into(), v.into()))
      .collect();
    self.validate()?;
    Ok(self)
  }

  #[tracing::instrument(skip(raw))]
  pub fn from_toml_str(
    raw: &str
  ) -> Result<Self, ConfigError> {
    let parsed =
      toml::from_str::<RawFilterConfig>(
        raw
      )?;
    let config = Self {
      title:    parsed.title,
      fields:   parsed.fields,
      defaults: parsed.defaults
    };
    config.validate()?;
    debug!(
      title = %config.title,
      fields = config.fields.len(),
      defaults = config.defaults.len(),
      "parsed filter config"
    );
    Ok(config)
  }

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn fields(
    &self
  ) -> &[FilterFieldSchema] {
    &self.fields
  }

  pub fn defaults(
    &self
  ) -> &BTreeMap<String, String> {
    &self.defaults
  }

  pub fn field(
    &self,
    key: &str
  ) -> Option<&FilterFieldSchema> {
    self
      .fields
      .iter()
      .find(|field| field.key == key)
  }

  pub fn keys(
    &self
  ) -> impl Iterator<Item = &str> {
    self
      .fields
      .iter()
      .map(|field| field.key.as_str())
  }

  pub fn rows(
    &self
  ) -> Vec<Vec<&FilterFieldSchema>> {
    group_fields_by_row(&self.fields)
  }

  fn validate(
    &self
  ) -> Result<(), ConfigError> {
    let mut seen = BTreeSet::new();
    for (index, field) in
      self.fields.iter().enumerate()
    {
      if field.key.trim().is_empty() {
        return Err(
          ConfigError::EmptyKey {
            title: self.title.clone(),
            index
          }
        );
      }
      if !seen.insert(field.key.as_str())
      {
        return Err(
          ConfigError::DuplicateKey {
            title: self.title.clone(),
            key:   field.key.clone()
          }
        );
      }
      validate_options(field)?;
    }

    if let Some(key) = self
      .defaults
      .keys()
      .find(|key| {
        !seen.contains(key.as_str())
      })
    {
      return Err(
        ConfigError::UnknownDefault {
          title: self.title.clone(),
          key:   key.clone()
        }
      );
    }

    Ok(())
  }
}

fn validate_options(
  field: &FilterFieldSchema
) -> Result<(), ConfigError> {
  match field.kind {
    | FieldKind::Select => {
      if field.options.is_empty() {
        return Err(
          ConfigError::MissingOptions {
            key: field.key.clone()
          }
        );
      }
      let mut values = BTreeSet::new();
      for option in &field.options {
        if !values
          .insert(option.value.as_str())
        {
          return Err(
            ConfigError::DuplicateOption {
              key:   field.key.clone(),
              value: option.value.clone()
            }
          );
        }
      }
      Ok(())
    }
    | _ if !field.options.is_empty() => {
      Err(
        ConfigError::UnexpectedOptions {
          key: field.key.clone()
        }
      )
    }
    | _ => Ok(())
  }
}
