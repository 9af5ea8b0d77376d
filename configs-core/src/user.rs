//! Per-user configuration: blocking preferences, wallpaper, and theme colors.
//!
//! Every field is independently optional. Absence always means "use the
//! caller's default"; a user who has never saved anything decodes to the
//! same value as a user whose row predates a field.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{EnvelopeError, ValidationError};
use crate::schema::{ConfigSchema, Datum, FieldSchema, RecordReader, SchemaKind};
use crate::types::{ConfigValue, UserId};

/// How blocked content is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockingBehavior {
    /// Replace the post with a placeholder.
    Hide,
    /// Remove the post from results entirely.
    Omit,
}

impl BlockingBehavior {
    pub const ALL: &'static [BlockingBehavior] = &[BlockingBehavior::Hide, BlockingBehavior::Omit];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockingBehavior::Hide => "hide",
            BlockingBehavior::Omit => "omit",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|behavior| behavior.as_str() == symbol)
    }

    fn symbols() -> Vec<String> {
        Self::ALL
            .iter()
            .map(|behavior| behavior.as_str().to_string())
            .collect()
    }
}

/// Theme color slots a user can override.
///
/// Wire names are kebab-case and must stay stable: they are both the map
/// keys in stored rows and the CSS variable names the frontend emits.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ColorSlot {
    Transition,
    Fadetime,
    Warning,
    Error,
    Valid,
    General,
    Mature,
    Explicit,
    Icolor,
    Bg0color,
    Bg1color,
    Bg2color,
    Bg3color,
    Blockquote,
    Textcolor,
    Bordercolor,
    Linecolor,
    Borderhover,
    Subtle,
    Shadowcolor,
    Activeshadowcolor,
    ScreenCover,
    BorderSize,
    BorderRadius,
    WaveColor,
    StripeColor,
    Main,
    Pink,
    Yellow,
    Green,
    Blue,
    Orange,
    Red,
    Cyan,
    Violet,
    Bright,
    Funding,
    NotificationText,
    NotificationBg,
}

impl ColorSlot {
    pub const ALL: &'static [ColorSlot] = &[
        ColorSlot::Transition,
        ColorSlot::Fadetime,
        ColorSlot::Warning,
        ColorSlot::Error,
        ColorSlot::Valid,
        ColorSlot::General,
        ColorSlot::Mature,
        ColorSlot::Explicit,
        ColorSlot::Icolor,
        ColorSlot::Bg0color,
        ColorSlot::Bg1color,
        ColorSlot::Bg2color,
        ColorSlot::Bg3color,
        ColorSlot::Blockquote,
        ColorSlot::Textcolor,
        ColorSlot::Bordercolor,
        ColorSlot::Linecolor,
        ColorSlot::Borderhover,
        ColorSlot::Subtle,
        ColorSlot::Shadowcolor,
        ColorSlot::Activeshadowcolor,
        ColorSlot::ScreenCover,
        ColorSlot::BorderSize,
        ColorSlot::BorderRadius,
        ColorSlot::WaveColor,
        ColorSlot::StripeColor,
        ColorSlot::Main,
        ColorSlot::Pink,
        ColorSlot::Yellow,
        ColorSlot::Green,
        ColorSlot::Blue,
        ColorSlot::Orange,
        ColorSlot::Red,
        ColorSlot::Cyan,
        ColorSlot::Violet,
        ColorSlot::Bright,
        ColorSlot::Funding,
        ColorSlot::NotificationText,
        ColorSlot::NotificationBg,
    ];

    /// Stable wire name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorSlot::Transition => "transition",
            ColorSlot::Fadetime => "fadetime",
            ColorSlot::Warning => "warning",
            ColorSlot::Error => "error",
            ColorSlot::Valid => "valid",
            ColorSlot::General => "general",
            ColorSlot::Mature => "mature",
            ColorSlot::Explicit => "explicit",
            ColorSlot::Icolor => "icolor",
            ColorSlot::Bg0color => "bg0color",
            ColorSlot::Bg1color => "bg1color",
            ColorSlot::Bg2color => "bg2color",
            ColorSlot::Bg3color => "bg3color",
            ColorSlot::Blockquote => "blockquote",
            ColorSlot::Textcolor => "textcolor",
            ColorSlot::Bordercolor => "bordercolor",
            ColorSlot::Linecolor => "linecolor",
            ColorSlot::Borderhover => "borderhover",
            ColorSlot::Subtle => "subtle",
            ColorSlot::Shadowcolor => "shadowcolor",
            ColorSlot::Activeshadowcolor => "activeshadowcolor",
            ColorSlot::ScreenCover => "screen-cover",
            ColorSlot::BorderSize => "border-size",
            ColorSlot::BorderRadius => "border-radius",
            ColorSlot::WaveColor => "wave-color",
            ColorSlot::StripeColor => "stripe-color",
            ColorSlot::Main => "main",
            ColorSlot::Pink => "pink",
            ColorSlot::Yellow => "yellow",
            ColorSlot::Green => "green",
            ColorSlot::Blue => "blue",
            ColorSlot::Orange => "orange",
            ColorSlot::Red => "red",
            ColorSlot::Cyan => "cyan",
            ColorSlot::Violet => "violet",
            ColorSlot::Bright => "bright",
            ColorSlot::Funding => "funding",
            ColorSlot::NotificationText => "notification-text",
            ColorSlot::NotificationBg => "notification-bg",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|slot| slot.as_str() == symbol)
    }

    fn symbols() -> Vec<String> {
        Self::ALL.iter().map(|slot| slot.as_str().to_string()).collect()
    }
}

/// A stored color override: either a literal RGBA value or a reference to
/// another slot, so "borderhover: main" keeps tracking the main color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorValue {
    Rgba(u32),
    Slot(ColorSlot),
}

/// Canonical stored shape of a user's configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UserConfig {
    pub blocking_behavior: Option<BlockingBehavior>,
    pub blocked_tags: Option<Vec<Vec<String>>>,
    pub blocked_users: Option<Vec<UserId>>,
    /// 8-byte post reference rendered as the profile wallpaper.
    pub wallpaper: Option<[u8; 8]>,
    pub colors: Option<BTreeMap<ColorSlot, ColorValue>>,
}

impl ConfigValue for UserConfig {
    fn schema() -> ConfigSchema {
        ConfigSchema::new(
            "UserConfig",
            vec![
                FieldSchema::new(
                    "blocking_behavior",
                    SchemaKind::Optional(Box::new(SchemaKind::Enum {
                        symbols: BlockingBehavior::symbols(),
                    })),
                ),
                FieldSchema::new(
                    "blocked_tags",
                    SchemaKind::Optional(Box::new(SchemaKind::Array(Box::new(
                        SchemaKind::Array(Box::new(SchemaKind::String)),
                    )))),
                ),
                FieldSchema::new(
                    "blocked_users",
                    SchemaKind::Optional(Box::new(SchemaKind::Array(Box::new(SchemaKind::Long)))),
                ),
                FieldSchema::new(
                    "wallpaper",
                    SchemaKind::Optional(Box::new(SchemaKind::Fixed { size: 8 })),
                ),
                FieldSchema::new(
                    "colors",
                    SchemaKind::Optional(Box::new(SchemaKind::Map(Box::new(SchemaKind::Union(
                        vec![
                            SchemaKind::Enum {
                                symbols: ColorSlot::symbols(),
                            },
                            SchemaKind::Long,
                        ],
                    ))))),
                ),
            ],
        )
    }

    fn to_datum(&self) -> Datum {
        Datum::Record(vec![
            (
                "blocking_behavior".to_string(),
                Datum::optional(
                    self.blocking_behavior
                        .map(|behavior| Datum::Symbol(behavior.as_str().to_string())),
                ),
            ),
            (
                "blocked_tags".to_string(),
                Datum::optional(self.blocked_tags.as_ref().map(|groups| {
                    Datum::Array(
                        groups
                            .iter()
                            .map(|group| {
                                Datum::Array(
                                    group.iter().map(|tag| Datum::Str(tag.clone())).collect(),
                                )
                            })
                            .collect(),
                    )
                })),
            ),
            (
                "blocked_users".to_string(),
                Datum::optional(self.blocked_users.as_ref().map(|users| {
                    Datum::Array(users.iter().map(|user| Datum::Long(*user)).collect())
                })),
            ),
            (
                "wallpaper".to_string(),
                Datum::optional(
                    self.wallpaper
                        .map(|wallpaper| Datum::Fixed(wallpaper.to_vec())),
                ),
            ),
            (
                "colors".to_string(),
                Datum::optional(self.colors.as_ref().map(|colors| {
                    Datum::Map(
                        colors
                            .iter()
                            .map(|(slot, value)| {
                                let value = match value {
                                    ColorValue::Slot(reference) => Datum::Branch(
                                        0,
                                        Box::new(Datum::Symbol(reference.as_str().to_string())),
                                    ),
                                    ColorValue::Rgba(rgba) => {
                                        Datum::Branch(1, Box::new(Datum::Long(i64::from(*rgba))))
                                    }
                                };
                                (slot.as_str().to_string(), value)
                            })
                            .collect(),
                    )
                })),
            ),
        ])
    }

    fn from_datum(datum: Datum) -> Result<Self, EnvelopeError> {
        let mut record = RecordReader::new(datum)?;

        let blocking_behavior = match record.take_optional("blocking_behavior")? {
            Some(value) => {
                let symbol = value.into_symbol()?;
                Some(
                    BlockingBehavior::from_symbol(&symbol)
                        .ok_or_else(|| unknown_symbol("blocking behavior", &symbol))?,
                )
            }
            None => None,
        };

        let blocked_tags = match record.take_optional("blocked_tags")? {
            Some(value) => {
                let mut groups = Vec::new();
                for group in value.into_array()? {
                    let mut tags = Vec::new();
                    for tag in group.into_array()? {
                        tags.push(tag.into_str()?);
                    }
                    groups.push(tags);
                }
                Some(groups)
            }
            None => None,
        };

        let blocked_users = match record.take_optional("blocked_users")? {
            Some(value) => {
                let mut users = Vec::new();
                for user in value.into_array()? {
                    users.push(user.into_long()?);
                }
                Some(users)
            }
            None => None,
        };

        let wallpaper = match record.take_optional("wallpaper")? {
            Some(value) => {
                let bytes = value.into_fixed()?;
                let bytes: [u8; 8] =
                    bytes
                        .try_into()
                        .map_err(|bytes: Vec<u8>| EnvelopeError::SchemaMismatch {
                            reason: format!("wallpaper reference has {} bytes, want 8", bytes.len()),
                        })?;
                Some(bytes)
            }
            None => None,
        };

        let colors = match record.take_optional("colors")? {
            Some(value) => {
                let mut colors = BTreeMap::new();
                for (key, entry) in value.into_map()? {
                    let slot = ColorSlot::from_symbol(&key)
                        .ok_or_else(|| unknown_symbol("color slot", &key))?;
                    let (branch, inner) = entry.into_branch()?;
                    let value = match branch {
                        0 => {
                            let symbol = inner.into_symbol()?;
                            ColorValue::Slot(
                                ColorSlot::from_symbol(&symbol)
                                    .ok_or_else(|| unknown_symbol("color slot", &symbol))?,
                            )
                        }
                        1 => {
                            let rgba = inner.into_long()?;
                            let rgba =
                                u32::try_from(rgba).map_err(|_| EnvelopeError::SchemaMismatch {
                                    reason: format!("color value {rgba} out of rgba range"),
                                })?;
                            ColorValue::Rgba(rgba)
                        }
                        other => {
                            return Err(EnvelopeError::SchemaMismatch {
                                reason: format!("unexpected color union branch {other}"),
                            })
                        }
                    };
                    colors.insert(slot, value);
                }
                Some(colors)
            }
            None => None,
        };

        Ok(Self {
            blocking_behavior,
            blocked_tags,
            blocked_users,
            wallpaper,
            colors,
        })
    }
}

fn unknown_symbol(what: &str, symbol: &str) -> EnvelopeError {
    EnvelopeError::SchemaMismatch {
        reason: format!("unknown {what} symbol: {symbol}"),
    }
}

/// Request shape for saving a user's configuration.
///
/// This mirrors what the HTTP layer accepts: tag groups arrive as sets,
/// blocked users as handles, the wallpaper as a post reference string.
/// [`UserConfigUpdate::into_stored`] normalizes it into the canonical
/// [`UserConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UserConfigUpdate {
    pub blocking_behavior: Option<BlockingBehavior>,
    pub blocked_tags: Option<Vec<BTreeSet<String>>>,
    pub blocked_users: Option<Vec<String>>,
    pub wallpaper: Option<String>,
    pub colors: Option<BTreeMap<ColorSlot, ColorValue>>,
}

impl UserConfigUpdate {
    /// Normalize into the canonical stored shape.
    ///
    /// Tag sets become sorted vectors so identical block lists always encode
    /// to identical bytes.
    pub fn into_stored(self) -> Result<UserConfig, ValidationError> {
        let wallpaper = match self.wallpaper {
            Some(reference) => Some(parse_post_ref(&reference)?),
            None => None,
        };

        Ok(UserConfig {
            blocking_behavior: self.blocking_behavior,
            blocked_tags: self
                .blocked_tags
                .map(|groups| groups.into_iter().map(|group| group.into_iter().collect()).collect()),
            // TODO: resolve handles to user ids once internal service tokens exist
            blocked_users: None,
            wallpaper,
            colors: self.colors,
        })
    }
}

fn parse_post_ref(reference: &str) -> Result<[u8; 8], ValidationError> {
    let valid = reference.len() == 8
        && reference
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-');
    if !valid {
        return Err(ValidationError::InvalidValue {
            field: "wallpaper".to_string(),
            reason: "must be an 8-character post reference".to_string(),
        });
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(reference.as_bytes());
    Ok(bytes)
}
