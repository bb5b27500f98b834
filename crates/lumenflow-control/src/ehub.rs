//! eHuB wire decoder
//!
//! The eHuB feed is JSON over UDP: each datagram is one message carrying a
//! `type` (`update` or `config`), an optional `universe` scope and an
//! `entities` list. `update` entities carry a color; `config` entities
//! carry metadata that is forwarded to observers only.
//!
//! The decoder is stateless and thread-safe; any number of sockets may
//! feed it. Malformed input never panics, it comes back as a pre-tagged
//! [`DecodeError`] for the counters and the event feed. Unknown JSON keys
//! are ignored, unknown `type` values are reported as their own kind.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use lumenflow_core::ColorSample;

/// Largest datagram the decoder accepts.
pub const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

/// Why a datagram was rejected. Carried by events; `Copy`, no payload
/// formatting on the hot path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeErrorKind {
    /// Datagram exceeded [`MAX_DATAGRAM_SIZE`].
    Oversized,
    /// Not valid JSON.
    Syntax,
    /// Valid JSON with the wrong shape (e.g. an update entity without a
    /// color).
    Schema,
    /// A `type` value the router does not know.
    UnknownType,
}

/// A rejected datagram.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Datagram exceeded the size cap; rejected before entity parsing.
    #[error("datagram of {len} bytes exceeds the 64 KiB limit")]
    Oversized {
        /// Received datagram length.
        len: usize,
    },
    /// The payload is not valid JSON.
    #[error("datagram is not valid JSON")]
    Syntax,
    /// The payload is JSON but does not match the message schema.
    #[error("message does not match the update/config schema")]
    Schema,
    /// The `type` field holds an unrecognized value.
    #[error("unknown message type")]
    UnknownType,
}

impl DecodeError {
    /// The pre-tagged kind for counters and events.
    pub fn kind(&self) -> DecodeErrorKind {
        match self {
            DecodeError::Oversized { .. } => DecodeErrorKind::Oversized,
            DecodeError::Syntax => DecodeErrorKind::Syntax,
            DecodeError::Schema => DecodeErrorKind::Schema,
            DecodeError::UnknownType => DecodeErrorKind::UnknownType,
        }
    }
}

/// Message kinds of the eHuB feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Per-entity color updates.
    Update,
    /// Per-entity metadata.
    Config,
    /// Anything else; counted and dropped.
    #[serde(other)]
    Unknown,
}

/// One entity's new color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityUpdate {
    /// Entity id.
    pub id: u32,
    /// New color state.
    pub color: ColorSample,
}

/// Entity metadata from a `config` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityConfig {
    /// Entity id.
    pub id: u32,
    /// Display label, if the host sent one.
    pub label: Option<String>,
    /// Grouping tag, if the host sent one.
    pub group: Option<String>,
}

/// A decoded `update` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateMessage {
    /// Universe scope of the message; used for filtering only, the
    /// mapping table stays authoritative for routing.
    pub universe: Option<u16>,
    /// Color updates in sender order.
    pub entities: Vec<EntityUpdate>,
}

/// A decoded `config` message; forwarded to observers, never routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigMessage {
    /// Universe scope of the message.
    pub universe: Option<u16>,
    /// Entity metadata in sender order.
    pub entities: Vec<EntityConfig>,
}

/// A successfully decoded eHuB datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedMessage {
    /// Color updates for the router.
    Update(UpdateMessage),
    /// Metadata for observers.
    Config(ConfigMessage),
}

impl DecodedMessage {
    /// The message kind.
    pub fn kind(&self) -> MessageKind {
        match self {
            DecodedMessage::Update(_) => MessageKind::Update,
            DecodedMessage::Config(_) => MessageKind::Config,
        }
    }

    /// The message's universe scope, if any.
    pub fn universe(&self) -> Option<u16> {
        match self {
            DecodedMessage::Update(msg) => msg.universe,
            DecodedMessage::Config(msg) => msg.universe,
        }
    }

    /// Number of entities in the message.
    pub fn entity_count(&self) -> usize {
        match self {
            DecodedMessage::Update(msg) => msg.entities.len(),
            DecodedMessage::Config(msg) => msg.entities.len(),
        }
    }
}

#[derive(Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    kind: MessageKind,
    #[serde(default)]
    universe: Option<u16>,
    #[serde(default)]
    entities: Vec<RawEntity>,
}

#[derive(Deserialize)]
struct RawEntity {
    id: u32,
    #[serde(default)]
    color: Option<ColorSample>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    group: Option<String>,
}

/// Decode one datagram into a typed message.
pub fn decode(data: &[u8]) -> Result<DecodedMessage, DecodeError> {
    if data.len() > MAX_DATAGRAM_SIZE {
        return Err(DecodeError::Oversized { len: data.len() });
    }

    let raw: RawMessage = serde_json::from_slice(data).map_err(|err| {
        match err.classify() {
            serde_json::error::Category::Data => DecodeError::Schema,
            _ => DecodeError::Syntax,
        }
    })?;

    match raw.kind {
        MessageKind::Update => {
            let entities = raw
                .entities
                .into_iter()
                .map(|entity| {
                    entity
                        .color
                        .map(|color| EntityUpdate {
                            id: entity.id,
                            color,
                        })
                        .ok_or(DecodeError::Schema)
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(DecodedMessage::Update(UpdateMessage {
                universe: raw.universe,
                entities,
            }))
        }
        MessageKind::Config => {
            let entities = raw
                .entities
                .into_iter()
                .map(|entity| EntityConfig {
                    id: entity.id,
                    label: entity.label,
                    group: entity.group,
                })
                .collect();
            Ok(DecodedMessage::Config(ConfigMessage {
                universe: raw.universe,
                entities,
            }))
        }
        MessageKind::Unknown => Err(DecodeError::UnknownType),
    }
}
