use crate::error::FlowError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between the endpoints of a channel id (`out->in`).
pub const CHANNEL_SEPARATOR: &str = "->";

/// Check that `name` is a legal node or resource type identifier:
/// non-empty, ASCII alphanumerics and underscores only.
pub fn validate_name(name: &str) -> Result<(), FlowError> {
    let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(FlowError::InvalidName(name.to_string()))
    }
}

/// Identifies a channel in the topology. Formed from its endpoint names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelId(String);

impl ChannelId {
    /// Build the id of the channel running from `output` to `input`.
    pub fn between(output: &str, input: &str) -> Self {
        Self(format!("{output}{CHANNEL_SEPARATOR}{input}"))
    }

    /// Parse an id of the form `out->in`. Returns `None` for anything else.
    pub fn parse(s: &str) -> Option<Self> {
        let (output, input) = s.split_once(CHANNEL_SEPARATOR)?;
        if validate_name(output).is_ok() && validate_name(input).is_ok() {
            Some(Self::between(output, input))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the node this channel loads from.
    pub fn output(&self) -> &str {
        self.0.split_once(CHANNEL_SEPARATOR).map_or("", |(o, _)| o)
    }

    /// Name of the node this channel unloads into.
    pub fn input(&self) -> &str {
        self.0.split_once(CHANNEL_SEPARATOR).map_or("", |(_, i)| i)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identity of a resource: `<producer>.<type>.<sequence>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(producer: &str, resource_type: &str, sequence: u64) -> Self {
        Self(format!("{producer}.{resource_type}.{sequence}"))
    }

    /// Id for a resource placed into stock directly rather than produced.
    pub fn seeded(node: &str, resource_type: &str, sequence: u64) -> Self {
        Self(format!("{node}.{resource_type}.seed{sequence}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_alphanumeric_and_underscore() {
        assert!(validate_name("iron_mine_2").is_ok());
        assert!(validate_name("G").is_ok());
    }

    #[test]
    fn rejects_malformed_names() {
        for bad in ["", "two words", "a->b", "dash-ed", "wood.log", "ümlaut"] {
            assert!(
                matches!(validate_name(bad), Err(FlowError::InvalidName(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn channel_id_round_trips_endpoints() {
        let id = ChannelId::between("G", "S");
        assert_eq!(id.as_str(), "G->S");
        assert_eq!(id.output(), "G");
        assert_eq!(id.input(), "S");
        assert_eq!(ChannelId::parse("G->S"), Some(id));
    }

    #[test]
    fn channel_id_parse_rejects_plain_names() {
        assert_eq!(ChannelId::parse("G"), None);
        assert_eq!(ChannelId::parse("->S"), None);
        assert_eq!(ChannelId::parse("G->"), None);
    }

    #[test]
    fn resource_id_format() {
        assert_eq!(ResourceId::new("G", "wood", 3).as_str(), "G.wood.3");
        assert_eq!(ResourceId::seeded("P", "wood", 1).as_str(), "P.wood.seed1");
    }
}
