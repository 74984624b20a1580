use core::fmt;
use std::error::Error;

/// Construction-time failures for virtual nodes.
///
/// Malformed nodes are rejected when they are built so the diff engine never
/// sees them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// Element created with an empty tag name.
    EmptyTag,
    /// Tag name contains characters a host cannot represent.
    InvalidTag(String),
    /// Attribute name is empty or contains markup-significant characters.
    InvalidAttribute { tag: String, name: String },
    /// Two siblings declare the same explicit key.
    DuplicateKey { parent: String, key: String },
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyTag => f.write_str("element tag name is empty"),
            Self::InvalidTag(tag) => write!(f, "invalid element tag name `{tag}`"),
            Self::InvalidAttribute { tag, name } => {
                write!(f, "invalid attribute name `{name}` on <{tag}>")
            }
            Self::DuplicateKey { parent, key } => {
                write!(f, "duplicate sibling key `{key}` under {parent}")
            }
        }
    }
}

impl Error for NodeError {}
