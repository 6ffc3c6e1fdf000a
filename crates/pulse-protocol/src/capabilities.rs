//! Capability sets exchanged in `hello{supports}`.

use std::collections::HashSet;

use crate::envelope::MessageKind;

/// A set of message kinds one side is willing to handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilitySet {
    kinds: HashSet<MessageKind>,
}

impl CapabilitySet {
    /// Every command kind defined by the protocol.
    pub fn commands() -> Self {
        MessageKind::COMMANDS.into_iter().collect()
    }

    /// Build from wire names. Unknown names are ignored.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .filter_map(|name| MessageKind::parse(name.as_ref()))
            .collect()
    }

    pub fn supports(&self, kind: MessageKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Kinds present in both sets.
    pub fn intersection(&self, other: &CapabilitySet) -> CapabilitySet {
        self.kinds.intersection(&other.kinds).copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Wire names in protocol declaration order.
    pub fn names(&self) -> Vec<String> {
        MessageKind::ALL
            .into_iter()
            .filter(|kind| self.kinds.contains(kind))
            .map(|kind| kind.as_str().to_string())
            .collect()
    }
}

impl Default for CapabilitySet {
    fn default() -> Self {
        Self::commands()
    }
}

impl FromIterator<MessageKind> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = MessageKind>>(iter: T) -> Self {
        Self {
            kinds: iter.into_iter().collect(),
        }
    }
}
