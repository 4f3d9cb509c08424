use uuid::Uuid;

/// Global broadcast channel for presence events.
pub const USER_STATUS: &str = "user-status";

const CONVERSATION_PREFIX: &str = "conversation-";

/// The two channel families of the messaging core. The wire names
/// (`conversation-{id}`, `user-status`) are interoperability-critical and
/// must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Conversation(Uuid),
    UserStatus,
}

impl Channel {
    pub fn name(&self) -> String {
        match self {
            Channel::Conversation(id) => format!("{CONVERSATION_PREFIX}{id}"),
            Channel::UserStatus => USER_STATUS.to_string(),
        }
    }

    /// Parse a channel name, accepting the canonical form as well as the
    /// client-side `private-`/`presence-` prefixed subscription names.
    pub fn parse(name: &str) -> Option<Self> {
        let canonical = name
            .strip_prefix("private-")
            .or_else(|| name.strip_prefix("presence-"))
            .unwrap_or(name);

        if canonical == USER_STATUS {
            return Some(Channel::UserStatus);
        }
        let id = canonical.strip_prefix(CONVERSATION_PREFIX)?;
        Uuid::parse_str(id).ok().map(Channel::Conversation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_channel_name_format() {
        let id = Uuid::new_v4();
        assert_eq!(Channel::Conversation(id).name(), format!("conversation-{id}"));
    }

    #[test]
    fn parses_canonical_names() {
        let id = Uuid::new_v4();
        assert_eq!(
            Channel::parse(&format!("conversation-{id}")),
            Some(Channel::Conversation(id))
        );
        assert_eq!(Channel::parse("user-status"), Some(Channel::UserStatus));
    }

    #[test]
    fn parses_prefixed_subscription_names() {
        let id = Uuid::new_v4();
        assert_eq!(
            Channel::parse(&format!("private-conversation-{id}")),
            Some(Channel::Conversation(id))
        );
        assert_eq!(
            Channel::parse("presence-user-status"),
            Some(Channel::UserStatus)
        );
    }

    #[test]
    fn rejects_malformed_names() {
        assert_eq!(Channel::parse("conversation-not-a-uuid"), None);
        assert_eq!(Channel::parse("presence"), None);
        assert_eq!(Channel::parse(""), None);
    }
}
