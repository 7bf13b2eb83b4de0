//! Who may do what. Pure functions over identifiers, no transport or storage.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Self::Allow
    }
}

/// An action together with the resource it touches.
#[derive(Debug, Clone, Copy)]
pub enum Action<'a> {
    UpdateClub { owner_id: &'a str },
    DeleteClub { owner_id: &'a str },
    ListConversations { user_id: &'a str },
    /// Opening a chat marks the reader's inbound messages read, so only the
    /// reader may do it.
    ReadChat { reader_id: &'a str },
}

pub fn authorize(subject: &str, action: Action<'_>) -> Decision {
    let owner = match action {
        Action::UpdateClub { owner_id } | Action::DeleteClub { owner_id } => owner_id,
        Action::ListConversations { user_id } => user_id,
        Action::ReadChat { reader_id } => reader_id,
    };

    if !subject.is_empty() && subject == owner {
        Decision::Allow
    } else {
        Decision::Deny
    }
}
