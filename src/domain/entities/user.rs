use std::fmt;

/// Represents a chat user
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct User {
    pub id: String,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub is_bot: bool,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: None,
            display_name: None,
            is_bot: false,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn as_bot(mut self) -> Self {
        self.is_bot = true;
        self
    }

    pub fn name(&self) -> String {
        if let Some(ref display) = self.display_name {
            display.clone()
        } else if let Some(ref username) = self.username {
            username.clone()
        } else {
            self.id.clone()
        }
    }

    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Access level of a user, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Everyone,
    Moderator,
    Admin,
    Owner,
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Everyone => "everyone",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }

    /// Whether this role satisfies a command requiring `required`
    pub fn allows(&self, required: Role) -> bool {
        *self >= required
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_prefers_display_name() {
        let user = User::new("42").with_username("palm").with_display_name("Palm");
        assert_eq!(user.name(), "Palm");
        assert_eq!(User::new("42").with_username("palm").name(), "palm");
        assert_eq!(User::new("42").name(), "42");
    }

    #[test]
    fn roles_are_ordered() {
        assert!(Role::Owner.allows(Role::Moderator));
        assert!(Role::Moderator.allows(Role::Moderator));
        assert!(!Role::Everyone.allows(Role::Moderator));
        assert!(!Role::Admin.allows(Role::Owner));
    }
}
