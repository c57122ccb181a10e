use std::collections::HashSet;

use crate::domain::entities::Role;

/// Maps user ids to roles from the configured lists
#[derive(Debug, Clone, Default)]
pub struct RoleResolver {
    owners: HashSet<String>,
    admins: HashSet<String>,
    moderators: HashSet<String>,
}

impl RoleResolver {
    pub fn new(owners: &[String], admins: &[String], moderators: &[String]) -> Self {
        Self {
            owners: owners.iter().cloned().collect(),
            admins: admins.iter().cloned().collect(),
            moderators: moderators.iter().cloned().collect(),
        }
    }

    pub fn role_of(&self, user_id: Option<&str>) -> Role {
        let Some(id) = user_id else {
            return Role::Everyone;
        };
        if self.owners.contains(id) {
            Role::Owner
        } else if self.admins.contains(id) {
            Role::Admin
        } else if self.moderators.contains(id) {
            Role::Moderator
        } else {
            Role::Everyone
        }
    }

    pub fn is_owner(&self, user_id: &str) -> bool {
        self.owners.contains(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highest_listed_role_wins() {
        let roles = RoleResolver::new(&["1".into()], &["1".into(), "2".into()], &["3".into()]);
        assert_eq!(roles.role_of(Some("1")), Role::Owner);
        assert_eq!(roles.role_of(Some("2")), Role::Admin);
        assert_eq!(roles.role_of(Some("3")), Role::Moderator);
        assert_eq!(roles.role_of(Some("4")), Role::Everyone);
        assert_eq!(roles.role_of(None), Role::Everyone);
    }
}
