/// Names of the seeded global permissions.
///
/// Permissions are referenced by name everywhere outside the database,
/// since the numeric ids are only stable within one installation.
pub struct PermissionName;

impl PermissionName {
    pub const MANAGE_USERS: &'static str = "manage_users";
    pub const MANAGE_ROLES: &'static str = "manage_roles";
    pub const MANAGE_GROUPS: &'static str = "manage_groups";

    /// The seeded catalog as `(name, description)` pairs.
    pub const CATALOG: &'static [(&'static str, &'static str)] = &[
        (Self::MANAGE_USERS, "Create, update and delete user accounts"),
        (Self::MANAGE_ROLES, "Create, update and delete roles"),
        (Self::MANAGE_GROUPS, "Create, update and delete groups and memberships"),
    ];

    #[must_use]
    pub fn is_known(name: &str) -> bool {
        Self::CATALOG.iter().any(|(n, _)| *n == name)
    }
}
