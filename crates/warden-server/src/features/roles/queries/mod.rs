pub mod list;

pub use list::{ListRolesError, ListRolesQuery, ListRolesResponse, RoleListItem};
