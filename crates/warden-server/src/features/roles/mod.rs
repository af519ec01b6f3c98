pub mod commands;
pub mod queries;
pub mod routes;

pub use commands::{CreateRoleCommand, CreateRoleError, CreateRoleResponse};
pub use queries::{ListRolesError, ListRolesQuery, ListRolesResponse, RoleListItem};

pub use routes::roles_routes;
