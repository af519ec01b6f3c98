pub mod get;
pub mod list;

pub use get::{GetUserError, GetUserQuery, GetUserResponse};
pub use list::{ListUsersError, ListUsersQuery, ListUsersResponse, UserListItem};
// Re-export from shared module to avoid privacy issues
pub use crate::features::shared::pagination::PaginationMetadata;
