pub mod create;

pub use create::{CreateRoleCommand, CreateRoleError, CreateRoleResponse};
