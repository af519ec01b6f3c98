pub mod context;
pub mod response;
