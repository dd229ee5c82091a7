// src/models/mod.rs

pub mod dn;
pub mod group;
pub mod object;
pub mod ou;
pub mod password;
pub mod user;

// Re-exports

pub use group::Group;
pub use object::DirectoryObject;
pub use ou::OrgUnit;
pub use password::{PasswordError, PasswordHash};
pub use user::User;
