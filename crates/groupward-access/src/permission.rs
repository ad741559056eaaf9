//! Calculated group permissions: the per-account union of every grant
//! that applies across group, group type and global scopes.

mod calculated;
mod hash;
mod item;

pub use calculated::{CalculatedPermissions, RefinableCalculatedPermissions};
pub use hash::permissions_hash;
pub use item::{CalculatedPermissionsItem, GLOBAL_IDENTIFIER, PermissionScope};
