use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use super::CalculatedPermissions;

/// Stable digest of a calculated permission set.
///
/// Two accounts with the same effective grants share a hash, which makes
/// it usable as the value of the `user.group_permissions` cache context.
pub fn permissions_hash(permissions: &CalculatedPermissions) -> String {
    let mut hasher = Sha256::new();
    for item in permissions.items() {
        hasher.update(item.scope().as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(item.identifier().as_bytes());
        hasher.update(if item.is_admin() { b"|admin|" } else { b"|-----|" });
        for permission in item.permissions() {
            hasher.update(permission.as_bytes());
            hasher.update(b",");
        }
        hasher.update(b"\n");
    }
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::{CalculatedPermissionsItem, PermissionScope, RefinableCalculatedPermissions};

    fn set(perms: &[&str]) -> CalculatedPermissions {
        let mut refinable = RefinableCalculatedPermissions::new();
        refinable.add_item(CalculatedPermissionsItem::new(
            PermissionScope::Individual,
            "1",
            perms.iter().copied(),
            false,
        ));
        refinable.freeze()
    }

    #[test]
    fn equal_sets_hash_equally() {
        assert_eq!(
            permissions_hash(&set(&["view group", "edit group"])),
            permissions_hash(&set(&["edit group", "view group"]))
        );
    }

    #[test]
    fn different_sets_hash_differently() {
        assert_ne!(
            permissions_hash(&set(&["view group"])),
            permissions_hash(&set(&["edit group"]))
        );
        assert_ne!(
            permissions_hash(&set(&[])),
            permissions_hash(&CalculatedPermissions::default())
        );
    }
}
