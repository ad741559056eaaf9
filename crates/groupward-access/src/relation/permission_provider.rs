use serde::{Deserialize, Serialize};

use super::{Operation, Ownership, PermissionTarget, RelationTypeDefinition};

/// Permission granting membership to a non-member.
pub const JOIN_GROUP: &str = "join group";
/// Permission letting a member end their own membership.
pub const LEAVE_GROUP: &str = "leave group";
/// Admin permission of the membership plugin.
pub const ADMINISTER_MEMBERS: &str = "administer members";

/// A group permission as shown on the permissions overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDefinition {
    pub name: String,
    pub title: String,
    /// Plugin ID, or `group` for group-level permissions.
    pub provider: String,
    /// Whether granting it warrants a security warning.
    pub restrict_access: bool,
}

/// Names the permissions of one relation plugin.
///
/// Names are derived purely from the plugin definition, so the same
/// arguments always produce the same name. `None` means the plugin does
/// not support that combination and it never grants anything.
pub trait PermissionProvider: Send + Sync {
    fn plugin_id(&self) -> &str;

    fn admin_permission(&self) -> Option<String>;

    fn permission(
        &self,
        operation: Operation,
        target: PermissionTarget,
        ownership: Ownership,
    ) -> Option<String>;

    /// Every permission this plugin defines.
    fn build_permissions(&self) -> Vec<PermissionDefinition>;
}

/// Permission names used by ordinary content plugins.
#[derive(Debug, Clone)]
pub struct DefaultPermissionProvider {
    definition: RelationTypeDefinition,
    ownable: bool,
    publishable: bool,
}

impl DefaultPermissionProvider {
    /// `ownable` and `publishable` describe the grouped entity type.
    pub fn new(definition: RelationTypeDefinition, ownable: bool, publishable: bool) -> Self {
        Self {
            definition,
            ownable,
            publishable,
        }
    }

    fn relationship_permission(&self, operation: Operation, ownership: Ownership) -> Option<String> {
        let plugin = &self.definition.id;
        match (operation, ownership) {
            (Operation::View, Ownership::Any) => Some(format!("view {plugin} relationship")),
            (Operation::View, Ownership::Own) => Some(format!("view own {plugin} relationship")),
            (Operation::Update | Operation::Delete, scope) => Some(format!(
                "{} {} {plugin} relationship",
                operation.as_str(),
                scope.as_str()
            )),
            (Operation::Create, Ownership::Any) => Some(format!("create {plugin} relationship")),
            _ => None,
        }
    }

    fn entity_permission(&self, operation: Operation, ownership: Ownership) -> Option<String> {
        if !self.definition.entity_access {
            return None;
        }
        let plugin = &self.definition.id;
        if ownership == Ownership::Own && !self.ownable {
            return None;
        }
        match (operation, ownership) {
            (Operation::View, Ownership::Any) => Some(format!("view {plugin} entity")),
            (Operation::View, Ownership::Own) => Some(format!("view own {plugin} entity")),
            (Operation::ViewUnpublished, _) if !self.publishable => None,
            (Operation::ViewUnpublished, Ownership::Any) => {
                Some(format!("view unpublished {plugin} entity"))
            }
            (Operation::ViewUnpublished, Ownership::Own) => {
                Some(format!("view own unpublished {plugin} entity"))
            }
            (Operation::Update | Operation::Delete, scope) => Some(format!(
                "{} {} {plugin} entity",
                operation.as_str(),
                scope.as_str()
            )),
            (Operation::Create, Ownership::Any) => Some(format!("create {plugin} entity")),
            (Operation::Create, Ownership::Own) => None,
        }
    }

    fn title(&self, operation: Operation, target: PermissionTarget, ownership: Ownership) -> String {
        let ownership = match (operation, ownership) {
            (Operation::Create, _) => "",
            (_, Ownership::Any) => " any",
            (_, Ownership::Own) => " own",
        };
        let mut operation = operation.as_str().to_string();
        if let Some(first) = operation.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        format!(
            "{}: {operation}{ownership} {}",
            self.definition.label,
            target.as_str()
        )
    }
}

impl PermissionProvider for DefaultPermissionProvider {
    fn plugin_id(&self) -> &str {
        &self.definition.id
    }

    fn admin_permission(&self) -> Option<String> {
        self.definition
            .admin_permission
            .then(|| format!("administer {}", self.definition.id))
    }

    fn permission(
        &self,
        operation: Operation,
        target: PermissionTarget,
        ownership: Ownership,
    ) -> Option<String> {
        match target {
            PermissionTarget::Relationship => self.relationship_permission(operation, ownership),
            PermissionTarget::Entity => self.entity_permission(operation, ownership),
        }
    }

    fn build_permissions(&self) -> Vec<PermissionDefinition> {
        let mut permissions = Vec::new();
        if let Some(admin) = self.admin_permission() {
            permissions.push(PermissionDefinition {
                title: format!("{}: Administer relations", self.definition.label),
                name: admin,
                provider: self.definition.id.clone(),
                restrict_access: true,
            });
        }

        for target in [PermissionTarget::Relationship, PermissionTarget::Entity] {
            for operation in [
                Operation::View,
                Operation::ViewUnpublished,
                Operation::Update,
                Operation::Delete,
                Operation::Create,
            ] {
                for ownership in [Ownership::Any, Ownership::Own] {
                    let Some(name) = self.permission(operation, target, ownership) else {
                        continue;
                    };
                    if permissions.iter().any(|existing| existing.name == name) {
                        continue;
                    }
                    permissions.push(PermissionDefinition {
                        title: self.title(operation, target, ownership),
                        name,
                        provider: self.definition.id.clone(),
                        restrict_access: false,
                    });
                }
            }
        }
        permissions
    }
}

/// Permission names of the membership plugin: the default names plus
/// joining and leaving, with `administer members` as admin permission.
#[derive(Debug, Clone)]
pub struct MembershipPermissionProvider {
    inner: DefaultPermissionProvider,
}

impl MembershipPermissionProvider {
    pub fn new(definition: RelationTypeDefinition) -> Self {
        Self {
            inner: DefaultPermissionProvider::new(definition, true, false),
        }
    }
}

impl PermissionProvider for MembershipPermissionProvider {
    fn plugin_id(&self) -> &str {
        self.inner.plugin_id()
    }

    fn admin_permission(&self) -> Option<String> {
        Some(ADMINISTER_MEMBERS.into())
    }

    fn permission(
        &self,
        operation: Operation,
        target: PermissionTarget,
        ownership: Ownership,
    ) -> Option<String> {
        self.inner.permission(operation, target, ownership)
    }

    fn build_permissions(&self) -> Vec<PermissionDefinition> {
        let provider = self.plugin_id().to_string();
        let mut permissions = vec![
            PermissionDefinition {
                name: ADMINISTER_MEMBERS.into(),
                title: "Administer group members".into(),
                provider: provider.clone(),
                restrict_access: true,
            },
            PermissionDefinition {
                name: JOIN_GROUP.into(),
                title: "Join group".into(),
                provider: provider.clone(),
                restrict_access: false,
            },
            PermissionDefinition {
                name: LEAVE_GROUP.into(),
                title: "Leave group".into(),
                provider,
                restrict_access: false,
            },
        ];
        permissions.extend(
            self.inner
                .build_permissions()
                .into_iter()
                .filter(|permission| !permission.restrict_access),
        );
        permissions
    }
}
