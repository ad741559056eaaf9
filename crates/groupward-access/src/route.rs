//! Access requirements of the group routes.
//!
//! Each route carries requirement strings keyed like
//! `_group_permission`. Before they are evaluated the `{group}` path
//! parameter is upcast to a loaded [`Group`]; a parameter that resolves
//! to nothing makes the route a 404 rather than a 403.

use std::collections::BTreeMap;
use std::sync::Arc;

use groupward_core::error::{GroupError, GroupResult};
use groupward_core::models::account::Account;
use groupward_core::models::group::Group;
use groupward_core::models::group_type::GroupType;
use groupward_core::repository::{GroupRepository, GroupTypeRepository, RelationshipRepository};
use thiserror::Error;
use uuid::Uuid;

use crate::access::group::ACCESS_CONTENT_OVERVIEW;
use crate::access_result::AccessResult;
use crate::calculator::PermissionSource;
use crate::checker::{GroupContext, GroupPermissionChecker};
use crate::relation::{ADMINISTER_MEMBERS, JOIN_GROUP, LEAVE_GROUP, RelationTypeRegistry};

pub const GROUP_PERMISSION: &str = "_group_permission";
pub const GROUP_MEMBER: &str = "_group_member";
pub const RELATIONSHIP_CREATE_ACCESS: &str = "_group_relationship_create_access";
pub const RELATIONSHIP_CREATE_ENTITY_ACCESS: &str = "_group_relationship_create_entity_access";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("unknown route: {0}")]
    UnknownRoute(String),

    #[error("unknown requirement: {0}")]
    UnknownRequirement(String),

    #[error("invalid value {value:?} for requirement {key}")]
    InvalidValue { key: String, value: String },
}

impl From<RouteError> for GroupError {
    fn from(err: RouteError) -> Self {
        match err {
            RouteError::UnknownRoute(name) => GroupError::not_found("route", name),
            other => GroupError::validation(other.to_string()),
        }
    }
}

/// A `_group_permission` value: `a+b` needs either, `a,b` needs both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionExpression {
    Any(Vec<String>),
    All(Vec<String>),
}

impl PermissionExpression {
    pub fn parse(value: &str) -> Result<Self, RouteError> {
        let invalid = || RouteError::InvalidValue {
            key: GROUP_PERMISSION.into(),
            value: value.into(),
        };
        if value.contains(',') && value.contains('+') {
            return Err(invalid());
        }
        let (separator, all) = if value.contains(',') { (',', true) } else { ('+', false) };
        let permissions: Vec<String> = value
            .split(separator)
            .map(str::trim)
            .filter(|permission| !permission.is_empty())
            .map(String::from)
            .collect();
        if permissions.is_empty() {
            return Err(invalid());
        }
        Ok(if all {
            PermissionExpression::All(permissions)
        } else {
            PermissionExpression::Any(permissions)
        })
    }

    pub fn evaluate(&self, context: &GroupContext) -> bool {
        match self {
            PermissionExpression::Any(permissions) => {
                permissions.iter().any(|p| context.has_permission(p))
            }
            PermissionExpression::All(permissions) => {
                permissions.iter().all(|p| context.has_permission(p))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    GroupPermission(PermissionExpression),
    GroupMember(bool),
    RelationshipCreateAccess,
    RelationshipCreateEntityAccess,
}

impl Requirement {
    pub fn parse(key: &str, value: &str) -> Result<Self, RouteError> {
        let invalid = || RouteError::InvalidValue {
            key: key.into(),
            value: value.into(),
        };
        match key {
            GROUP_PERMISSION => Ok(Requirement::GroupPermission(PermissionExpression::parse(value)?)),
            GROUP_MEMBER => match value {
                "TRUE" => Ok(Requirement::GroupMember(true)),
                "FALSE" => Ok(Requirement::GroupMember(false)),
                _ => Err(invalid()),
            },
            RELATIONSHIP_CREATE_ACCESS | RELATIONSHIP_CREATE_ENTITY_ACCESS => {
                if value != "TRUE" {
                    return Err(invalid());
                }
                Ok(if key == RELATIONSHIP_CREATE_ACCESS {
                    Requirement::RelationshipCreateAccess
                } else {
                    Requirement::RelationshipCreateEntityAccess
                })
            }
            other => Err(RouteError::UnknownRequirement(other.into())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Route {
    pub name: String,
    pub path: String,
    pub requirements: BTreeMap<String, String>,
}

impl Route {
    pub fn new(name: &str, path: &str) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            requirements: BTreeMap::new(),
        }
    }

    pub fn require(mut self, key: &str, value: &str) -> Self {
        self.requirements.insert(key.into(), value.into());
        self
    }

    pub fn parsed_requirements(&self) -> Result<Vec<Requirement>, RouteError> {
        self.requirements
            .iter()
            .map(|(key, value)| Requirement::parse(key, value))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: BTreeMap<String, Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self {
            routes: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, route: Route) -> &mut Self {
        self.routes.insert(route.name.clone(), route);
        self
    }

    pub fn get(&self, name: &str) -> Result<&Route, RouteError> {
        self.routes
            .get(name)
            .ok_or_else(|| RouteError::UnknownRoute(name.into()))
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    /// The routes every group site exposes.
    pub fn group_routes() -> Self {
        let mut table = Self::new();
        table
            .add(
                Route::new("entity.group.join", "/group/{group}/join")
                    .require(GROUP_PERMISSION, JOIN_GROUP)
                    .require(GROUP_MEMBER, "FALSE"),
            )
            .add(
                Route::new("entity.group.leave", "/group/{group}/leave")
                    .require(GROUP_PERMISSION, LEAVE_GROUP)
                    .require(GROUP_MEMBER, "TRUE"),
            )
            .add(
                Route::new("entity.group_relationship.collection", "/group/{group}/content")
                    .require(GROUP_PERMISSION, ACCESS_CONTENT_OVERVIEW),
            )
            .add(
                Route::new("entity.group_relationship.add_page", "/group/{group}/content/add")
                    .require(RELATIONSHIP_CREATE_ACCESS, "TRUE"),
            )
            .add(
                Route::new(
                    "entity.group_relationship.create_page",
                    "/group/{group}/content/create",
                )
                .require(RELATIONSHIP_CREATE_ENTITY_ACCESS, "TRUE"),
            )
            .add(
                Route::new(
                    "entity.group_relationship.add_form",
                    "/group/{group}/content/add/{plugin_id}",
                )
                .require(RELATIONSHIP_CREATE_ACCESS, "TRUE"),
            )
            .add(
                Route::new(
                    "entity.group_relationship.create_form",
                    "/group/{group}/content/create/{plugin_id}",
                )
                .require(RELATIONSHIP_CREATE_ENTITY_ACCESS, "TRUE"),
            )
            .add(
                Route::new("view.group_members", "/group/{group}/members").require(
                    GROUP_PERMISSION,
                    &format!("{ADMINISTER_MEMBERS}+view group_membership relationship"),
                ),
            );
        table
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::group_routes()
    }
}

/// Raw path parameters of a request.
#[derive(Debug, Clone, Default)]
pub struct RouteParams {
    pub group: Option<String>,
    pub plugin_id: Option<String>,
}

impl RouteParams {
    pub fn group(group: impl Into<String>) -> Self {
        Self {
            group: Some(group.into()),
            plugin_id: None,
        }
    }

    pub fn with_plugin(mut self, plugin_id: impl Into<String>) -> Self {
        self.plugin_id = Some(plugin_id.into());
        self
    }
}

#[derive(Debug)]
pub enum RouteDecision {
    Allowed(Group),
    Forbidden(AccessResult),
    NotFound,
}

impl RouteDecision {
    /// The HTTP status the decision maps to.
    pub fn status(&self) -> u16 {
        match self {
            RouteDecision::Allowed(_) => 200,
            RouteDecision::Forbidden(_) => 403,
            RouteDecision::NotFound => 404,
        }
    }
}

/// Evaluate requirements against an upcast group.
///
/// Every requirement must allow; the create-access requirements look at
/// one plugin when the route names it and at any installed plugin
/// otherwise.
pub fn evaluate_requirements(
    requirements: &[Requirement],
    context: &GroupContext,
    group_type: &GroupType,
    plugin_id: Option<&str>,
    registry: &RelationTypeRegistry,
) -> GroupResult<AccessResult> {
    let mut result = AccessResult::allowed().add_cacheable_dependency(&context.metadata());
    for requirement in requirements {
        let next = match requirement {
            Requirement::GroupPermission(expression) => {
                AccessResult::allowed_if(expression.evaluate(context))
            }
            Requirement::GroupMember(expected) => {
                AccessResult::allowed_if(context.is_member == *expected)
            }
            Requirement::RelationshipCreateAccess | Requirement::RelationshipCreateEntityAccess => {
                let entity = matches!(requirement, Requirement::RelationshipCreateEntityAccess);
                let plugin_ids: Vec<String> = match plugin_id {
                    Some(plugin_id) => vec![plugin_id.to_string()],
                    None => group_type
                        .installed_plugins
                        .iter()
                        .filter(|id| registry.has_plugin(id))
                        .cloned()
                        .collect(),
                };
                let mut any = AccessResult::neutral();
                for plugin_id in &plugin_ids {
                    let access_control = registry.access_control(plugin_id)?;
                    any = any.or_if(if entity {
                        access_control.entity_create_access(context)
                    } else {
                        access_control.relationship_create_access(context)
                    });
                }
                any
            }
        };
        result = result.and_if(next);
        if !result.is_allowed() {
            break;
        }
    }
    Ok(result)
}

/// Decides access to named group routes for an account.
pub struct RouteAccessChecker<S, G, T, M>
where
    S: PermissionSource,
    M: RelationshipRepository,
{
    routes: RouteTable,
    groups: G,
    group_types: T,
    checker: Arc<GroupPermissionChecker<S, M>>,
    registry: Arc<RelationTypeRegistry>,
}

impl<S, G, T, M> RouteAccessChecker<S, G, T, M>
where
    S: PermissionSource,
    G: GroupRepository,
    T: GroupTypeRepository,
    M: RelationshipRepository,
{
    pub fn new(
        routes: RouteTable,
        groups: G,
        group_types: T,
        checker: Arc<GroupPermissionChecker<S, M>>,
        registry: Arc<RelationTypeRegistry>,
    ) -> Self {
        Self {
            routes,
            groups,
            group_types,
            checker,
            registry,
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Resolve the `{group}` parameter. Anything that is not the ID of a
    /// stored group resolves to `None`.
    pub async fn upcast_group(&self, raw: &str) -> GroupResult<Option<Group>> {
        let Ok(id) = Uuid::parse_str(raw) else {
            return Ok(None);
        };
        match self.groups.get_by_id(id).await {
            Ok(group) => Ok(Some(group)),
            Err(GroupError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn check(
        &self,
        route_name: &str,
        params: &RouteParams,
        account: &Account,
    ) -> GroupResult<RouteDecision> {
        let route = self.routes.get(route_name)?;
        let requirements = route.parsed_requirements()?;

        let Some(raw_group) = params.group.as_deref() else {
            return Ok(RouteDecision::NotFound);
        };
        let Some(group) = self.upcast_group(raw_group).await? else {
            tracing::debug!(route = route_name, group = raw_group, "group parameter not found");
            return Ok(RouteDecision::NotFound);
        };
        let group_type = self.group_types.get_by_id(&group.group_type_id).await?;

        let plugin_id = params.plugin_id.as_deref();
        if let Some(plugin_id) = plugin_id {
            if !group_type.has_plugin(plugin_id) || !self.registry.has_plugin(plugin_id) {
                return Ok(RouteDecision::NotFound);
            }
        }

        let context = self.checker.group_context(account, &group).await?;
        let result =
            evaluate_requirements(&requirements, &context, &group_type, plugin_id, &self.registry)?;
        tracing::debug!(
            route = route_name,
            group_id = %group.id,
            account = ?account.id,
            allowed = result.is_allowed(),
            "checked route access"
        );
        if result.is_allowed() {
            Ok(RouteDecision::Allowed(group))
        } else {
            Ok(RouteDecision::Forbidden(result))
        }
    }
}
