use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::Authorizer;
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Group, GroupNode, GroupTreeRow, PermissionName, User};

const MAX_GROUP_NAME_LEN: usize = 128;

#[derive(Debug, Clone)]
pub struct NewGroup {
    pub name: String,
    pub description: String,
    pub parent_id: Option<String>,
}

/// Partial group update. `parent_id: Some(None)` detaches the group to a root.
#[derive(Debug, Clone, Default)]
pub struct GroupUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<Option<String>>,
}

pub struct GroupHierarchy {
    store: Arc<dyn Store>,
    authz: Authorizer,
}

fn validate_group_name(name: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::BadRequest("group name cannot be empty".to_string()));
    }
    if name.chars().count() > MAX_GROUP_NAME_LEN {
        return Err(Error::BadRequest(format!(
            "group name cannot exceed {MAX_GROUP_NAME_LEN} characters"
        )));
    }
    Ok(())
}

impl GroupHierarchy {
    pub fn new(store: Arc<dyn Store>, authz: Authorizer) -> Self {
        Self { store, authz }
    }

    pub fn get(&self, id: &str) -> Result<Group> {
        self.store.get_group(id)?.ok_or(Error::NotFound("group"))
    }

    pub fn list(&self) -> Result<Vec<Group>> {
        self.store.list_groups()
    }

    /// Builds the forest below `root`, or the whole forest when `None`.
    pub fn tree(&self, root: Option<&str>) -> Result<Vec<GroupNode>> {
        if let Some(root) = root {
            self.get(root)?;
        }
        let rows = self.store.group_tree(root)?;
        Ok(assemble_tree(rows))
    }

    pub fn create(&self, actor: &User, new: NewGroup) -> Result<Group> {
        self.authz.require(&actor.id, PermissionName::MANAGE_GROUPS)?;
        validate_group_name(&new.name)?;

        if let Some(parent_id) = new.parent_id.as_deref() {
            if self.store.get_group(parent_id)?.is_none() {
                return Err(Error::NotFound("parent group"));
            }
        }

        let group = Group {
            id: Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            description: new.description,
            parent_id: new.parent_id,
            created_at: Utc::now(),
        };
        self.store.create_group(&group)?;

        tracing::info!("Created group {} ({})", group.name, group.id);
        Ok(group)
    }

    pub fn update(&self, actor: &User, id: &str, update: GroupUpdate) -> Result<Group> {
        self.authz.require(&actor.id, PermissionName::MANAGE_GROUPS)?;

        let mut group = self.get(id)?;
        if let Some(name) = update.name {
            validate_group_name(&name)?;
            group.name = name.trim().to_string();
        }
        if let Some(description) = update.description {
            group.description = description;
        }
        if let Some(parent_id) = update.parent_id {
            group.parent_id = parent_id;
        }

        self.store.update_group(&group)?;
        Ok(group)
    }

    /// Deletes a leaf group without members. Never cascades.
    pub fn delete(&self, actor: &User, id: &str) -> Result<()> {
        self.authz.require(&actor.id, PermissionName::MANAGE_GROUPS)?;

        if !self.store.delete_group(id)? {
            return Err(Error::NotFound("group"));
        }

        tracing::info!("Deleted group {id}");
        Ok(())
    }

    pub fn add_member(&self, actor: &User, group_id: &str, user_id: &str) -> Result<()> {
        self.authz.require(&actor.id, PermissionName::MANAGE_GROUPS)?;
        self.get(group_id)?;
        if self.store.get_user(user_id)?.is_none() {
            return Err(Error::NotFound("user"));
        }
        self.store.add_group_member(group_id, user_id)
    }

    pub fn remove_member(&self, actor: &User, group_id: &str, user_id: &str) -> Result<()> {
        self.authz.require(&actor.id, PermissionName::MANAGE_GROUPS)?;
        self.store.remove_group_member(group_id, user_id)?;
        Ok(())
    }
}

/// Assembles flat traversal rows into a forest in one pass over a node map.
///
/// A row is a root when its depth is zero or its parent is not among the
/// rows. Siblings are ordered by name, then id.
#[must_use]
pub fn assemble_tree(rows: Vec<GroupTreeRow>) -> Vec<GroupNode> {
    let index: HashMap<String, usize> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| (row.id.clone(), i))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); rows.len()];
    let mut roots = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let parent = row
            .parent_id
            .as_ref()
            .filter(|_| row.depth > 0)
            .and_then(|p| index.get(p))
            .copied()
            .filter(|&p| p != i);
        match parent {
            Some(p) => children[p].push(i),
            None => roots.push(i),
        }
    }

    let mut slots: Vec<Option<GroupTreeRow>> = rows.into_iter().map(Some).collect();
    let mut forest: Vec<GroupNode> = roots
        .into_iter()
        .filter_map(|i| build_node(i, &mut slots, &children))
        .collect();
    sort_siblings(&mut forest);
    forest
}

fn build_node(
    i: usize,
    slots: &mut [Option<GroupTreeRow>],
    children: &[Vec<usize>],
) -> Option<GroupNode> {
    // Taking the slot guarantees each row is materialized at most once.
    let row = slots[i].take()?;
    let mut kids: Vec<GroupNode> = children[i]
        .iter()
        .filter_map(|&c| build_node(c, slots, children))
        .collect();
    sort_siblings(&mut kids);

    Some(GroupNode {
        id: row.id,
        name: row.name,
        description: row.description,
        parent_id: row.parent_id,
        depth: row.depth,
        children: kids,
    })
}

fn sort_siblings(nodes: &mut [GroupNode]) {
    nodes.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::{admin, member, store_with_role};

    fn row(id: &str, name: &str, parent_id: Option<&str>, depth: i64) -> GroupTreeRow {
        GroupTreeRow {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            parent_id: parent_id.map(str::to_string),
            depth,
        }
    }

    fn new_group(name: &str, parent_id: Option<&str>) -> NewGroup {
        NewGroup {
            name: name.to_string(),
            description: String::new(),
            parent_id: parent_id.map(str::to_string),
        }
    }

    #[test]
    fn test_assemble_tree_nests_and_orders() {
        let rows = vec![
            row("r", "root", None, 0),
            row("z", "zeta", Some("r"), 1),
            row("a", "alpha", Some("r"), 1),
            row("l", "leaf", Some("a"), 2),
        ];

        let forest = assemble_tree(rows);
        assert_eq!(forest.len(), 1);
        let root = &forest[0];
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].name, "alpha");
        assert_eq!(root.children[0].children[0].id, "l");
        assert_eq!(root.children[1].name, "zeta");
    }

    #[test]
    fn test_assemble_tree_promotes_orphans_to_roots() {
        // A subtree query starts below the real root, so its first row
        // has a parent that is not in the result.
        let rows = vec![
            row("a", "alpha", Some("r"), 0),
            row("l", "leaf", Some("a"), 1),
            row("o", "orphan", Some("missing"), 3),
        ];

        let forest = assemble_tree(rows);
        let ids: Vec<&str> = forest.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "o"]);
        assert_eq!(forest[0].children[0].id, "l");
    }

    #[test]
    fn test_tree_unknown_root_is_not_found() {
        let store = store_with_role(&[]);
        let groups = GroupHierarchy::new(store.clone(), Authorizer::new(store));
        assert!(matches!(groups.tree(Some("nope")), Err(Error::NotFound(_))));
        assert!(groups.tree(None).unwrap().is_empty());
    }

    #[test]
    fn test_delete_with_child_conflicts_until_child_moves() {
        let store = store_with_role(&[]);
        let root = admin(&*store, "root");
        let groups = GroupHierarchy::new(store.clone(), Authorizer::new(store));

        let parent = groups.create(&root, new_group("parent", None)).unwrap();
        let child = groups
            .create(&root, new_group("child", Some(&parent.id)))
            .unwrap();

        assert!(matches!(
            groups.delete(&root, &parent.id),
            Err(Error::Conflict(_))
        ));

        groups
            .update(
                &root,
                &child.id,
                GroupUpdate {
                    parent_id: Some(None),
                    ..GroupUpdate::default()
                },
            )
            .unwrap();
        groups.delete(&root, &parent.id).unwrap();
        assert!(matches!(groups.get(&parent.id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_reparent_under_descendant_rejected() {
        let store = store_with_role(&[]);
        let root = admin(&*store, "root");
        let groups = GroupHierarchy::new(store.clone(), Authorizer::new(store));

        let a = groups.create(&root, new_group("a", None)).unwrap();
        let b = groups.create(&root, new_group("b", Some(&a.id))).unwrap();

        let result = groups.update(
            &root,
            &a.id,
            GroupUpdate {
                parent_id: Some(Some(b.id.clone())),
                ..GroupUpdate::default()
            },
        );
        assert!(matches!(result, Err(Error::BadRequest(_))));
        assert!(groups.get(&a.id).unwrap().parent_id.is_none());
    }

    #[test]
    fn test_membership_blocks_delete_and_requires_permission() {
        let store = store_with_role(&[PermissionName::MANAGE_GROUPS]);
        let manager = member(&*store, "manager", Some("role-1"));
        let plain = member(&*store, "plain", None);
        let groups = GroupHierarchy::new(store.clone(), Authorizer::new(store));

        assert!(matches!(
            groups.create(&plain, new_group("nope", None)),
            Err(Error::Forbidden(_))
        ));

        let team = groups.create(&manager, new_group("team", None)).unwrap();
        groups.add_member(&manager, &team.id, &plain.id).unwrap();
        groups.add_member(&manager, &team.id, &plain.id).unwrap();
        assert!(matches!(
            groups.add_member(&manager, &team.id, "ghost"),
            Err(Error::NotFound("user"))
        ));

        assert!(matches!(
            groups.delete(&manager, &team.id),
            Err(Error::Conflict(_))
        ));
        groups.remove_member(&manager, &team.id, &plain.id).unwrap();
        groups.remove_member(&manager, &team.id, &plain.id).unwrap();
        groups.delete(&manager, &team.id).unwrap();
    }
}
