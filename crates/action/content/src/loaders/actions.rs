//! Action catalog loader.
//!
//! Loads [`ActionDef`] lists from RON data files. Each file holds a list of
//! definitions; a catalog is the ordered union of one or more files, with
//! names unique across all of them.

use std::path::Path;

use action_core::{
    ActionDef, ActionOwner, BehaviorRegistry, BindError, OwnerConfig, OwnerId, Role, Tag,
};

use crate::loaders::{LoadResult, read_file};

/// Ordered set of action definitions, keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionCatalog {
    defs: Vec<ActionDef>,
}

impl ActionCatalog {
    /// Loads the catalog embedded in this crate.
    pub fn builtin() -> LoadResult<Self> {
        let mut catalog = Self::default();

        // Sprint, Dash
        catalog.merge(Self::from_ron_str(
            include_str!("../../data/actions/movement.ron"),
            "movement.ron",
        )?)?;

        // PrimaryAttack, Blackhole
        catalog.merge(Self::from_ron_str(
            include_str!("../../data/actions/attack.ron"),
            "attack.ron",
        )?)?;

        // Stun
        catalog.merge(Self::from_ron_str(
            include_str!("../../data/actions/status.ron"),
            "status.ron",
        )?)?;

        Ok(catalog)
    }

    /// Load a catalog from a single RON file.
    pub fn load(path: &Path) -> LoadResult<Self> {
        let content = read_file(path)?;
        Self::from_ron_str(&content, &path.display().to_string())
    }

    /// Load every `*.ron` file in `dir`, in file name order.
    pub fn load_dir(dir: &Path) -> LoadResult<Self> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| anyhow::anyhow!("Failed to read directory {}: {}", dir.display(), e))?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "ron") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut catalog = Self::default();
        for path in &paths {
            catalog.merge(Self::load(path)?)?;
        }
        Ok(catalog)
    }

    /// Parse a RON list of definitions. `source` names the input in errors.
    pub fn from_ron_str(content: &str, source: &str) -> LoadResult<Self> {
        let defs: Vec<ActionDef> = ron::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", source, e))?;

        let mut catalog = Self::default();
        for def in defs {
            catalog
                .insert(def)
                .map_err(|e| anyhow::anyhow!("{} in {}", e, source))?;
        }
        Ok(catalog)
    }

    /// Adds a definition. Names must be unique.
    pub fn insert(&mut self, def: ActionDef) -> LoadResult<()> {
        anyhow::ensure!(
            self.get(&def.name).is_none(),
            "duplicate action `{}`",
            def.name
        );
        self.defs.push(def);
        Ok(())
    }

    /// Appends all definitions of `other`, rejecting name collisions.
    pub fn merge(&mut self, other: ActionCatalog) -> LoadResult<()> {
        for def in other.defs {
            self.insert(def)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &Tag) -> Option<&ActionDef> {
        self.defs.iter().find(|def| &def.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionDef> {
        self.defs.iter()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Instantiates every definition and binds them to a fresh owner.
    pub fn build_owner(
        &self,
        id: OwnerId,
        role: Role,
        config: OwnerConfig,
        registry: &BehaviorRegistry,
    ) -> Result<ActionOwner, BindError> {
        ActionOwner::from_defs(id, role, config, self.defs.iter().cloned(), registry)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use action_core::EntityRef;

    use super::*;

    fn tag(raw: &str) -> Tag {
        Tag::new(raw).unwrap()
    }

    #[test]
    fn test_builtin_catalog() {
        let catalog = ActionCatalog::builtin().expect("Failed to load builtin catalog");
        assert_eq!(catalog.len(), 5);

        let sprint = catalog.get(&tag("Action.Sprint")).unwrap();
        assert!(sprint.grants_tags.contains(&tag("Status.Sprinting")));
        assert!(sprint.blocked_tags.contains(&tag("Status.Stunned")));
        assert_eq!(sprint.behavior, None);
        assert_eq!(sprint.duration, None);

        let dash = catalog.get(&tag("Action.Dash")).unwrap();
        assert_eq!(dash.duration, Some(0.5));

        let blackhole = catalog.get(&tag("Action.Blackhole")).unwrap();
        assert_eq!(blackhole.behavior.as_deref(), Some(BehaviorRegistry::COOLDOWN));
        assert_eq!(blackhole.duration, Some(1.0));

        let stun = catalog.get(&tag("Action.Stun")).unwrap();
        assert!(stun.blocked_tags.is_empty());
    }

    #[test]
    fn builtin_catalog_builds_a_working_owner() {
        let catalog = ActionCatalog::builtin().unwrap();
        let mut owner = catalog
            .build_owner(
                OwnerId(1),
                Role::Authority,
                OwnerConfig::default(),
                &BehaviorRegistry::with_builtins(),
            )
            .unwrap();

        let player = EntityRef(1);
        assert!(owner.start_action_by_name(player, &tag("Action.Stun")));
        assert!(!owner.start_action_by_name(player, &tag("Action.Dash")));
        assert!(!owner.start_action_by_name(player, &tag("Action.Sprint")));
    }

    #[test]
    fn builtin_needs_cooldown_behavior() {
        let catalog = ActionCatalog::builtin().unwrap();
        let err = catalog
            .build_owner(
                OwnerId(1),
                Role::Authority,
                OwnerConfig::default(),
                &BehaviorRegistry::new(),
            )
            .unwrap_err();
        assert!(matches!(err, BindError::UnknownBehavior { .. }));
    }

    #[test]
    fn load_dir_merges_files_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("b.ron"),
            r#"[(name: "Action.Block", grants_tags: ["Status.Blocking"])]"#,
        )
        .unwrap();
        fs::write(dir.path().join("a.ron"), r#"[(name: "Action.Roll")]"#).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let catalog = ActionCatalog::load_dir(dir.path()).unwrap();
        let names: Vec<_> = catalog.iter().map(|def| def.name.to_string()).collect();
        assert_eq!(names, vec!["Action.Roll", "Action.Block"]);
    }

    #[test]
    fn duplicate_names_across_files_fail() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.ron"), r#"[(name: "Action.Roll")]"#).unwrap();
        fs::write(dir.path().join("b.ron"), r#"[(name: "Action.Roll")]"#).unwrap();

        let err = ActionCatalog::load_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("duplicate action `Action.Roll`"));
    }

    #[test]
    fn malformed_tag_is_reported_with_source() {
        let err = ActionCatalog::from_ron_str(r#"[(name: "Action.")]"#, "broken.ron").unwrap_err();
        assert!(err.to_string().contains("broken.ron"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ActionCatalog::load(&dir.path().join("absent.ron")).is_err());
    }
}
