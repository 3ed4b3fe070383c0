use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::LazyLock};

pub type FighterId = usize;

/// Slot of the copy-ability fighter whose costume order drives every
/// fighter's shadow (copy hat) sequence.
pub const COPY_ABILITY_FIGHTER: FighterId = 4;
pub const CLIMBER_LEAD: FighterId = 9;
pub const CLIMBER_PARTNER: FighterId = 11;

static BUILTIN_LINKAGE: LazyLock<LinkageTable> = LazyLock::new(|| {
    LinkageTable::empty()
        .with_shadow_sync(COPY_ABILITY_FIGHTER, ShadowSync::Roster)
        .with_pair(CLIMBER_LEAD, CLIMBER_PARTNER)
});

/// Which shadow sequences receive a swap applied to a fighter's costumes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShadowSync {
    #[default]
    None,
    /// Only the fighter's own shadow sequence.
    Own,
    /// Every shadow sequence in the roster, the fighter's own included.
    Roster,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkageRule {
    pub followers: Vec<FighterId>,
    pub shadow_sync: ShadowSync,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkageTable {
    rules: BTreeMap<FighterId, LinkageRule>,
}

impl LinkageTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builtin() -> &'static LinkageTable {
        &BUILTIN_LINKAGE
    }

    /// Registers `a` and `b` as each other's followers.
    pub fn with_pair(mut self, a: FighterId, b: FighterId) -> Self {
        for (from, to) in [(a, b), (b, a)] {
            let rule = self.rules.entry(from).or_default();
            if !rule.followers.contains(&to) {
                rule.followers.push(to);
            }
        }
        self
    }

    pub fn with_shadow_sync(mut self, fighter: FighterId, scope: ShadowSync) -> Self {
        self.rules.entry(fighter).or_default().shadow_sync = scope;
        self
    }

    pub fn linked_followers(&self, fighter: FighterId) -> &[FighterId] {
        self.rules
            .get(&fighter)
            .map(|r| r.followers.as_slice())
            .unwrap_or(&[])
    }

    pub fn shadow_sync(&self, fighter: FighterId) -> ShadowSync {
        self.rules
            .get(&fighter)
            .map(|r| r.shadow_sync)
            .unwrap_or_default()
    }

    pub fn has_shadow_sync(&self, fighter: FighterId) -> bool {
        self.shadow_sync(fighter) != ShadowSync::None
    }

    /// Rejects tables that are not symmetric or that link a fighter to itself.
    pub fn validate(&self) -> Result<(), String> {
        for (&fighter, rule) in &self.rules {
            for (pos, &follower) in rule.followers.iter().enumerate() {
                if follower == fighter {
                    return Err(format!("Fighter {fighter} lists itself as a follower"));
                }
                if rule.followers[..pos].contains(&follower) {
                    return Err(format!(
                        "Fighter {fighter} lists follower {follower} more than once"
                    ));
                }
                if !self.linked_followers(follower).contains(&fighter) {
                    return Err(format!(
                        "Fighter {fighter} lists {follower} as a follower, but {follower} does not list {fighter}"
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn from_json_text(text: &str) -> Result<Self> {
        let table: LinkageTable =
            serde_json::from_str(text).map_err(|e| anyhow!("Malformed linkage table: {e}"))?;
        table
            .validate()
            .map_err(|e| anyhow!("Invalid linkage table: {e}"))?;
        Ok(table)
    }

    pub fn from_json_file(path: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Could not read linkage table '{path}': {e}"))?;
        Self::from_json_text(&text).map_err(|e| anyhow!("{e} ('{path}')"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_links_climbers_both_ways() {
        let table = LinkageTable::builtin();
        assert_eq!(table.linked_followers(CLIMBER_LEAD), &[CLIMBER_PARTNER]);
        assert_eq!(table.linked_followers(CLIMBER_PARTNER), &[CLIMBER_LEAD]);
        assert!(table.linked_followers(0).is_empty());
        assert!(table.validate().is_ok());
    }

    #[test]
    fn builtin_table_syncs_shadows_for_copy_ability_fighter_only() {
        let table = LinkageTable::builtin();
        assert!(table.has_shadow_sync(COPY_ABILITY_FIGHTER));
        assert_eq!(table.shadow_sync(COPY_ABILITY_FIGHTER), ShadowSync::Roster);
        assert!(!table.has_shadow_sync(CLIMBER_LEAD));
        assert_eq!(table.shadow_sync(30), ShadowSync::None);
    }

    #[test]
    fn with_pair_does_not_duplicate_followers() {
        let table = LinkageTable::empty().with_pair(1, 2).with_pair(2, 1);
        assert_eq!(table.linked_followers(1), &[2]);
        assert_eq!(table.linked_followers(2), &[1]);
    }

    #[test]
    fn validate_rejects_one_sided_links() {
        let text = r#"{ "rules": { "3": { "followers": [5] } } }"#;
        let err = LinkageTable::from_json_text(text).unwrap_err();
        assert!(err.to_string().contains("does not list 3"));
    }

    #[test]
    fn validate_rejects_self_links() {
        let text = r#"{ "rules": { "3": { "followers": [3] } } }"#;
        let err = LinkageTable::from_json_text(text).unwrap_err();
        assert!(err.to_string().contains("itself"));
    }

    #[test]
    fn table_loads_from_json_file() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("linkage.json");
        std::fs::write(
            &path,
            r#"{ "rules": {
                "2": { "followers": [7], "shadow_sync": "Own" },
                "7": { "followers": [2] }
            } }"#,
        )
        .unwrap();
        let table = LinkageTable::from_json_file(&path.to_string_lossy()).unwrap();
        assert_eq!(table.linked_followers(2), &[7]);
        assert_eq!(table.shadow_sync(2), ShadowSync::Own);
        assert_eq!(table.shadow_sync(7), ShadowSync::None);
    }
}
