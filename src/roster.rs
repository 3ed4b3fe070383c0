use crate::{
    error::EngineError,
    linkage::{FighterId, LinkageTable, ShadowSync},
};
use rosterforge_protocol::{CostumeEntry, CostumeIdentity};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const PROJECT_FORMAT_VERSION: u32 = 1;
pub const DEFAULT_ASSET_DIR: &str = "files";

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Costume {
    pub name: String,
    pub asset_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_smash_group: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl Costume {
    pub fn new(name: &str, asset_file: &str) -> Self {
        Self {
            name: name.to_string(),
            asset_file: asset_file.to_string(),
            color_smash_group: None,
            csp: None,
            icon: None,
        }
    }

    pub fn has_csp(&self) -> bool {
        non_empty(&self.csp)
    }

    pub fn has_icon(&self) -> bool {
        non_empty(&self.icon)
    }

    pub fn identity(&self, index: usize) -> CostumeIdentity {
        CostumeIdentity {
            index,
            name: self.name.clone(),
            file_name: self.asset_file.clone(),
        }
    }

    pub fn entry(&self, index: usize) -> CostumeEntry {
        CostumeEntry {
            index,
            name: self.name.clone(),
            file_name: self.asset_file.clone(),
            color_smash_group: self.color_smash_group,
            has_csp: self.has_csp(),
            has_icon: self.has_icon(),
            csp: self.csp.clone(),
            icon: self.icon.clone(),
        }
    }
}

/// Palette-swap companion record kept alongside a fighter's costumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowCostume {
    pub name: String,
    pub asset_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csp: Option<String>,
}

impl ShadowCostume {
    pub fn new(name: &str, asset_file: &str) -> Self {
        Self {
            name: name.to_string(),
            asset_file: asset_file.to_string(),
            csp: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fighter {
    pub name: String,
    #[serde(skip)]
    internal_id: FighterId,
    #[serde(default)]
    pub costumes: Vec<Costume>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow_costumes: Option<Vec<ShadowCostume>>,
}

impl Fighter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            internal_id: 0,
            costumes: vec![],
            shadow_costumes: None,
        }
    }

    pub fn with_costumes(mut self, costumes: Vec<Costume>) -> Self {
        self.costumes = costumes;
        self
    }

    pub fn with_shadow_costumes(mut self, shadows: Vec<ShadowCostume>) -> Self {
        self.shadow_costumes = Some(shadows);
        self
    }

    pub fn internal_id(&self) -> FighterId {
        self.internal_id
    }

    pub fn costume_count(&self) -> usize {
        self.costumes.len()
    }

    pub fn has_shadow_costumes(&self) -> bool {
        self.shadow_costumes.is_some()
    }

    pub fn shadow_count(&self) -> usize {
        self.shadow_costumes.as_ref().map_or(0, |s| s.len())
    }

    pub fn costume_entries(&self) -> Vec<CostumeEntry> {
        self.costumes
            .iter()
            .enumerate()
            .map(|(i, c)| c.entry(i))
            .collect()
    }

    pub fn validate_index(&self, label: &str, index: usize) -> Result<(), EngineError> {
        if index < self.costumes.len() {
            Ok(())
        } else {
            Err(EngineError::out_of_range(label, index, self.costumes.len()))
        }
    }
}

/// On-disk shape of a project; converted into a [`Project`] so internal ids
/// are always assigned on load.
#[derive(Deserialize)]
pub struct ProjectFile {
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    #[serde(default = "default_asset_dir")]
    pub asset_dir: String,
    #[serde(default)]
    pub fighters: Vec<Fighter>,
}

fn default_format_version() -> u32 {
    PROJECT_FORMAT_VERSION
}

fn default_asset_dir() -> String {
    DEFAULT_ASSET_DIR.to_string()
}

impl From<ProjectFile> for Project {
    fn from(file: ProjectFile) -> Self {
        let mut project = Project::from_fighters(file.fighters);
        project.format_version = file.format_version;
        project.asset_dir = file.asset_dir;
        project
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "ProjectFile")]
pub struct Project {
    format_version: u32,
    asset_dir: String,
    fighters: Vec<Fighter>,
    #[serde(skip)]
    root: Option<PathBuf>,
}

/// Equality covers the saved content only; where the file was opened from
/// does not matter.
impl PartialEq for Project {
    fn eq(&self, other: &Self) -> bool {
        self.format_version == other.format_version
            && self.asset_dir == other.asset_dir
            && self.fighters == other.fighters
    }
}

impl Eq for Project {}

#[derive(Debug, Clone, Serialize)]
pub struct FighterSummary {
    pub internal_id: FighterId,
    pub name: String,
    pub costume_count: usize,
    pub shadow_count: Option<usize>,
    pub followers: Vec<FighterId>,
    pub shadow_sync: ShadowSync,
}

#[derive(Debug, Clone, Serialize)]
pub struct RosterSummary {
    pub fighter_count: usize,
    pub costume_count: usize,
    pub asset_dir: Option<String>,
    pub fighters: Vec<FighterSummary>,
}

impl Project {
    /// Builds a roster; each fighter's internal id is its position.
    pub fn from_fighters(mut fighters: Vec<Fighter>) -> Self {
        for (i, fighter) in fighters.iter_mut().enumerate() {
            fighter.internal_id = i;
        }
        Self {
            format_version: PROJECT_FORMAT_VERSION,
            asset_dir: DEFAULT_ASSET_DIR.to_string(),
            fighters,
            root: None,
        }
    }

    pub fn format_version(&self) -> u32 {
        self.format_version
    }

    pub fn fighters(&self) -> &[Fighter] {
        &self.fighters
    }

    /// Mutable access that cannot grow or shrink the roster.
    pub(crate) fn fighters_mut(&mut self) -> &mut [Fighter] {
        &mut self.fighters
    }

    pub fn fighter(&self, id: FighterId) -> Option<&Fighter> {
        self.fighters.get(id)
    }

    pub(crate) fn fighter_mut(&mut self, id: FighterId) -> Option<&mut Fighter> {
        self.fighters.get_mut(id)
    }

    pub(crate) fn set_root(&mut self, root: Option<PathBuf>) {
        self.root = root;
    }

    pub fn asset_dir(&self) -> Option<PathBuf> {
        self.root.as_ref().map(|r| r.join(&self.asset_dir))
    }

    pub fn asset_path(&self, costume: &Costume) -> Option<PathBuf> {
        self.asset_dir().map(|d| d.join(&costume.asset_file))
    }

    /// Resolves by roster index when the token is an in-range integer,
    /// otherwise by case-insensitive name (first match in roster order).
    pub fn resolve_fighter_id(&self, token: &str) -> Result<FighterId, EngineError> {
        let trimmed = token.trim();
        if let Ok(id) = trimmed.parse::<usize>() {
            if id < self.fighters.len() {
                return Ok(id);
            }
        }
        let wanted = trimmed.to_lowercase();
        self.fighters
            .iter()
            .position(|f| f.name.to_lowercase() == wanted)
            .ok_or_else(|| EngineError::not_found(format!("Fighter not found: {token}")))
    }

    pub fn resolve_fighter(&self, token: &str) -> Result<&Fighter, EngineError> {
        let id = self.resolve_fighter_id(token)?;
        Ok(&self.fighters[id])
    }

    pub fn validate_index(
        &self,
        fighter: FighterId,
        label: &str,
        index: usize,
    ) -> Result<(), EngineError> {
        self.fighter(fighter)
            .ok_or_else(|| EngineError::not_found(format!("Fighter not found: {fighter}")))?
            .validate_index(label, index)
    }

    pub fn costume_count(&self) -> usize {
        self.fighters.iter().map(|f| f.costumes.len()).sum()
    }

    pub fn summarize(&self, linkage: &LinkageTable) -> RosterSummary {
        RosterSummary {
            fighter_count: self.fighters.len(),
            costume_count: self.costume_count(),
            asset_dir: self.asset_dir().map(|d| d.display().to_string()),
            fighters: self
                .fighters
                .iter()
                .map(|f| FighterSummary {
                    internal_id: f.internal_id,
                    name: f.name.clone(),
                    costume_count: f.costumes.len(),
                    shadow_count: f.shadow_costumes.as_ref().map(|s| s.len()),
                    followers: linkage.linked_followers(f.internal_id).to_vec(),
                    shadow_sync: linkage.shadow_sync(f.internal_id),
                })
                .collect(),
        }
    }
}
