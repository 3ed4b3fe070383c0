use crate::{
    error::{EngineError, ErrorCode},
    linkage::{FighterId, LinkageTable, ShadowSync},
    roster::{Costume, Project},
};
use rosterforge_protocol::{
    CommandResponse, CostumeEntry, CostumeIdentity, PROTOCOL_VERSION, ReorderedIndices,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub type OpId = String;
pub type RunId = String;

pub const SAME_INDEX_MESSAGE: &str = "Indices are the same, no reordering needed";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertPosition {
    #[default]
    End,
    At(usize),
}

/// One costume mutation. `fighter` is a roster index or a fighter name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    InsertCostume {
        fighter: String,
        #[serde(default)]
        position: InsertPosition,
        costume: Costume,
    },
    RemoveCostume {
        fighter: String,
        index: usize,
    },
    ReorderCostume {
        fighter: String,
        from_index: usize,
        to_index: usize,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::InsertCostume { .. } => "InsertCostume",
            Self::RemoveCostume { .. } => "RemoveCostume",
            Self::ReorderCostume { .. } => "ReorderCostume",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub run_id: RunId,
    pub ops: Vec<Operation>,
}

/// A sequence that receives the same swap as the primary costume list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapTarget {
    Costumes(FighterId),
    Shadows(FighterId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpOutcome {
    Inserted {
        costume: CostumeIdentity,
        costume_count: usize,
    },
    Removed {
        costume: CostumeIdentity,
        remaining_costumes: usize,
    },
    Reordered {
        from_index: usize,
        to_index: usize,
        costumes: Vec<CostumeEntry>,
        propagated: Vec<SwapTarget>,
        skipped: Vec<SwapTarget>,
    },
    Unchanged {
        costumes: Vec<CostumeEntry>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpResult {
    pub op_id: OpId,
    pub fighter: String,
    pub fighter_internal_id: FighterId,
    pub changed: bool,
    pub outcome: OpOutcome,
    pub messages: Vec<String>,
}

impl OpResult {
    pub fn response(&self) -> CommandResponse {
        let mut response =
            CommandResponse::ok().with_fighter(&self.fighter, self.fighter_internal_id);
        match &self.outcome {
            OpOutcome::Inserted {
                costume,
                costume_count,
            } => {
                response.inserted_costume = Some(costume.clone());
                response.costume_count = Some(*costume_count);
            }
            OpOutcome::Removed {
                costume,
                remaining_costumes,
            } => {
                response.removed_costume = Some(costume.clone());
                response.remaining_costumes = Some(*remaining_costumes);
            }
            OpOutcome::Reordered {
                from_index,
                to_index,
                costumes,
                ..
            } => {
                response.reordered = Some(ReorderedIndices {
                    from_index: *from_index,
                    to_index: *to_index,
                });
                response.costumes = Some(costumes.clone());
            }
            OpOutcome::Unchanged { .. } => {
                response.message = Some(SAME_INDEX_MESSAGE.to_string());
            }
        }
        response
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    pub run_id: RunId,
    pub op: Operation,
    pub result: OpResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capabilities {
    pub protocol_version: String,
    pub supported_operations: Vec<String>,
    pub transactional_workflows: bool,
    pub deterministic_operation_log: bool,
}

pub trait Engine {
    fn apply(&mut self, op: Operation) -> Result<OpResult, EngineError>;
    fn apply_workflow(&mut self, wf: Workflow) -> Result<Vec<OpResult>, EngineError>;
}

fn swap_in_bounds<T>(seq: &mut [T], i: usize, j: usize) -> bool {
    if i < seq.len() && j < seq.len() {
        seq.swap(i, j);
        true
    } else {
        false
    }
}

#[derive(Debug, Clone)]
pub struct RosterEngine {
    project: Project,
    linkage: LinkageTable,
    journal: Vec<OperationRecord>,
    op_counter: u64,
}

impl RosterEngine {
    pub fn new(project: Project) -> Self {
        Self::with_linkage(project, LinkageTable::builtin().clone())
    }

    pub fn with_linkage(project: Project, linkage: LinkageTable) -> Self {
        Self {
            project,
            linkage,
            journal: vec![],
            op_counter: 0,
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn linkage(&self) -> &LinkageTable {
        &self.linkage
    }

    pub fn capabilities() -> Capabilities {
        Capabilities {
            protocol_version: PROTOCOL_VERSION.to_string(),
            supported_operations: vec![
                "InsertCostume".to_string(),
                "RemoveCostume".to_string(),
                "ReorderCostume".to_string(),
            ],
            transactional_workflows: true,
            deterministic_operation_log: true,
        }
    }

    pub fn operation_log(&self) -> &[OperationRecord] {
        &self.journal
    }

    fn next_op_id(&mut self) -> OpId {
        self.op_counter += 1;
        format!("op-{}", self.op_counter)
    }

    /// Sequences a swap on `fighter` reaches, the fighter's own costumes first.
    fn swap_targets(&self, fighter: FighterId) -> Vec<SwapTarget> {
        let mut targets = vec![SwapTarget::Costumes(fighter)];
        match self.linkage.shadow_sync(fighter) {
            ShadowSync::None => {}
            ShadowSync::Own => targets.push(SwapTarget::Shadows(fighter)),
            ShadowSync::Roster => targets.extend(
                self.project
                    .fighters()
                    .iter()
                    .filter(|f| f.has_shadow_costumes())
                    .map(|f| SwapTarget::Shadows(f.internal_id())),
            ),
        }
        targets.extend(
            self.linkage
                .linked_followers(fighter)
                .iter()
                .map(|&id| SwapTarget::Costumes(id)),
        );
        targets
    }

    fn swap_target(&mut self, target: SwapTarget, i: usize, j: usize) -> bool {
        match target {
            SwapTarget::Costumes(id) => self
                .project
                .fighter_mut(id)
                .is_some_and(|f| swap_in_bounds(&mut f.costumes, i, j)),
            SwapTarget::Shadows(id) => self
                .project
                .fighter_mut(id)
                .and_then(|f| f.shadow_costumes.as_mut())
                .is_some_and(|s| swap_in_bounds(s, i, j)),
        }
    }

    fn insert_costume(
        &mut self,
        id: FighterId,
        position: InsertPosition,
        costume: Costume,
    ) -> Result<OpOutcome, EngineError> {
        let fighter = &mut self.project.fighters_mut()[id];
        let count = fighter.costumes.len();
        let index = match position {
            InsertPosition::End => count,
            InsertPosition::At(i) if i <= count => i,
            InsertPosition::At(i) => {
                return Err(EngineError::new(
                    ErrorCode::OutOfRange,
                    format!("Insert index out of range: {i} (fighter has {count} costumes)"),
                ));
            }
        };
        let identity = costume.identity(index);
        fighter.costumes.insert(index, costume);
        debug!(fighter = id, index, "inserted costume");
        Ok(OpOutcome::Inserted {
            costume: identity,
            costume_count: fighter.costumes.len(),
        })
    }

    fn remove_costume(&mut self, id: FighterId, index: usize) -> Result<OpOutcome, EngineError> {
        self.project.validate_index(id, "Costume index", index)?;
        let fighter = &mut self.project.fighters_mut()[id];
        let removed = fighter.costumes.remove(index);
        debug!(fighter = id, index, name = %removed.name, "removed costume");
        Ok(OpOutcome::Removed {
            costume: removed.identity(index),
            remaining_costumes: fighter.costumes.len(),
        })
    }

    fn reorder_costume(
        &mut self,
        id: FighterId,
        from_index: usize,
        to_index: usize,
    ) -> Result<OpOutcome, EngineError> {
        self.project.validate_index(id, "From index", from_index)?;
        self.project.validate_index(id, "To index", to_index)?;
        if from_index == to_index {
            return Ok(OpOutcome::Unchanged {
                costumes: self.project.fighters()[id].costume_entries(),
            });
        }

        let mut propagated = vec![];
        let mut skipped = vec![];
        for target in self.swap_targets(id) {
            if self.swap_target(target, from_index, to_index) {
                if target != SwapTarget::Costumes(id) {
                    propagated.push(target);
                }
            } else {
                debug!(?target, from_index, to_index, "swap target out of range, skipped");
                skipped.push(target);
            }
        }
        debug!(fighter = id, from_index, to_index, ?propagated, "reordered costumes");
        Ok(OpOutcome::Reordered {
            from_index,
            to_index,
            costumes: self.project.fighters()[id].costume_entries(),
            propagated,
            skipped,
        })
    }

    fn apply_internal(&mut self, op: Operation) -> Result<OpResult, EngineError> {
        let (id, outcome) = match op {
            Operation::InsertCostume {
                fighter,
                position,
                costume,
            } => {
                let id = self.project.resolve_fighter_id(&fighter)?;
                (id, self.insert_costume(id, position, costume)?)
            }
            Operation::RemoveCostume { fighter, index } => {
                let id = self.project.resolve_fighter_id(&fighter)?;
                (id, self.remove_costume(id, index)?)
            }
            Operation::ReorderCostume {
                fighter,
                from_index,
                to_index,
            } => {
                let id = self.project.resolve_fighter_id(&fighter)?;
                (id, self.reorder_costume(id, from_index, to_index)?)
            }
        };
        let fighter = &self.project.fighters()[id];
        let name = fighter.name.clone();
        let mut messages = vec![];
        match &outcome {
            OpOutcome::Inserted { costume, .. } => messages.push(format!(
                "Inserted costume '{}' for '{name}' at index {}",
                costume.name, costume.index
            )),
            OpOutcome::Removed { costume, .. } => messages.push(format!(
                "Removed costume '{}' from '{name}' at index {}",
                costume.name, costume.index
            )),
            OpOutcome::Reordered {
                from_index,
                to_index,
                propagated,
                ..
            } => {
                messages.push(format!(
                    "Swapped costumes {from_index} and {to_index} for '{name}'"
                ));
                if !propagated.is_empty() {
                    messages.push(format!(
                        "Mirrored swap into {} linked sequence(s)",
                        propagated.len()
                    ));
                }
            }
            OpOutcome::Unchanged { .. } => messages.push(SAME_INDEX_MESSAGE.to_string()),
        }
        let changed = !matches!(outcome, OpOutcome::Unchanged { .. });
        Ok(OpResult {
            op_id: self.next_op_id(),
            fighter: name,
            fighter_internal_id: id,
            changed,
            outcome,
            messages,
        })
    }
}

impl Engine for RosterEngine {
    fn apply(&mut self, op: Operation) -> Result<OpResult, EngineError> {
        let run_id = "interactive".to_string();
        let result = self.apply_internal(op.clone())?;
        self.journal.push(OperationRecord {
            run_id,
            op,
            result: result.clone(),
        });
        Ok(result)
    }

    /// All-or-nothing: a failing step restores the project to its state
    /// before the workflow and journals nothing.
    fn apply_workflow(&mut self, wf: Workflow) -> Result<Vec<OpResult>, EngineError> {
        let saved_project = self.project.clone();
        let saved_counter = self.op_counter;
        let mut records = Vec::with_capacity(wf.ops.len());
        for (step, op) in wf.ops.iter().enumerate() {
            match self.apply_internal(op.clone()) {
                Ok(result) => records.push(OperationRecord {
                    run_id: wf.run_id.clone(),
                    op: op.clone(),
                    result,
                }),
                Err(e) => {
                    self.project = saved_project;
                    self.op_counter = saved_counter;
                    debug!(run_id = %wf.run_id, step, "workflow rolled back");
                    return Err(EngineError::new(
                        e.code,
                        format!("Workflow '{}' step {}: {}", wf.run_id, step + 1, e.message),
                    ));
                }
            }
        }
        let results = records.iter().map(|r| r.result.clone()).collect();
        self.journal.extend(records);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::{
        Fighter,
        tests::{costumes, sample_project},
    };

    fn names(project: &Project, id: FighterId) -> Vec<String> {
        project.fighters()[id]
            .costumes
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    fn shadow_names(project: &Project, id: FighterId) -> Vec<String> {
        project.fighters()[id]
            .shadow_costumes
            .as_ref()
            .map(|s| s.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    }

    fn reorder(fighter: &str, from_index: usize, to_index: usize) -> Operation {
        Operation::ReorderCostume {
            fighter: fighter.to_string(),
            from_index,
            to_index,
        }
    }

    fn remove(fighter: &str, index: usize) -> Operation {
        Operation::RemoveCostume {
            fighter: fighter.to_string(),
            index,
        }
    }

    #[test]
    fn test_falcon_reorder_then_remove() {
        let mut engine = RosterEngine::new(sample_project());
        let res = engine.apply(reorder("Falcon", 0, 2)).unwrap();
        assert_eq!(names(engine.project(), 0), vec!["C", "B", "A"]);
        match &res.outcome {
            OpOutcome::Reordered { costumes, .. } => {
                let listed: Vec<&str> = costumes.iter().map(|c| c.name.as_str()).collect();
                assert_eq!(listed, vec!["C", "B", "A"]);
                assert_eq!(costumes[0].file_name, "c.dat");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        let res = engine.apply(remove("falcon", 1)).unwrap();
        assert_eq!(names(engine.project(), 0), vec!["C", "A"]);
        match res.outcome {
            OpOutcome::Removed {
                costume,
                remaining_costumes,
            } => {
                assert_eq!(costume.name, "B");
                assert_eq!(costume.file_name, "b.dat");
                assert_eq!(costume.index, 1);
                assert_eq!(remaining_costumes, 2);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(res.fighter, "Falcon");
        assert_eq!(res.fighter_internal_id, 0);
    }

    #[test]
    fn test_remove_shifts_later_elements_down() {
        let mut engine = RosterEngine::new(sample_project());
        engine.apply(remove("Popo", 1)).unwrap();
        assert_eq!(names(engine.project(), 9), vec!["P0", "P2", "P3"]);
        engine.apply(remove("9", 2)).unwrap();
        assert_eq!(names(engine.project(), 9), vec!["P0", "P2"]);
    }

    #[test]
    fn test_remove_does_not_propagate() {
        let mut engine = RosterEngine::new(sample_project());
        engine.apply(remove("Kirby", 0)).unwrap();
        engine.apply(remove("Popo", 0)).unwrap();
        assert_eq!(shadow_names(engine.project(), 4), vec!["KHat0", "KHat1"]);
        assert_eq!(names(engine.project(), 11), vec!["N0", "N1", "N2"]);
    }

    #[test]
    fn test_remove_out_of_range_leaves_state_unchanged() {
        let before = sample_project();
        let mut engine = RosterEngine::new(before.clone());
        let err = engine.apply(remove("Falcon", 3)).unwrap_err();
        assert_eq!(err.code, ErrorCode::OutOfRange);
        assert_eq!(err.message, "Costume index out of range: 3 (fighter has 3 costumes)");
        assert_eq!(engine.project(), &before);
        assert!(engine.operation_log().is_empty());
    }

    #[test]
    fn test_reorder_same_index_is_noop() {
        let before = sample_project();
        let mut engine = RosterEngine::new(before.clone());
        let res = engine.apply(reorder("Kirby", 1, 1)).unwrap();
        assert!(!res.changed);
        assert_eq!(engine.project(), &before);
        assert_eq!(res.response().message.as_deref(), Some(SAME_INDEX_MESSAGE));
    }

    #[test]
    fn test_reorder_twice_round_trips_everything() {
        let before = sample_project();
        let mut engine = RosterEngine::new(before.clone());
        for fighter in ["Falcon", "Kirby", "Popo", "Nana"] {
            engine.apply(reorder(fighter, 0, 1)).unwrap();
            engine.apply(reorder(fighter, 0, 1)).unwrap();
            assert_eq!(engine.project(), &before, "round trip for {fighter}");
        }
        engine.apply(reorder("Popo", 3, 0)).unwrap();
        engine.apply(reorder("Popo", 3, 0)).unwrap();
        assert_eq!(engine.project(), &before);
    }

    #[test]
    fn test_copy_ability_reorder_swaps_roster_shadows_in_range() {
        let mut engine = RosterEngine::new(sample_project());
        let res = engine.apply(reorder("Kirby", 0, 1)).unwrap();
        assert_eq!(names(engine.project(), 4), vec!["K1", "K0", "K2", "K3"]);
        assert_eq!(shadow_names(engine.project(), 4), vec!["KHat1", "KHat0"]);
        assert_eq!(
            shadow_names(engine.project(), 2),
            vec!["FoxHat1", "FoxHat0", "FoxHat2"]
        );
        match res.outcome {
            OpOutcome::Reordered {
                propagated,
                skipped,
                ..
            } => {
                assert_eq!(
                    propagated,
                    vec![SwapTarget::Shadows(2), SwapTarget::Shadows(4)]
                );
                assert!(skipped.is_empty());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_copy_ability_reorder_skips_short_shadows() {
        let mut engine = RosterEngine::new(sample_project());
        let res = engine.apply(reorder("Kirby", 0, 2)).unwrap();
        assert_eq!(names(engine.project(), 4), vec!["K2", "K1", "K0", "K3"]);
        assert_eq!(shadow_names(engine.project(), 4), vec!["KHat0", "KHat1"]);
        assert_eq!(
            shadow_names(engine.project(), 2),
            vec!["FoxHat2", "FoxHat1", "FoxHat0"]
        );
        match res.outcome {
            OpOutcome::Reordered { skipped, .. } => {
                assert_eq!(skipped, vec![SwapTarget::Shadows(4)]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_shadow_fighter_without_sync_keeps_own_shadows() {
        let mut engine = RosterEngine::new(sample_project());
        engine.apply(reorder("Fox", 0, 1)).unwrap();
        assert_eq!(names(engine.project(), 2), vec!["F1", "F0"]);
        assert_eq!(
            shadow_names(engine.project(), 2),
            vec!["FoxHat0", "FoxHat1", "FoxHat2"]
        );
    }

    #[test]
    fn test_own_scope_only_touches_own_shadows() {
        let linkage = LinkageTable::empty().with_shadow_sync(2, ShadowSync::Own);
        let mut engine = RosterEngine::with_linkage(sample_project(), linkage);
        engine.apply(reorder("Fox", 0, 1)).unwrap();
        assert_eq!(
            shadow_names(engine.project(), 2),
            vec!["FoxHat1", "FoxHat0", "FoxHat2"]
        );
        assert_eq!(shadow_names(engine.project(), 4), vec!["KHat0", "KHat1"]);
    }

    #[test]
    fn test_paired_reorder_propagates_both_ways() {
        let mut engine = RosterEngine::new(sample_project());
        engine.apply(reorder("Popo", 0, 2)).unwrap();
        assert_eq!(names(engine.project(), 9), vec!["P2", "P1", "P0", "P3"]);
        assert_eq!(names(engine.project(), 11), vec!["N2", "N1", "N0"]);

        engine.apply(reorder("11", 1, 2)).unwrap();
        assert_eq!(names(engine.project(), 11), vec!["N2", "N0", "N1"]);
        assert_eq!(names(engine.project(), 9), vec!["P2", "P0", "P1", "P3"]);
    }

    #[test]
    fn test_paired_reorder_skips_partner_out_of_range() {
        let mut engine = RosterEngine::new(sample_project());
        let res = engine.apply(reorder("Popo", 1, 3)).unwrap();
        assert_eq!(names(engine.project(), 9), vec!["P0", "P3", "P2", "P1"]);
        assert_eq!(names(engine.project(), 11), vec!["N0", "N1", "N2"]);
        match res.outcome {
            OpOutcome::Reordered {
                propagated,
                skipped,
                ..
            } => {
                assert!(propagated.is_empty());
                assert_eq!(skipped, vec![SwapTarget::Costumes(11)]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_follower_missing_from_roster_is_skipped() {
        let project = Project::from_fighters(vec![
            Fighter::new("Solo").with_costumes(costumes(&["S0", "S1"])),
        ]);
        let linkage = LinkageTable::empty().with_pair(0, 5);
        let mut engine = RosterEngine::with_linkage(project, linkage);
        engine.apply(reorder("Solo", 0, 1)).unwrap();
        assert_eq!(names(engine.project(), 0), vec!["S1", "S0"]);
    }

    #[test]
    fn test_reorder_out_of_range_leaves_linked_state_unchanged() {
        let before = sample_project();
        let mut engine = RosterEngine::new(before.clone());
        let err = engine.apply(reorder("Kirby", 0, 4)).unwrap_err();
        assert_eq!(err.code, ErrorCode::OutOfRange);
        assert!(err.message.starts_with("To index out of range: 4"));
        let err = engine.apply(reorder("Popo", 9, 0)).unwrap_err();
        assert!(err.message.starts_with("From index out of range: 9"));
        assert_eq!(engine.project(), &before);
    }

    #[test]
    fn test_unknown_fighter_is_not_found() {
        let before = sample_project();
        let mut engine = RosterEngine::new(before.clone());
        let err = engine.apply(reorder("Waluigi", 0, 1)).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(engine.project(), &before);
    }

    #[test]
    fn test_reorder_preserves_color_smash_groups() {
        let mut project = sample_project();
        project.fighters_mut()[0].costumes[0].color_smash_group = Some(7);
        let mut engine = RosterEngine::new(project);
        engine.apply(reorder("Falcon", 0, 2)).unwrap();
        engine.apply(remove("Falcon", 0)).unwrap();
        let costumes = &engine.project().fighters()[0].costumes;
        assert_eq!(costumes[1].name, "A");
        assert_eq!(costumes[1].color_smash_group, Some(7));
    }

    #[test]
    fn test_insert_appends_and_inserts() {
        let mut engine = RosterEngine::new(sample_project());
        let res = engine
            .apply(Operation::InsertCostume {
                fighter: "Falcon".to_string(),
                position: InsertPosition::End,
                costume: Costume::new("D", "d.dat"),
            })
            .unwrap();
        assert_eq!(names(engine.project(), 0), vec!["A", "B", "C", "D"]);
        match res.outcome {
            OpOutcome::Inserted {
                costume,
                costume_count,
            } => {
                assert_eq!(costume.index, 3);
                assert_eq!(costume_count, 4);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        engine
            .apply(Operation::InsertCostume {
                fighter: "Popo".to_string(),
                position: InsertPosition::At(0),
                costume: Costume::new("PNew", "pnew.dat"),
            })
            .unwrap();
        assert_eq!(names(engine.project(), 9)[0], "PNew");
        assert_eq!(names(engine.project(), 11), vec!["N0", "N1", "N2"]);
    }

    #[test]
    fn test_insert_past_end_is_out_of_range() {
        let before = sample_project();
        let mut engine = RosterEngine::new(before.clone());
        let err = engine
            .apply(Operation::InsertCostume {
                fighter: "Falcon".to_string(),
                position: InsertPosition::At(4),
                costume: Costume::new("D", "d.dat"),
            })
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::OutOfRange);
        assert_eq!(engine.project(), &before);
    }

    #[test]
    fn test_operation_log_assigns_sequential_ids() {
        let mut engine = RosterEngine::new(sample_project());
        let first = engine.apply(reorder("Falcon", 0, 1)).unwrap();
        let _ = engine.apply(remove("Falcon", 99));
        let second = engine.apply(remove("Falcon", 0)).unwrap();
        assert_eq!(first.op_id, "op-1");
        assert_eq!(second.op_id, "op-2");
        assert_eq!(engine.operation_log().len(), 2);
        assert_eq!(engine.operation_log()[1].op.name(), "RemoveCostume");
    }

    #[test]
    fn test_workflow_applies_all_steps() {
        let mut engine = RosterEngine::new(sample_project());
        let results = engine
            .apply_workflow(Workflow {
                run_id: "batch".to_string(),
                ops: vec![reorder("Falcon", 0, 2), remove("Falcon", 1)],
            })
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(names(engine.project(), 0), vec!["C", "A"]);
        assert!(engine.operation_log().iter().all(|r| r.run_id == "batch"));
    }

    #[test]
    fn test_workflow_failure_rolls_back() {
        let before = sample_project();
        let mut engine = RosterEngine::new(before.clone());
        let err = engine
            .apply_workflow(Workflow {
                run_id: "batch".to_string(),
                ops: vec![reorder("Popo", 0, 1), remove("Falcon", 5)],
            })
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::OutOfRange);
        assert!(err.message.starts_with("Workflow 'batch' step 2:"));
        assert_eq!(engine.project(), &before);
        assert!(engine.operation_log().is_empty());
        let next = engine.apply(remove("Falcon", 0)).unwrap();
        assert_eq!(next.op_id, "op-1");
    }

    #[test]
    fn test_operation_json_round_trip_shape() {
        let op: Operation = serde_json::from_str(
            r#"{ "ReorderCostume": { "fighter": "Falcon", "from_index": 0, "to_index": 2 } }"#,
        )
        .unwrap();
        assert_eq!(op, reorder("Falcon", 0, 2));
        let op: Operation = serde_json::from_str(
            r#"{ "InsertCostume": { "fighter": "0", "costume": { "name": "D", "asset_file": "d.dat" } } }"#,
        )
        .unwrap();
        match op {
            Operation::InsertCostume { position, .. } => assert_eq!(position, InsertPosition::End),
            other => panic!("unexpected op: {other:?}"),
        }
    }

    #[test]
    fn test_reorder_response_lists_costumes() {
        let mut engine = RosterEngine::new(sample_project());
        let response = engine.apply(reorder("Falcon", 0, 2)).unwrap().response();
        assert!(response.success);
        assert_eq!(response.fighter.as_deref(), Some("Falcon"));
        assert_eq!(response.fighter_internal_id, Some(0));
        assert_eq!(
            response.reordered,
            Some(ReorderedIndices {
                from_index: 0,
                to_index: 2
            })
        );
        assert_eq!(response.costumes.map(|c| c.len()), Some(3));
    }
}
