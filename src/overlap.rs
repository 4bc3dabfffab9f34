use crate::entity::{Entity, EntityKind};
use crate::resolver::AttributeIndex;
use crate::store::EntityStore;
use log::info;
use rayon::prelude::*;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverlapReport {
    pub kind: EntityKind,
    pub left: usize,
    pub right: usize,
    /// Number of `(left, right)` pairs that denote the same entity.
    pub pairs: usize,
}

impl fmt::Display for OverlapReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} left, {} right, {} overlapping pairs", self.kind, self.left, self.right, self.pairs)
    }
}

/// Count overlapping pairs of `kind` between two stores. Pairs, not entities: one left
/// entity overlapping two right entities counts twice.
pub fn count_overlap(left: &EntityStore, right: &EntityStore, kind: EntityKind) -> OverlapReport {
    let index = AttributeIndex::build(right);
    let lefts: Vec<&Entity> = left.of_kind(kind).map(|(_, e)| e).collect();
    let pairs: usize = lefts
        .par_iter()
        .map(|entity| {
            index
                .candidates(entity)
                .into_iter()
                .filter(|id| right.get(*id).is_some_and(|candidate| candidate.kind() == kind && candidate.same_entity(entity)))
                .count()
        })
        .sum();
    let report = OverlapReport {
        kind,
        left: lefts.len(),
        right: right.count_of_kind(kind),
        pairs,
    };
    info!("{}", report);
    report
}

/// Compound and disease overlap, the two kinds shared by every source.
pub fn overlap_report(left: &EntityStore, right: &EntityStore) -> Vec<OverlapReport> {
    [EntityKind::Compound, EntityKind::Disease].into_iter().map(|kind| count_overlap(left, right, kind)).collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entity::AltIdNamespace;

    #[test]
    fn pairs_are_counted_per_kind() {
        let mut aspirin = Entity::new("D001241", "Aspirin", EntityKind::Compound, "CTD");
        aspirin.extend_alt_ids(AltIdNamespace::DrugBank, ["DB00945"]);
        let left: EntityStore = vec![
            Entity::new("DB00945", "Aspirin", EntityKind::Compound, "het.io"),
            Entity::new("DB00201", "Caffeine", EntityKind::Compound, "het.io"),
            Entity::new("DOID:0060001", "Headache", EntityKind::Disease, "het.io"),
        ]
        .into_iter()
        .collect();
        let right: EntityStore = vec![
            aspirin,
            Entity::new("DB00945", "ASA", EntityKind::Compound, "RepoDB"),
            Entity::new("DB00945", "Aspirin", EntityKind::Disease, "RepoDB"),
            Entity::new("C0018681", "Headache", EntityKind::Disease, "RepoDB"),
        ]
        .into_iter()
        .collect();

        let reports = overlap_report(&left, &right);
        assert_eq!(reports[0], OverlapReport { kind: EntityKind::Compound, left: 2, right: 2, pairs: 2 });
        assert_eq!(reports[1], OverlapReport { kind: EntityKind::Disease, left: 1, right: 2, pairs: 0 });
    }
}
