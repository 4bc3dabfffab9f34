pub mod obo;
pub mod umls;

use crate::entity::{AltIdNamespace, EntityKind};
use crate::store::EntityStore;
use log::{debug, info};

/// Read-only `(code, namespace) → concept ids` lookup over an external vocabulary.
pub trait CrossReferenceVocabulary {
    fn lookup(&self, code: &str, namespace: &str) -> Vec<String>;
}

/// Which of an entity's codes a rule looks up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XrefKey {
    Identifier,
    AltIds(AltIdNamespace),
}

/// Look up `key` codes under `namespace` and store the hits as `target` alt-ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct XrefRule {
    pub key: XrefKey,
    pub namespace: &'static str,
    pub target: AltIdNamespace,
}

impl XrefRule {
    pub const fn new(key: XrefKey, namespace: &'static str, target: AltIdNamespace) -> Self {
        XrefRule { key, namespace, target }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    pub matched: usize,
    pub unmatched: usize,
}

/// Attach vocabulary hits to every entity of `kind`. Entities without any hit are only counted.
pub fn enrich<V>(store: &mut EntityStore, kind: EntityKind, vocabulary: &V, rules: &[XrefRule]) -> EnrichmentReport
where
    V: CrossReferenceVocabulary + ?Sized,
{
    let ids: Vec<_> = store.of_kind(kind).map(|(id, _)| id).collect();
    let mut report = EnrichmentReport::default();
    for id in ids {
        let Some(entity) = store.get_mut(id) else { continue };
        let hits: Vec<(AltIdNamespace, Vec<String>)> = rules
            .iter()
            .map(|rule| {
                let codes: Vec<String> = match rule.key {
                    XrefKey::Identifier => vec![entity.identifier().to_string()],
                    XrefKey::AltIds(ns) => entity.alt_ids(ns).map(str::to_string).collect(),
                };
                (rule.target, codes.iter().flat_map(|code| vocabulary.lookup(code, rule.namespace)).collect())
            })
            .collect();

        if hits.iter().all(|(_, found)| found.is_empty()) {
            debug!("no cross-references for {} ({})", entity.name(), entity.identifier());
            report.unmatched += 1;
            continue;
        }
        for (target, found) in hits {
            entity.extend_alt_ids(target, found);
        }
        report.matched += 1;
    }
    info!("{}: {}/{} entities without cross-references", kind, report.unmatched, report.matched + report.unmatched);
    report
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entity::Entity;
    use crate::store::EntityId;
    use std::collections::HashMap;

    struct Table(HashMap<(&'static str, &'static str), Vec<&'static str>>);

    impl CrossReferenceVocabulary for Table {
        fn lookup(&self, code: &str, namespace: &str) -> Vec<String> {
            self.0
                .iter()
                .filter(|((c, n), _)| *c == code && *n == namespace)
                .flat_map(|(_, ids)| ids.iter().map(|s| s.to_string()))
                .collect()
        }
    }

    #[test]
    fn enrich_attaches_hits_and_counts_misses() {
        let mut store: EntityStore = vec![
            Entity::new("D001241", "Aspirin", EntityKind::Compound, "CTD"),
            Entity::new("D002110", "Caffeine", EntityKind::Compound, "CTD"),
            Entity::new("D006261", "Headache", EntityKind::Disease, "CTD"),
        ]
        .into_iter()
        .collect();
        if let Some(e) = store.get_mut(EntityId(1)) {
            e.extend_alt_ids(AltIdNamespace::DrugBank, ["DB00201"]);
        }
        let table = Table(HashMap::from([
            (("D001241", "MSH"), vec!["C0004057"]),
            (("DB00201", "DRUGBANK"), vec!["C0006644"]),
            (("D006261", "MSH"), vec!["C0018681"]),
        ]));
        let rules = [
            XrefRule::new(XrefKey::Identifier, "MSH", AltIdNamespace::Umls),
            XrefRule::new(XrefKey::AltIds(AltIdNamespace::DrugBank), "DRUGBANK", AltIdNamespace::Umls),
        ];

        let report = enrich(&mut store, EntityKind::Compound, &table, &rules);
        assert_eq!(report, EnrichmentReport { matched: 2, unmatched: 0 });
        assert_eq!(store.get(EntityId(1)).unwrap().alt_ids(AltIdNamespace::Umls).collect::<Vec<_>>(), vec!["C0006644"]);
        assert_eq!(store.get(EntityId(2)).unwrap().alt_id_count(), 0);

        let report = enrich(&mut store, EntityKind::Disease, &table, &rules[1..]);
        assert_eq!(report, EnrichmentReport { matched: 0, unmatched: 1 });
    }
}
