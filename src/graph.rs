use crate::entity::{NaturalKey, Provenance};
use crate::error::{HetnetError, Result};
use crate::relation::{Relation, RelationSet};
use crate::resolver::Resolver;
use crate::store::{EntityId, EntityStore};
use log::info;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelationEdge {
    pub kind: String,
    pub sources: Provenance,
}

/// Directed multigraph of resolved entities. Nodes are keyed by natural key, parallel
/// edges by `(source, destination, kind)`.
#[derive(Debug)]
pub struct HetNetwork {
    graph: DiGraph<EntityId, RelationEdge>,
    by_entity: HashMap<EntityId, NodeIndex>,
}

impl HetNetwork {
    /// Build the network and check that every entity became one node and every relation one edge.
    ///
    /// Two entities sharing a natural key collapse onto one node, and relations between
    /// them collapse onto one edge; either case fails with a graph-invariant error.
    pub fn assemble(store: &EntityStore, relations: &[Relation]) -> Result<HetNetwork> {
        let mut graph = DiGraph::with_capacity(store.len(), relations.len());
        let mut node_index: HashMap<NaturalKey, NodeIndex> = HashMap::with_capacity(store.len());
        let mut by_entity = HashMap::with_capacity(store.len());

        for (id, entity) in store.iter() {
            let node = *node_index.entry(entity.natural_key()).or_insert_with(|| graph.add_node(id));
            by_entity.insert(id, node);
        }
        if graph.node_count() != store.len() {
            return Err(HetnetError::GraphInvariant {
                what: "nodes",
                expected: store.len(),
                actual: graph.node_count(),
            });
        }

        let mut edge_keys: HashSet<(NodeIndex, NodeIndex, &str)> = HashSet::with_capacity(relations.len());
        for relation in relations.iter() {
            let node = |id: EntityId| by_entity.get(&id).copied().ok_or(HetnetError::UnknownEntity(id.index()));
            let (source, destination) = (node(relation.source)?, node(relation.destination)?);
            if edge_keys.insert((source, destination, relation.kind.as_str())) {
                graph.add_edge(
                    source,
                    destination,
                    RelationEdge {
                        kind: relation.kind.clone(),
                        sources: relation.sources.clone(),
                    },
                );
            }
        }
        if graph.edge_count() != relations.len() {
            return Err(HetnetError::GraphInvariant {
                what: "edges",
                expected: relations.len(),
                actual: graph.edge_count(),
            });
        }

        info!("assembled network: {} nodes, {} edges", graph.node_count(), graph.edge_count());
        Ok(HetNetwork { graph, by_entity })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Outgoing `(destination, kind)` pairs of an entity.
    pub fn relations_from(&self, id: EntityId) -> Vec<(EntityId, &str)> {
        let Some(node) = self.by_entity.get(&id) else {
            return vec![];
        };
        self.graph
            .edges_directed(*node, Direction::Outgoing)
            .filter_map(|e| self.graph.node_weight(e.target()).map(|dst| (*dst, e.weight().kind.as_str())))
            .collect()
    }

    pub fn relations_to(&self, id: EntityId) -> Vec<(EntityId, &str)> {
        let Some(node) = self.by_entity.get(&id) else {
            return vec![];
        };
        self.graph
            .edges_directed(*node, Direction::Incoming)
            .filter_map(|e| self.graph.node_weight(e.source()).map(|src| (*src, e.weight().kind.as_str())))
            .collect()
    }

    pub fn kind_histogram(&self) -> BTreeMap<&str, usize> {
        let mut histogram = BTreeMap::new();
        for edge in self.graph.edge_weights() {
            *histogram.entry(edge.kind.as_str()).or_insert(0) += 1;
        }
        histogram
    }
}

/// Put several datasets into one store. With `cross_resolve` every later dataset is resolved
/// into the earlier ones first-match, otherwise stores are concatenated as they are. Relations
/// follow their endpoints; triples that become identical are dropped.
pub fn combine(datasets: Vec<(EntityStore, Vec<Relation>)>, cross_resolve: bool) -> Result<(EntityStore, Vec<Relation>)> {
    let mut store = EntityStore::new();
    let mut resolver = Resolver::indexed(&store);
    let mut relations = RelationSet::new();
    for (other, other_relations) in datasets {
        if cross_resolve {
            let mapping = resolver.absorb(&mut store, other);
            for relation in other_relations {
                let endpoint = |id: EntityId| mapping.get(id.index()).copied().ok_or(HetnetError::UnknownEntity(id.index()));
                let (source, destination) = (endpoint(relation.source)?, endpoint(relation.destination)?);
                relations.insert(Relation {
                    source,
                    destination,
                    ..relation
                });
            }
        } else {
            let offset = store.append(other);
            relations.extend(other_relations.into_iter().map(|r| r.remap(|id| id.offset(offset))));
        }
    }
    if cross_resolve {
        let report = resolver.report();
        info!("cross-resolution: {} entities inserted, {} merged", report.inserted, report.merged);
    }
    info!("combined {} entities and {} relations", store.len(), relations.len());
    Ok((store, relations.into_relations()))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entity::{Entity, EntityKind};
    use crate::relation::Direction as EdgeDirection;

    fn store() -> EntityStore {
        vec![
            Entity::new("DB01", "Aspirin", EntityKind::Compound, "het.io"),
            Entity::new("D01", "Headache", EntityKind::Disease, "het.io"),
            Entity::new("G01", "PTGS1", EntityKind::Gene, "het.io"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn counts_match_inputs() {
        let store = store();
        let mut relations = Relation::new(EntityId(0), EntityId(1), "treats", "het.io").expand(EdgeDirection::Both);
        relations.push(Relation::new(EntityId(0), EntityId(2), "binds", "het.io"));
        relations.push(Relation::new(EntityId(0), EntityId(2), "downregulates", "het.io"));
        let network = HetNetwork::assemble(&store, &relations).unwrap();
        assert_eq!(network.node_count(), store.len());
        assert_eq!(network.edge_count(), relations.len());
        assert_eq!(network.kind_histogram().get("treats_inv"), Some(&1));
    }

    #[test]
    fn both_direction_relation_is_traversable_both_ways() {
        let relations = Relation::new(EntityId(0), EntityId(1), "treats", "het.io").expand(EdgeDirection::Both);
        let network = HetNetwork::assemble(&store(), &relations).unwrap();
        assert_eq!(network.relations_from(EntityId(0)), vec![(EntityId(1), "treats")]);
        assert_eq!(network.relations_from(EntityId(1)), vec![(EntityId(0), "treats_inv")]);
        assert_eq!(network.relations_to(EntityId(1)), vec![(EntityId(0), "treats")]);
    }

    #[test]
    fn natural_key_collision_is_surfaced() {
        let mut store = store();
        store.insert(Entity::new("DB01", "Aspirin", EntityKind::Compound, "RepoDB"));
        let err = HetNetwork::assemble(&store, &[]).unwrap_err();
        assert!(matches!(err, HetnetError::GraphInvariant { what: "nodes", expected: 4, actual: 3 }));
    }

    #[test]
    fn relation_to_unknown_entity_fails() {
        let relations = vec![Relation::new(EntityId(0), EntityId(9), "treats", "het.io")];
        let err = HetNetwork::assemble(&store(), &relations).unwrap_err();
        assert!(matches!(err, HetnetError::UnknownEntity(9)));
    }

    #[test]
    fn repeated_triple_breaks_edge_invariant() {
        let relations = vec![
            Relation::new(EntityId(0), EntityId(1), "treats", "het.io"),
            Relation::new(EntityId(0), EntityId(1), "treats", "CTD"),
        ];
        let err = HetNetwork::assemble(&store(), &relations).unwrap_err();
        assert!(matches!(err, HetnetError::GraphInvariant { what: "edges", .. }));
    }

    #[test]
    fn cross_resolution_merges_shared_entities() {
        let hetio = (store(), vec![Relation::new(EntityId(0), EntityId(1), "treats", "het.io")]);
        let repodb: EntityStore = vec![
            Entity::new("DB01", "Aspirin", EntityKind::Compound, "RepoDB"),
            Entity::new("D01", "Headache", EntityKind::Disease, "RepoDB"),
            Entity::new("D02", "Fever", EntityKind::Disease, "RepoDB"),
        ]
        .into_iter()
        .collect();
        let repodb = (
            repodb,
            vec![
                Relation::new(EntityId(0), EntityId(1), "treats", "RepoDB"),
                Relation::new(EntityId(0), EntityId(2), "not_treats", "RepoDB"),
            ],
        );

        let (store, relations) = combine(vec![hetio.clone(), repodb.clone()], true).unwrap();
        assert_eq!(store.len(), 4);
        assert_eq!(relations.len(), 2);
        assert_eq!(relations[1].describe(&store), "Aspirin\tnot_treats\tFever");
        let aspirin = store.get(EntityId(0)).unwrap();
        assert_eq!(aspirin.sources().iter().collect::<Vec<_>>(), vec!["RepoDB", "het.io"]);
        let network = HetNetwork::assemble(&store, &relations).unwrap();
        assert_eq!(network.node_count(), 4);

        let (store, relations) = combine(vec![hetio, repodb], false).unwrap();
        assert_eq!(store.len(), 6);
        assert_eq!(relations[2].describe(&store), "Aspirin\tnot_treats\tFever");
        assert!(matches!(HetNetwork::assemble(&store, &relations), Err(HetnetError::GraphInvariant { what: "nodes", .. })));
    }
}
