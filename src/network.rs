// this file defines the road network that traffic is assigned onto: vertices, directed edges
// carrying the flow state of the assignment, and the candidate path sets of each OD pair.
// Shortest-path search runs on a petgraph graph kept alongside the edge list.
use std::error::Error;
use std::path::Path as FsPath;
use std::collections::HashMap;
use std::collections::HashSet;

use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use xml::reader::XmlEvent;

use super::config_utils;
use super::dijkstra::{dijkstra_with_predecessors, RoutingGraph};
use super::AssignError;


pub type EdgeId = usize;
pub type PathId = usize;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EdgeKind {
    /// A road link that carries flow.
    Real,
    /// A zone connector.  It can appear in paths, but never carries flow.
    Connector,
}

#[derive(Clone, PartialEq, Debug)]
pub struct Edge {
    pub label: String,
    pub source: usize,
    pub target: usize,
    pub kind: EdgeKind,
    pub length: f64,
    pub freeflow_time: f64,
    pub capacity: f64,
    pub flow: f64,
    pub help_flow: f64,
    pub actual_time: f64,
    // smoothed travel time used by the Lohse model, and its value one iteration ago
    pub help_time: f64,
    pub prev_help_time: f64,
}

impl Edge {
    pub fn new(label: &str, source: usize, target: usize, kind: EdgeKind, length: f64,
               freeflow_time: f64, capacity: f64) -> Edge {
        return Edge {
            label: String::from(label),
            source,
            target,
            kind,
            length,
            freeflow_time,
            capacity,
            flow: 0.,
            help_flow: 0.,
            actual_time: freeflow_time,
            help_time: freeflow_time,
            prev_help_time: 0.,
        };
    }

    /// Whether this edge takes part in flow accumulation and the convergence tests.
    pub fn is_real(&self) -> bool {
        return self.kind == EdgeKind::Real && self.source != self.target;
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct Path {
    pub id: PathId,
    pub label: String,
    pub origin: usize,
    pub destination: usize,
    pub edges: Vec<EdgeId>,
    pub length: f64,
    pub act_time: f64,
    pub help_time: f64,
    pub commfactor: f64,
    pub choice_prob: f64,
    pub flow: f64,
    pub help_flow: f64,
}

impl Path {
    pub fn new(id: PathId, label: &str, origin: usize, destination: usize, edges: Vec<EdgeId>,
               length: f64) -> Path {
        return Path {
            id,
            label: String::from(label),
            origin,
            destination,
            edges,
            length,
            act_time: 0.,
            help_time: 0.,
            commfactor: 0.,
            choice_prob: 0.,
            flow: 0.,
            help_flow: 0.,
        };
    }

    /// Recompute the path's travel times from the current edge travel times.
    pub fn update_times(&mut self, edges: &[Edge]) {
        self.act_time = self.edges.iter().map(|ei| edges[*ei].actual_time).sum();
        self.help_time = self.edges.iter().map(|ei| edges[*ei].help_time).sum();
    }
}

pub type OdPathSets = HashMap<(usize, usize), Vec<Path>>;

pub struct Network {
    vertex_labels: Vec<String>,
    vertex_idxs_by_label: HashMap<String, usize>,
    edges: Vec<Edge>,
    edge_idxs_by_label: HashMap<String, EdgeId>,
    graph: RoutingGraph,
    // candidate paths for each (origin, destination) vertex pair, in input order
    od_paths: OdPathSets,
    num_paths: usize,
}

impl Network {
    pub fn new() -> Network {
        return Network {
            vertex_labels: vec![],
            vertex_idxs_by_label: HashMap::new(),
            edges: vec![],
            edge_idxs_by_label: HashMap::new(),
            graph: RoutingGraph::new(),
            od_paths: HashMap::new(),
            num_paths: 0,
        };
    }

    /// Adds a vertex, or returns the index of the existing vertex with this label.
    pub fn add_vertex(&mut self, label: &str) -> usize {
        if let Some(idx) = self.vertex_idxs_by_label.get(label) {
            return *idx;
        }
        let idx = self.vertex_labels.len();
        self.vertex_labels.push(String::from(label));
        self.vertex_idxs_by_label.insert(String::from(label), idx);
        let node = self.graph.add_node(idx);
        debug_assert_eq!(node.index(), idx);
        return idx;
    }

    pub fn add_edge(&mut self, label: &str, from: &str, to: &str, kind: EdgeKind, length: f64,
                    freeflow_time: f64, capacity: f64) -> Result<EdgeId, AssignError> {
        if self.edge_idxs_by_label.contains_key(label) {
            return Err(AssignError::Config(format!("duplicate edge id {}", label)));
        }
        let source = self.require_vertex(from)?;
        let target = self.require_vertex(to)?;
        let id = self.edges.len();
        self.edges.push(Edge::new(label, source, target, kind, length, freeflow_time, capacity));
        self.edge_idxs_by_label.insert(String::from(label), id);
        self.graph.add_edge(NodeIndex::new(source), NodeIndex::new(target), id);
        return Ok(id);
    }

    /// Adds a candidate path for the OD pair (origin, destination).  The edges must form a
    /// connected chain starting at the origin and ending at the destination.
    pub fn add_path(&mut self, label: &str, origin: &str, destination: &str,
                    edge_labels: &[&str]) -> Result<PathId, AssignError> {
        let origin = self.require_vertex(origin)?;
        let destination = self.require_vertex(destination)?;
        let mut edge_ids = vec![];
        for el in edge_labels {
            match self.edge_idxs_by_label.get(*el) {
                Some(ei) => edge_ids.push(*ei),
                None => return Err(AssignError::UnknownEdge(String::from(*el))),
            }
        }

        let (first, last) = match (edge_ids.first(), edge_ids.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Err(AssignError::BrokenPath(String::from(label))),
        };
        let connected = edge_ids.windows(2).all(
            |pair| self.edges[pair[0]].target == self.edges[pair[1]].source);
        if !connected || self.edges[first].source != origin ||
           self.edges[last].target != destination {
            return Err(AssignError::BrokenPath(String::from(label)));
        }

        let length = edge_ids.iter().map(|ei| self.edges[*ei].length).sum();
        let id = self.num_paths;
        self.num_paths += 1;
        let path = Path::new(id, label, origin, destination, edge_ids, length);
        self.od_paths.entry((origin, destination)).or_insert(vec![]).push(path);
        return Ok(id);
    }

    fn require_vertex(&self, label: &str) -> Result<usize, AssignError> {
        return self.vertex_idx(label).ok_or_else(|| AssignError::UnknownVertex(String::from(label)));
    }

    pub fn from_xml(xml_path: &FsPath) -> Result<Network, Box<dyn Error>> {
        let mut network = Network::new();
        let parser = config_utils::xml_parser_from_path(xml_path)?;
        for ee in parser {
            let ee = ee?;
            if let XmlEvent::StartElement{ name, attributes, .. } = &ee {
                if name.local_name == "node" {
                    let id = config_utils::require_xml_attribute(&attributes, "id", "node")?;
                    network.add_vertex(&id);
                } else if name.local_name == "edge" {
                    let id = config_utils::require_xml_attribute(&attributes, "id", "edge")?;
                    let from = config_utils::require_xml_attribute(&attributes, "from", "edge")?;
                    let to = config_utils::require_xml_attribute(&attributes, "to", "edge")?;
                    let length: f64 = config_utils::require_xml_attribute(
                        &attributes, "length", "edge")?.parse()?;
                    let speed: f64 = config_utils::require_xml_attribute(
                        &attributes, "speed", "edge")?.parse()?;
                    if speed <= 0. {
                        return Err(Box::new(AssignError::Config(
                            format!("edge {} has non-positive speed", id))));
                    }
                    // a link without a capacity never congests
                    let capacity = match config_utils::get_xml_attribute_value(&attributes,
                                                                               "capacity") {
                        Some(cap) => cap.parse()?,
                        None => f64::INFINITY,
                    };
                    let kind = match config_utils::get_xml_attribute_value(&attributes, "kind") {
                        Some(kind) if kind == "connector" => EdgeKind::Connector,
                        Some(kind) if kind == "real" => EdgeKind::Real,
                        None => EdgeKind::Real,
                        Some(kind) => return Err(Box::new(AssignError::Config(
                            format!("edge {} has unknown kind {}", id, kind)))),
                    };
                    network.add_edge(&id, &from, &to, kind, length, length / speed, capacity)?;
                }
            }
        }
        log::info!("loaded network with {} vertices and {} edges", network.vertex_count(),
                   network.edge_count());
        Ok(network)
    }

    /// Loads candidate path sets from a path xml file.  Returns the number of paths loaded.
    pub fn load_paths_xml(&mut self, xml_path: &FsPath) -> Result<usize, Box<dyn Error>> {
        let parser = config_utils::xml_parser_from_path(xml_path)?;
        let mut count = 0;
        let mut seen_labels = HashSet::new();
        for ee in parser {
            let ee = ee?;
            if let XmlEvent::StartElement{ name, attributes, .. } = &ee {
                if name.local_name != "path" {
                    continue;
                }
                let id = config_utils::require_xml_attribute(&attributes, "id", "path")?;
                if !seen_labels.insert(id.clone()) {
                    return Err(Box::new(AssignError::Config(format!("duplicate path id {}", id))));
                }
                let origin = config_utils::require_xml_attribute(&attributes, "origin", "path")?;
                let destination = config_utils::require_xml_attribute(&attributes, "destination",
                                                                      "path")?;
                let edges = config_utils::require_xml_attribute(&attributes, "edges", "path")?;
                let edge_labels: Vec<&str> = edges.split_whitespace().collect();
                self.add_path(&id, &origin, &destination, &edge_labels)?;
                count += 1;
            }
        }
        log::info!("loaded {} paths for {} OD pairs", count, self.od_paths.len());
        Ok(count)
    }

    /// Shortest-path tree from `origin` on current edge travel times.  Maps each reachable
    /// vertex to the id of the edge used to enter it.
    pub fn shortest_path_tree(&self, origin: usize) -> HashMap<usize, EdgeId> {
        let edges = &self.edges;
        let (_, preds) = dijkstra_with_predecessors(&self.graph, NodeIndex::new(origin),
                                                    |er| edges[*er.weight()].actual_time);
        return preds.into_iter().map(|(ni, ei)| (ni.index(), ei)).collect();
    }

    pub fn update_path_times(&mut self) {
        for paths in self.od_paths.values_mut() {
            for path in paths.iter_mut() {
                path.update_times(&self.edges);
            }
        }
    }

    pub fn vertex_idx(&self, label: &str) -> Option<usize> {
        return self.vertex_idxs_by_label.get(label).map(|idx| *idx);
    }

    pub fn vertex_label(&self, idx: usize) -> &str {
        return &self.vertex_labels[idx];
    }

    pub fn vertex_count(&self) -> usize {
        return self.vertex_labels.len();
    }

    pub fn edge_idx(&self, label: &str) -> Option<EdgeId> {
        return self.edge_idxs_by_label.get(label).map(|idx| *idx);
    }

    pub fn edges(&self) -> &[Edge] {
        return &self.edges;
    }

    pub fn edges_mut(&mut self) -> &mut [Edge] {
        return &mut self.edges;
    }

    pub fn edge_count(&self) -> usize {
        return self.edges.len();
    }

    pub fn edge_labels(&self, edge_ids: &[EdgeId]) -> Vec<String> {
        return edge_ids.iter().map(|ei| self.edges[*ei].label.clone()).collect();
    }

    pub fn paths(&self, origin: usize, destination: usize) -> Option<&Vec<Path>> {
        return self.od_paths.get(&(origin, destination));
    }

    /// Read access to the edges together with write access to the path sets, so that path
    /// sets can be updated in parallel against a fixed edge state.
    pub fn split_paths_mut(&mut self) -> (&[Edge], &mut OdPathSets) {
        return (&self.edges, &mut self.od_paths);
    }

    pub fn split_edges_mut(&mut self) -> (&mut [Edge], &OdPathSets) {
        return (&mut self.edges, &self.od_paths);
    }

    pub fn num_paths(&self) -> usize {
        return self.num_paths;
    }
}


#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::io::Write;
    use approx::assert_relative_eq;

    use tempfile::tempdir;

    use super::*;

    static TEST_NETWORK_XML: &str = r###"<net>
    <node id="o"/>
    <node id="a"/>
    <node id="b"/>
    <node id="c"/>
    <node id="d"/>
    <edge id="o-a" from="o" to="a" length="0" speed="1" kind="connector"/>
    <edge id="a-b" from="a" to="b" length="500" speed="10" capacity="1000"/>
    <edge id="b-c" from="b" to="c" length="500" speed="10" capacity="1000"/>
    <edge id="c-d" from="c" to="d" length="500" speed="10" capacity="1000"/>
    <edge id="b-d" from="b" to="d" length="500" speed="5" capacity="1000" kind="real"/>
</net>
"###;

    static TEST_PATHS_XML: &str = r###"<paths>
    <path id="short" origin="o" destination="d" edges="o-a a-b b-d"/>
    <path id="long" origin="o" destination="d" edges="o-a a-b b-c c-d"/>
    <path id="tail" origin="b" destination="d" edges="b-d"/>
</paths>
"###;

    fn write_file(dir: &FsPath, name: &str, contents: &str) -> std::path::PathBuf {
        let file_path = dir.join(name);
        let mut file = File::create(&file_path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file_path
    }

    #[test]
    fn test_network_parsing() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let net_path = write_file(dir.path(), "net.xml", TEST_NETWORK_XML);
        let network = Network::from_xml(&net_path)?;

        assert_eq!(network.vertex_count(), 5);
        assert_eq!(network.edge_count(), 5);
        let conn = &network.edges()[network.edge_idx("o-a").unwrap()];
        assert_eq!(conn.kind, EdgeKind::Connector);
        assert!(!conn.is_real());
        let bd = &network.edges()[network.edge_idx("b-d").unwrap()];
        assert_eq!(bd.kind, EdgeKind::Real);
        assert_relative_eq!(bd.freeflow_time, 100.);
        assert_relative_eq!(bd.actual_time, 100.);
        assert_eq!(network.vertex_label(bd.source), "b");
        Ok(())
    }

    #[test]
    fn test_path_parsing() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let net_path = write_file(dir.path(), "net.xml", TEST_NETWORK_XML);
        let paths_path = write_file(dir.path(), "paths.xml", TEST_PATHS_XML);
        let mut network = Network::from_xml(&net_path)?;
        assert_eq!(network.load_paths_xml(&paths_path)?, 3);
        assert_eq!(network.num_paths(), 3);

        let oo = network.vertex_idx("o").unwrap();
        let dd = network.vertex_idx("d").unwrap();
        let paths = network.paths(oo, dd).unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].label, "short");
        assert_eq!(paths[1].label, "long");
        assert_eq!(paths[0].id, 0);
        assert_eq!(paths[1].id, 1);
        assert_relative_eq!(paths[0].length, 1000.);
        assert_relative_eq!(paths[1].length, 1500.);

        network.update_path_times();
        let paths = network.paths(oo, dd).unwrap();
        assert_relative_eq!(paths[0].act_time, 150.);
        assert_relative_eq!(paths[1].act_time, 150.);
        assert_relative_eq!(paths[1].help_time, 150.);
        Ok(())
    }

    #[test]
    fn test_broken_paths() {
        let mut network = Network::new();
        for vv in &["a", "b", "c"] {
            network.add_vertex(vv);
        }
        network.add_edge("ab", "a", "b", EdgeKind::Real, 10., 1., 100.).unwrap();
        network.add_edge("bc", "b", "c", EdgeKind::Real, 10., 1., 100.).unwrap();

        assert_eq!(network.add_path("p", "a", "c", &["bc", "ab"]),
                   Err(AssignError::BrokenPath(String::from("p"))));
        assert_eq!(network.add_path("p", "a", "b", &["ab", "bc"]),
                   Err(AssignError::BrokenPath(String::from("p"))));
        assert_eq!(network.add_path("p", "a", "c", &[]),
                   Err(AssignError::BrokenPath(String::from("p"))));
        assert_eq!(network.add_path("p", "a", "c", &["ab", "xx"]),
                   Err(AssignError::UnknownEdge(String::from("xx"))));
        assert_eq!(network.add_path("p", "a", "z", &["ab"]),
                   Err(AssignError::UnknownVertex(String::from("z"))));
        assert_eq!(network.add_path("p", "a", "c", &["ab", "bc"]), Ok(0));
        assert!(network.add_edge("ab", "a", "c", EdgeKind::Real, 1., 1., 1.).is_err());
    }

    #[test]
    fn test_shortest_path_tree() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let net_path = write_file(dir.path(), "net.xml", TEST_NETWORK_XML);
        let mut network = Network::from_xml(&net_path)?;
        let oo = network.vertex_idx("o").unwrap();
        let dd = network.vertex_idx("d").unwrap();

        // b-d takes 100 s, b-c-d takes 100 s too; make the detour cheaper
        let cd = network.edge_idx("c-d").unwrap();
        network.edges_mut()[cd].actual_time = 10.;
        let tree = network.shortest_path_tree(oo);
        assert_eq!(tree[&dd], cd);
        assert!(!tree.contains_key(&oo));

        network.edges_mut()[cd].actual_time = 1000.;
        let tree = network.shortest_path_tree(oo);
        assert_eq!(tree[&dd], network.edge_idx("b-d").unwrap());
        Ok(())
    }
}
