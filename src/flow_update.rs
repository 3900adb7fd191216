use std::collections::HashMap;

use super::network::{Edge, EdgeId, Network, Path};
use super::AssignError;


/// Splits `demand` over `path_set` in proportion to the paths' choice probabilities,
/// storing each path's share in `help_flow`.  The last path takes whatever the others
/// leave, so the shares add up to `demand` exactly.  If that remainder is negative it is
/// clipped to zero and returned.  A NaN or infinite probability is an error, and leaves the
/// help flows untouched.
pub fn distribute_demand(path_set: &mut [Path], demand: f64)
                         -> Result<Option<f64>, AssignError> {
    if let Some(path) = path_set.iter().find(|pp| !pp.choice_prob.is_finite()) {
        return Err(AssignError::NonFiniteFlow(format!("path {}", path.label)));
    }
    let mut cumulated_flow = 0.;
    let num_paths = path_set.len();
    for (ii, path) in path_set.iter_mut().enumerate() {
        if ii + 1 < num_paths {
            path.help_flow = demand * path.choice_prob;
            cumulated_flow += path.help_flow;
        } else {
            let residual = demand - cumulated_flow;
            if residual < 0. {
                path.help_flow = 0.;
                return Ok(Some(residual));
            }
            path.help_flow = residual;
        }
    }
    return Ok(None);
}

/// Adds each path's `help_flow` to the help flow of the real edges it uses.
pub fn accumulate_help_flow(path_set: &[Path], edges: &mut [Edge]) {
    for path in path_set {
        for ei in &path.edges {
            let edge = &mut edges[*ei];
            if edge.is_real() {
                edge.help_flow += path.help_flow;
            }
        }
    }
}

/// Method-of-successive-averages update of every real edge's flow towards its help flow:
/// `flow += (help_flow - flow) / iteration`.  Negative results are clipped to zero, and all
/// help flows are reset.  Returns the flows from before the update, indexed by edge id.
pub fn blend_edge_flows(edges: &mut [Edge], iteration: usize) -> Vec<f64> {
    let step = 1. / iteration.max(1) as f64;
    let mut previous = Vec::with_capacity(edges.len());
    for edge in edges.iter_mut() {
        previous.push(edge.flow);
        if edge.is_real() {
            edge.flow += step * (edge.help_flow - edge.flow);
            if edge.flow < 0. {
                edge.flow = 0.;
            }
        }
        edge.help_flow = 0.;
    }
    return previous;
}

/// Fails on the first edge whose flow is NaN or infinite.
pub fn check_edge_flows(edges: &[Edge]) -> Result<(), AssignError> {
    match edges.iter().find(|ee| !ee.flow.is_finite()) {
        Some(edge) => Err(AssignError::NonFiniteFlow(format!("edge {}", edge.label))),
        None => Ok(()),
    }
}

/// Walks the predecessor map back from `destination` to `origin`, returning the route in
/// origin-to-destination order, or None if the destination wasn't reached.  The walk may
/// not visit more edges than the network has.
pub fn walk_predecessors(network: &Network, origin: usize, destination: usize,
                         preds: &HashMap<usize, EdgeId>)
                         -> Result<Option<Vec<EdgeId>>, AssignError> {
    let max_edges = network.edge_count();
    let mut route = vec![];
    let mut vertex = destination;
    while vertex != origin {
        let ei = match preds.get(&vertex) {
            Some(ei) => *ei,
            None => return Ok(None),
        };
        route.push(ei);
        if route.len() > max_edges {
            route.reverse();
            return Err(AssignError::PathOverflow {
                origin: String::from(network.vertex_label(origin)),
                destination: String::from(network.vertex_label(destination)),
                partial_path: network.edge_labels(&route),
            });
        }
        vertex = network.edges()[ei].source;
    }
    route.reverse();
    return Ok(Some(route));
}

/// All-or-nothing loading of `flow` onto the shortest path from `origin` to `destination`
/// given by the predecessor map.  Returns the route taken, or None if the destination is
/// unreachable.
pub fn incremental_assign(network: &mut Network, origin: usize, destination: usize,
                          preds: &HashMap<usize, EdgeId>, flow: f64)
                          -> Result<Option<Vec<EdgeId>>, AssignError> {
    let route = match walk_predecessors(network, origin, destination, preds)? {
        Some(route) => route,
        None => return Ok(None),
    };
    let edges = network.edges_mut();
    for ei in &route {
        if edges[*ei].is_real() {
            edges[*ei].flow += flow;
        }
    }
    return Ok(Some(route));
}


#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use super::super::network::EdgeKind;
    use super::super::commonality::tests::{worked_example_edges, worked_example_paths};
    use super::super::commonality::{compute_commonality_and_choice, OverlapCache};
    use super::super::choice::ChoiceModel;

    fn line_network() -> Network {
        // z -> a -> b -> c, where z-a is a connector
        let mut network = Network::new();
        for vv in &["z", "a", "b", "c"] {
            network.add_vertex(vv);
        }
        network.add_edge("za", "z", "a", EdgeKind::Connector, 0., 0., 0.).unwrap();
        network.add_edge("ab", "a", "b", EdgeKind::Real, 100., 10., 100.).unwrap();
        network.add_edge("bc", "b", "c", EdgeKind::Real, 100., 10., 100.).unwrap();
        network.add_edge("cb", "c", "b", EdgeKind::Real, 100., 10., 100.).unwrap();
        network
    }

    #[test]
    fn test_worked_example_flows() {
        let edges = worked_example_edges();
        let mut paths = worked_example_paths();
        let mut cache = OverlapCache::new();
        compute_commonality_and_choice(&mut paths, &edges, &mut cache, -1., 1.,
                                       ChoiceModel::CLogit);
        assert_eq!(distribute_demand(&mut paths, 1000.), Ok(None));
        assert_relative_eq!(paths[0].help_flow, 506.4, epsilon = 0.05);
        assert_relative_eq!(paths[1].help_flow, 493.6, epsilon = 0.05);
        assert_eq!(paths[0].help_flow + paths[1].help_flow, 1000.);
    }

    #[test]
    fn test_flow_conservation() {
        let mut paths = worked_example_paths();
        paths.push(Path::new(2, "C", 0, 2, vec![1], 500.));
        let probs = [0.1234567, 0.7654321, 0.1111112];
        for (path, prob) in paths.iter_mut().zip(probs.iter()) {
            path.choice_prob = *prob;
        }
        for demand in &[1., 33.3, 1000., 123456.789] {
            assert_eq!(distribute_demand(&mut paths, *demand), Ok(None));
            let total: f64 = paths.iter().map(|pp| pp.help_flow).sum();
            assert_relative_eq!(total, *demand, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_negative_residual_is_clipped() {
        let mut paths = worked_example_paths();
        paths[0].choice_prob = 1.2;
        paths[1].choice_prob = -0.2;
        let residual = distribute_demand(&mut paths, 100.).unwrap().unwrap();
        assert_relative_eq!(residual, -20.);
        assert_eq!(paths[1].help_flow, 0.);
    }

    #[test]
    fn test_accumulate_and_blend() {
        let mut edges = worked_example_edges();
        let mut paths = worked_example_paths();
        paths[0].help_flow = 600.;
        paths[1].help_flow = 400.;
        accumulate_help_flow(&paths, &mut edges);
        assert_relative_eq!(edges[0].help_flow, 1000.);
        assert_relative_eq!(edges[1].help_flow, 600.);
        assert_relative_eq!(edges[2].help_flow, 400.);

        // the first iteration takes the help flow as is
        let previous = blend_edge_flows(&mut edges, 1);
        assert_eq!(previous, vec![0., 0., 0.]);
        assert_relative_eq!(edges[0].flow, 1000.);
        assert_relative_eq!(edges[2].flow, 400.);
        assert!(edges.iter().all(|ee| ee.help_flow == 0.));

        // the second moves halfway
        paths[0].help_flow = 200.;
        paths[1].help_flow = 800.;
        accumulate_help_flow(&paths, &mut edges);
        let previous = blend_edge_flows(&mut edges, 2);
        assert_eq!(previous, vec![1000., 600., 400.]);
        assert_relative_eq!(edges[0].flow, 1000.);
        assert_relative_eq!(edges[1].flow, 400.);
        assert_relative_eq!(edges[2].flow, 600.);
    }

    #[test]
    fn test_blend_never_negative() {
        let mut edges = worked_example_edges();
        edges[0].flow = 10.;
        edges[0].help_flow = -500.;
        edges[1].flow = 0.;
        edges[1].help_flow = -1.;
        blend_edge_flows(&mut edges, 3);
        assert!(edges.iter().all(|ee| ee.flow >= 0.));
        assert_eq!(edges[0].flow, 0.);
    }

    #[test]
    fn test_non_finite_probability_is_rejected() {
        let mut paths = worked_example_paths();
        paths[0].choice_prob = f64::NAN;
        paths[1].choice_prob = 0.5;
        assert_eq!(distribute_demand(&mut paths, 100.),
                   Err(AssignError::NonFiniteFlow(String::from("path A"))));
        assert!(paths.iter().all(|pp| pp.help_flow == 0.));

        paths[0].choice_prob = 0.5;
        paths[1].choice_prob = f64::INFINITY;
        assert!(distribute_demand(&mut paths, 100.).is_err());
    }

    #[test]
    fn test_non_finite_edge_flows_are_reported() {
        let mut edges = worked_example_edges();
        edges[0].help_flow = 10.;
        blend_edge_flows(&mut edges, 1);
        assert_eq!(check_edge_flows(&edges), Ok(()));

        // NaN slips past the clip at zero, so it has to be caught separately
        edges[2].help_flow = f64::NAN;
        blend_edge_flows(&mut edges, 2);
        assert!(edges[2].flow.is_nan());
        assert_eq!(check_edge_flows(&edges),
                   Err(AssignError::NonFiniteFlow(String::from("edge b_only"))));
    }

    #[test]
    fn test_connectors_carry_no_flow() {
        let mut network = line_network();
        let zz = network.vertex_idx("z").unwrap();
        let cc = network.vertex_idx("c").unwrap();
        let preds = network.shortest_path_tree(zz);
        let route = incremental_assign(&mut network, zz, cc, &preds, 25.).unwrap().unwrap();
        assert_eq!(network.edge_labels(&route), vec!["za", "ab", "bc"]);
        assert_eq!(network.edges()[0].flow, 0.);
        assert_eq!(network.edges()[1].flow, 25.);
        assert_eq!(network.edges()[2].flow, 25.);
        assert_eq!(network.edges()[3].flow, 0.);
    }

    #[test]
    fn test_unreachable_destination() {
        let mut network = line_network();
        let aa = network.vertex_idx("a").unwrap();
        let zz = network.vertex_idx("z").unwrap();
        let preds = network.shortest_path_tree(aa);
        assert_eq!(incremental_assign(&mut network, aa, zz, &preds, 5.), Ok(None));
        assert!(network.edges().iter().all(|ee| ee.flow == 0.));
    }

    #[test]
    fn test_cyclic_predecessors_overflow() {
        let mut network = line_network();
        let zz = network.vertex_idx("z").unwrap();
        let bb = network.vertex_idx("b").unwrap();
        let cc = network.vertex_idx("c").unwrap();
        // b is entered from c and c from b, so the walk from c never reaches z
        let mut preds = HashMap::new();
        preds.insert(bb, network.edge_idx("cb").unwrap());
        preds.insert(cc, network.edge_idx("bc").unwrap());

        match incremental_assign(&mut network, zz, cc, &preds, 5.) {
            Err(AssignError::PathOverflow{origin, destination, partial_path}) => {
                assert_eq!(origin, "z");
                assert_eq!(destination, "c");
                assert_eq!(partial_path.len(), network.edge_count() + 1);
                assert_eq!(partial_path.last().unwrap(), "bc");
            }
            other => panic!("expected a path overflow, got {:?}", other),
        }
        // nothing was loaded
        assert!(network.edges().iter().all(|ee| ee.flow == 0.));
    }
}
