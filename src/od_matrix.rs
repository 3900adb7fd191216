use std::collections::HashMap;
use std::error::Error;
use std::fs::File;
use std::path::Path;

use itertools::iproduct;
use ndarray::prelude::*;

use super::network::Network;
use super::AssignError;


// A convenience type for parsing csv data
type Row = HashMap<String, String>;

/// Travel demand between origin and destination zones for one time period.
#[derive(Clone, Debug, PartialEq)]
pub struct OdMatrix {
    origins: Vec<String>,
    destinations: Vec<String>,
    demand: Array<f64, Ix2>,
    /// departure window of the period, in seconds
    pub begin_s: f64,
    pub end_s: f64,
}

impl OdMatrix {
    pub fn new(origins: Vec<String>, destinations: Vec<String>, begin_s: f64, end_s: f64)
               -> OdMatrix {
        let demand = Array::zeros((origins.len(), destinations.len()));
        return OdMatrix{origins, destinations, demand, begin_s, end_s};
    }

    /// Reads a matrix from a csv file with `origin`, `destination` and `demand` columns.
    /// Zones are indexed in order of first appearance; repeated pairs add up.
    pub fn from_csv(csvpath: &Path, begin_s: f64, end_s: f64)
                    -> Result<OdMatrix, Box<dyn Error>> {
        let file = File::open(csvpath)?;
        let mut reader = csv::Reader::from_reader(file);
        let mut entries = vec![];
        let mut origin_idxs: HashMap<String, usize> = HashMap::new();
        let mut dest_idxs: HashMap<String, usize> = HashMap::new();
        let mut origins = vec![];
        let mut destinations = vec![];
        for result in reader.deserialize() {
            let row: Row = result?;
            let origin = match row.get("origin") {
                Some(origin) => origin.clone(),
                None => return Err(Box::new(AssignError::Config(
                    String::from("od matrix has no 'origin' column")))),
            };
            let destination = match row.get("destination") {
                Some(destination) => destination.clone(),
                None => return Err(Box::new(AssignError::Config(
                    String::from("od matrix has no 'destination' column")))),
            };
            let demand: f64 = match row.get("demand") {
                Some(demand) => demand.trim().parse()?,
                None => return Err(Box::new(AssignError::Config(
                    String::from("od matrix has no 'demand' column")))),
            };
            if !(demand >= 0.) {
                return Err(Box::new(AssignError::Config(
                    format!("negative demand from {} to {}", origin, destination))));
            }

            let oi = *origin_idxs.entry(origin.clone()).or_insert_with(|| {
                origins.push(origin.clone());
                origins.len() - 1
            });
            let di = *dest_idxs.entry(destination.clone()).or_insert_with(|| {
                destinations.push(destination.clone());
                destinations.len() - 1
            });
            entries.push((oi, di, demand));
        }

        let mut matrix = OdMatrix::new(origins, destinations, begin_s, end_s);
        for (oi, di, demand) in entries {
            matrix.demand[[oi, di]] += demand;
        }
        log::info!("read od matrix {:?} with total demand {}", csvpath, matrix.total_demand());
        Ok(matrix)
    }

    pub fn set(&mut self, origin: usize, destination: usize, demand: f64) {
        self.demand[[origin, destination]] = demand;
    }

    pub fn get(&self, origin: usize, destination: usize) -> f64 {
        return self.demand[[origin, destination]];
    }

    pub fn origins(&self) -> &Vec<String> {
        return &self.origins;
    }

    pub fn destinations(&self) -> &Vec<String> {
        return &self.destinations;
    }

    pub fn total_demand(&self) -> f64 {
        return self.demand.sum();
    }

    /// The OD pairs to assign, as (origin vertex, destination vertex, demand), in row-major
    /// matrix order.  Pairs with no demand, or whose origin and destination are the same
    /// zone, are left out.
    pub fn resolve(&self, network: &Network) -> Result<Vec<(usize, usize, f64)>, AssignError> {
        let origin_vertices = resolve_labels(&self.origins, network)?;
        let dest_vertices = resolve_labels(&self.destinations, network)?;
        let mut pairs = vec![];
        for (oi, di) in iproduct!(0..self.origins.len(), 0..self.destinations.len()) {
            let demand = self.demand[[oi, di]];
            if demand > 0. && self.origins[oi] != self.destinations[di] {
                pairs.push((origin_vertices[oi], dest_vertices[di], demand));
            }
        }
        return Ok(pairs);
    }
}

fn resolve_labels(labels: &Vec<String>, network: &Network) -> Result<Vec<usize>, AssignError> {
    return labels.iter().map(|label| network.vertex_idx(label).ok_or_else(
        || AssignError::UnknownVertex(label.clone()))).collect();
}
