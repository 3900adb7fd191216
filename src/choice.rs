use std::f64::consts::PI;

use super::network::Path;


/// The discrete-choice utility used to split an OD pair's demand over its paths.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ChoiceModel {
    CLogit,
    Lohse,
}

/// Dispersion parameter of the C-Logit model for one OD pair.  Uses the standard deviation
/// of the paths' travel times (divisor n) and the shortest travel time; when the paths are
/// nearly equal in cost, or the shortest one takes no time, the parameter falls back to 1.
pub fn clogit_theta(path_set: &[Path]) -> f64 {
    if path_set.is_empty() {
        return 1.;
    }
    let count = path_set.len() as f64;
    let min_time = path_set.iter().map(|pp| pp.act_time).fold(f64::INFINITY, f64::min);
    let mean_time = path_set.iter().map(|pp| pp.act_time).sum::<f64>() / count;
    let variance = path_set.iter().map(|pp| (pp.act_time - mean_time).powi(2)).sum::<f64>()
        / count;
    let std_dev = variance.sqrt();

    if std_dev > 0.04 && min_time > 0. {
        return PI / (6f64.sqrt() * std_dev * min_time);
    } else {
        return 1.;
    }
}

/// Choice probability of each path in `path_set`, in order, as
/// `1 / (1 + sum_{q != p} exp(f(p, q)))`.  Commonality factors and travel times must be
/// up to date on the paths.
pub fn choice_probabilities(path_set: &[Path], model: ChoiceModel) -> Vec<f64> {
    if path_set.len() == 1 {
        return vec![1.];
    }
    let exponent: Box<dyn Fn(&Path, &Path) -> f64> = match model {
        ChoiceModel::CLogit => {
            let theta = clogit_theta(path_set);
            Box::new(move |one: &Path, two: &Path| {
                theta * (one.act_time - two.act_time + one.commfactor - two.commfactor)
            })
        }
        ChoiceModel::Lohse => {
            let cost = |pp: &Path| pp.help_time + pp.commfactor;
            let mut min_path = &path_set[0];
            for pp in path_set {
                if cost(pp) < cost(min_path) {
                    min_path = pp;
                }
            }
            let min_cost = cost(min_path);
            if min_cost <= 0. {
                return free_path_split(path_set, cost);
            }
            let beta = 12. / (1. + (0.7 - 0.015 * min_path.help_time).exp());
            Box::new(move |one: &Path, two: &Path| {
                let rel_one = beta * (cost(one) / min_cost - 1.);
                let rel_two = beta * (cost(two) / min_cost - 1.);
                rel_one.powi(2) - rel_two.powi(2)
            })
        }
    };

    return path_set.iter().map(|one| {
        let sum_exp_utility: f64 = path_set.iter()
            .filter(|two| two.id != one.id)
            .map(|two| exponent(one, two).exp())
            .sum();
        1. / (1. + sum_exp_utility)
    }).collect();
}

/// Relative costs are undefined when the cheapest path costs nothing, so the paths that
/// cost nothing share the demand equally and the others get none.
fn free_path_split<F>(path_set: &[Path], cost: F) -> Vec<f64>
    where F: Fn(&Path) -> f64
{
    let num_free = path_set.iter().filter(|pp| cost(*pp) <= 0.).count();
    return path_set.iter().map(|pp| {
        if cost(pp) <= 0. {
            1. / num_free as f64
        } else {
            0.
        }
    }).collect();
}
