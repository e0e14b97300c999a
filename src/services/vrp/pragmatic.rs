//! vrp-pragmatic solver integration.

use std::collections::HashSet;
use std::io::BufWriter;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};
use vrp_cli::extensions::solve::config::{create_builder_from_config, Config, TerminationConfig};
use vrp_core::solver::Solver;
use vrp_pragmatic::format::problem::{Matrix, PragmaticProblem, Problem};
use vrp_pragmatic::format::solution::{write_pragmatic, PragmaticOutputType, Solution as PragmaticSolution};

use super::adapter::parse_vehicle_id;
use super::{build_pragmatic_matrix, build_pragmatic_problem, parse_job_id, BatchRequest, BatchSolver, SolverConfig, DEFAULT_PROFILE};
use crate::error::SolverError;
use crate::types::Stop;

/// Batch solver backed by the vrp-core metaheuristic
#[derive(Debug, Clone, Copy, Default)]
pub struct PragmaticSolver;

impl BatchSolver for PragmaticSolver {
    fn name(&self) -> &'static str {
        "vrp-pragmatic"
    }

    fn solve(&self, request: &BatchRequest) -> Result<Vec<Vec<Stop>>, SolverError> {
        if request.pool.is_empty() {
            return Ok(vec![Vec::new(); request.vehicle_count]);
        }

        let solution = solve_pragmatic(request)?;
        map_solution(request, &solution)
    }
}

/// Pragmatic problem in, pragmatic solution out. vrp-core only writes its
/// solution through the JSON writer, so the result is read back from that.
fn solve_pragmatic(request: &BatchRequest) -> Result<PragmaticSolution> {
    let problem: Problem = serde_json::from_value(build_pragmatic_problem(request))
        .context("Failed to deserialize pragmatic problem")?;
    let matrix: Matrix = build_pragmatic_matrix(request, DEFAULT_PROFILE);
    let core_problem = Arc::new(
        (problem, vec![matrix])
            .read_pragmatic()
            .context("Failed to build core problem from pragmatic format")?,
    );

    let evolution = create_builder_from_config(core_problem.clone(), Vec::new(), &search_limits(&request.config))
        .context("Failed to create solver builder")?
        .build()
        .context("Failed to build solver configuration")?;
    let solution = Solver::new(core_problem.clone(), evolution)
        .solve()
        .context("Failed to solve batch with vrp-pragmatic")?;

    let mut writer = BufWriter::new(Vec::new());
    write_pragmatic(core_problem.as_ref(), &solution, PragmaticOutputType::default(), &mut writer)
        .context("Failed to write pragmatic solution")?;
    let json = writer.into_inner().context("Failed to flush solution writer")?;
    serde_json::from_slice(&json).context("Failed to read back pragmatic solution")
}

/// Only the search budget is set; operators and telemetry keep vrp-cli defaults
fn search_limits(config: &SolverConfig) -> Config {
    Config {
        termination: Some(TerminationConfig {
            max_time: Some(config.max_time_seconds as usize),
            max_generations: Some(config.max_generations),
            variation: None,
        }),
        ..Config::default()
    }
}

/// Tours back to per-vehicle stop lists, indexed by vehicle id
fn map_solution(request: &BatchRequest, solution: &PragmaticSolution) -> Result<Vec<Vec<Stop>>, SolverError> {
    let pool: HashSet<Stop> = request.pool.iter().copied().collect();
    let mut routes = vec![Vec::new(); request.vehicle_count];

    for tour in &solution.tours {
        let vehicle = parse_vehicle_id(&tour.vehicle_id)
            .filter(|&v| v < request.vehicle_count)
            .ok_or_else(|| SolverError::InvalidProposal(format!("unknown vehicle '{}'", tour.vehicle_id)))?;

        for stop in &tour.stops {
            for activity in stop.activities() {
                if activity.activity_type == "departure" || activity.activity_type == "arrival" {
                    continue;
                }
                match parse_job_id(&activity.job_id).filter(|s| pool.contains(s)) {
                    Some(s) => routes[vehicle].push(s),
                    None => {
                        return Err(SolverError::InvalidProposal(format!(
                            "job '{}' is not part of the pool",
                            activity.job_id
                        )))
                    }
                }
            }
        }
    }

    if let Some(unassigned) = &solution.unassigned {
        for job in unassigned {
            let reasons: Vec<&str> = job.reasons.iter().map(|r| r.code.as_str()).collect();
            debug!(job = %job.job_id, reasons = ?reasons, "Solver left job unassigned");
        }
        if !unassigned.is_empty() && routes.iter().all(Vec::is_empty) {
            warn!(unassigned = unassigned.len(), "Solver assigned nothing");
            return Err(SolverError::NoSolution);
        }
    }

    Ok(routes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn request(pool: Vec<Stop>, submatrix: Vec<Vec<f64>>, vehicles: usize, max_stops: usize) -> BatchRequest {
        BatchRequest {
            time_windows: vec![None; pool.len()],
            pool,
            submatrix,
            vehicle_count: vehicles,
            max_stops_per_route: max_stops,
            max_route_duration_minutes: 150.0,
            shift_start: NaiveDate::from_ymd_opt(2026, 1, 26).unwrap().and_hms_opt(9, 0, 0).unwrap(),
            config: SolverConfig::instant(),
        }
    }

    #[test]
    fn test_empty_pool_returns_empty_routes() {
        let routes = PragmaticSolver.solve(&request(vec![], vec![vec![0.0]], 3, 5)).unwrap();
        assert_eq!(routes, vec![Vec::<Stop>::new(); 3]);
    }

    #[test]
    fn test_small_problem_routes_every_stop() {
        let submatrix = vec![
            vec![0.0, 10.0, 20.0],
            vec![10.0, 0.0, 15.0],
            vec![20.0, 15.0, 0.0],
        ];
        let routes = PragmaticSolver
            .solve(&request(vec![Stop(5), Stop(9)], submatrix, 2, 5))
            .unwrap();

        assert_eq!(routes.len(), 2);
        let mut routed: Vec<Stop> = routes.into_iter().flatten().collect();
        routed.sort();
        assert_eq!(routed, vec![Stop(5), Stop(9)]);
    }

    #[test]
    fn test_capacity_spreads_stops_over_vehicles() {
        let submatrix = vec![
            vec![0.0, 5.0, 5.0],
            vec![5.0, 0.0, 5.0],
            vec![5.0, 5.0, 0.0],
        ];
        let routes = PragmaticSolver
            .solve(&request(vec![Stop(1), Stop(2)], submatrix, 2, 1))
            .unwrap();

        assert!(routes.iter().all(|r| r.len() <= 1));
        assert_eq!(routes.iter().map(Vec::len).sum::<usize>(), 2);
    }
}
