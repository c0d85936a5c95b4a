use std::cmp::Ordering;

use crate::{
    problem::waypoint::WaypointIdx,
    solver::{
        orienteering::{Tour, TourInput, compare_tours, exact::TIE_EPSILON},
        solution::route::fits_budget,
        two_opt::{TwoOptOperator, TwoOptParams},
    },
};

/// Marginal distances below this are clamped when computing ratios.
const MIN_DELTA: f64 = 1e-9;

struct RatioInsertion {
    candidate: usize,
    position: usize,
    delta: f64,
    ratio: f64,
}

/// Greedy ratio insertion with 2-opt repair, run once per reachable end.
///
/// Each step inserts the candidate with the highest `priority / marginal
/// distance` that keeps the tour within budget. When nothing fits anymore,
/// 2-opt shortens the tour and insertion resumes if it freed some fuel.
/// `max_evaluations` bounds the number of insertion evaluations per end.
pub fn solve_heuristic(input: &TourInput, max_evaluations: usize) -> Option<Tour> {
    let mut best: Option<Tour> = None;

    for &end in &input.ends {
        let tour = build_tour(input, end, max_evaluations);

        if best
            .as_ref()
            .is_none_or(|best| compare_tours(input, &tour, best) == Ordering::Less)
        {
            best = Some(tour);
        }
    }

    best
}

fn build_tour(input: &TourInput, end: WaypointIdx, max_evaluations: usize) -> Tour {
    let mut sequence = vec![input.start, end];
    let mut distance = input.matrix.distance(input.start.get(), end.get());
    let mut inserted = vec![false; input.candidates.len()];
    let mut evaluations = 0;

    'search: loop {
        while let Some(insertion) =
            best_ratio_insertion(input, &sequence, distance, &inserted, &mut evaluations)
        {
            sequence.insert(insertion.position, input.candidates[insertion.candidate]);
            distance += insertion.delta;
            inserted[insertion.candidate] = true;

            if evaluations >= max_evaluations {
                break 'search;
            }
        }

        if evaluations >= max_evaluations || !improve_two_opt(input, &mut sequence) {
            break;
        }

        distance = sequence_distance(input, &sequence);
        if inserted.iter().all(|&done| done) {
            break;
        }
    }

    let targets = sequence[1..sequence.len() - 1].to_vec();
    let score = targets
        .iter()
        .map(|&target| input.problem.waypoint(target).priority() as u64)
        .sum();

    Tour {
        targets,
        end,
        distance: sequence_distance(input, &sequence),
        score,
    }
}

fn best_ratio_insertion(
    input: &TourInput,
    sequence: &[WaypointIdx],
    distance: f64,
    inserted: &[bool],
    evaluations: &mut usize,
) -> Option<RatioInsertion> {
    let mut best: Option<RatioInsertion> = None;

    for (candidate, &target) in input.candidates.iter().enumerate() {
        let priority = input.priorities[candidate];
        if inserted[candidate] || priority == 0 {
            continue;
        }

        for position in 1..sequence.len() {
            *evaluations += 1;

            let previous = sequence[position - 1].get();
            let next = sequence[position].get();
            let delta = input.matrix.distance(previous, target.get())
                + input.matrix.distance(target.get(), next)
                - input.matrix.distance(previous, next);

            if !delta.is_finite() || !fits_budget(distance + delta, input.budget) {
                continue;
            }

            let ratio = priority as f64 / delta.max(MIN_DELTA);
            let better = best.as_ref().is_none_or(|best| {
                ratio > best.ratio || (ratio == best.ratio && delta < best.delta)
            });

            if better {
                best = Some(RatioInsertion {
                    candidate,
                    position,
                    delta,
                    ratio,
                });
            }
        }
    }

    best
}

/// First improvement 2-opt over the targets of the sequence. Returns true if
/// the sequence got shorter.
fn improve_two_opt(input: &TourInput, sequence: &mut [WaypointIdx]) -> bool {
    let mut improved = false;

    loop {
        let mut changed = false;

        for from in 1..sequence.len().saturating_sub(2) {
            for to in from + 1..sequence.len() - 1 {
                let operator = TwoOptOperator::new(TwoOptParams { from, to });
                if operator.is_valid(sequence)
                    && operator.delta(input.matrix, sequence) < -TIE_EPSILON
                {
                    operator.apply(sequence);
                    changed = true;
                }
            }
        }

        if !changed {
            return improved;
        }
        improved = true;
    }
}

fn sequence_distance(input: &TourInput, sequence: &[WaypointIdx]) -> f64 {
    sequence
        .windows(2)
        .map(|leg| input.matrix.distance(leg[0].get(), leg[1].get()))
        .sum()
}
