use std::cmp::Ordering;

use jiff::Timestamp;

use crate::solver::{
    orienteering::{Tour, TourInput, compare_tours},
    solution::route::fits_budget,
};

const NO_PARENT: u8 = u8::MAX;

/// The deadline is polled once per block of subsets.
const DEADLINE_CHECK_INTERVAL: usize = 4096;

/// Distances closer than this are treated as equal when breaking ties.
pub(crate) const TIE_EPSILON: f64 = 1e-9;

/// Upper bound on the candidate count, the state table holds `2^n * n` entries.
pub const MAX_EXACT_TARGETS: usize = 18;

/// Dynamic program over `(visited subset, last target)`.
///
/// `cost[mask][last]` is the shortest distance from the start visiting exactly
/// `mask` and ending at `last`. A state is only kept if the closest end is
/// still reachable from it within the budget, which prunes most subsets on
/// tight budgets. Returns `None` when the deadline expires.
pub fn solve_exact(input: &TourInput, deadline: Timestamp) -> Option<Tour> {
    let n = input.candidates.len();
    debug_assert!(n <= MAX_EXACT_TARGETS);

    let states = 1usize << n;
    let distance = |from: usize, to: usize| {
        input
            .matrix
            .distance(input.candidates[from].get(), input.candidates[to].get())
    };

    let min_end = input
        .candidates
        .iter()
        .map(|candidate| input.min_end_distance(*candidate))
        .collect::<Vec<_>>();

    let mut score = vec![0u64; states];
    for mask in 1..states {
        let lowest = mask.trailing_zeros() as usize;
        score[mask] = score[mask & (mask - 1)] + input.priorities[lowest] as u64;
    }

    let mut cost = vec![f64::INFINITY; states * n];
    let mut parent = vec![NO_PARENT; states * n];

    for first in 0..n {
        let start_cost = input
            .matrix
            .distance(input.start.get(), input.candidates[first].get());

        if fits_budget(start_cost + min_end[first], input.budget) {
            cost[(1 << first) * n + first] = start_cost;
        }
    }

    for mask in 1..states {
        if mask % DEADLINE_CHECK_INTERVAL == 0 && Timestamp::now() > deadline {
            return None;
        }

        for last in 0..n {
            if mask & (1 << last) == 0 {
                continue;
            }

            let current = cost[mask * n + last];
            if !current.is_finite() {
                continue;
            }

            for next in 0..n {
                if mask & (1 << next) != 0 {
                    continue;
                }

                let next_cost = current + distance(last, next);
                if !fits_budget(next_cost + min_end[next], input.budget) {
                    continue;
                }

                let slot = (mask | (1 << next)) * n + next;
                let existing = cost[slot];

                let better = if !existing.is_finite() || next_cost < existing - TIE_EPSILON {
                    true
                } else if next_cost <= existing + TIE_EPSILON {
                    // Same visited set on both sides, keep the smaller id sequence
                    sequence(&parent, n, mask, last) < sequence(&parent, n, mask, parent[slot] as usize)
                } else {
                    false
                };

                if better {
                    cost[slot] = next_cost;
                    parent[slot] = last as u8;
                }
            }
        }
    }

    let mut best: Option<Tour> = None;

    for &end in &input.ends {
        let direct = input.matrix.distance(input.start.get(), end.get());
        if fits_budget(direct, input.budget) {
            keep_better(input, &mut best, Tour {
                targets: vec![],
                end,
                distance: direct,
                score: 0,
            });
        }
    }

    for mask in 1..states {
        for last in 0..n {
            let current = cost[mask * n + last];
            if !current.is_finite() {
                continue;
            }

            for &end in &input.ends {
                let total = current + input.matrix.distance(input.candidates[last].get(), end.get());
                if !fits_budget(total, input.budget) {
                    continue;
                }

                // Only rebuild the sequence when the tour can win
                let competitive = best.as_ref().is_none_or(|best| {
                    score[mask] > best.score
                        || (score[mask] == best.score && total <= best.distance + TIE_EPSILON)
                });

                if competitive {
                    keep_better(input, &mut best, Tour {
                        targets: sequence(&parent, n, mask, last)
                            .into_iter()
                            .map(|index| input.candidates[index])
                            .collect(),
                        end,
                        distance: total,
                        score: score[mask],
                    });
                }
            }
        }
    }

    best
}

fn keep_better(input: &TourInput, best: &mut Option<Tour>, tour: Tour) {
    let wins = best
        .as_ref()
        .is_none_or(|current| compare_tours(input, &tour, current) == Ordering::Less);

    if wins {
        *best = Some(tour);
    }
}

/// Candidate indices of the path stored for `(mask, last)`, in visiting order.
fn sequence(parent: &[u8], n: usize, mut mask: usize, mut last: usize) -> Vec<usize> {
    let mut path = Vec::with_capacity(mask.count_ones() as usize);

    loop {
        path.push(last);
        let previous = parent[mask * n + last];
        mask &= !(1 << last);

        if previous == NO_PARENT || mask == 0 {
            break;
        }
        last = previous as usize;
    }

    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use jiff::SignedDuration;

    use super::*;
    use crate::{
        problem::vehicle::VehicleIdx,
        test_utils::{create_test_environment, create_test_problem, create_test_vehicle},
    };

    fn far_deadline() -> Timestamp {
        Timestamp::now() + SignedDuration::from_secs(60)
    }

    #[test]
    fn test_exact_collects_everything_with_large_budget() {
        let (problem, matrix) = create_test_problem(
            create_test_environment(),
            vec![create_test_vehicle("D1", "A1", 1000.0)],
        );
        let input = TourInput::new(&problem, &matrix, VehicleIdx::new(0), problem.targets());

        let tour = solve_exact(&input, far_deadline()).unwrap();

        assert_eq!(tour.score, 6);
        assert_eq!(tour.targets.len(), 3);
        assert!(tour.distance <= 1000.0);
    }

    #[test]
    fn test_exact_respects_budget() {
        let (problem, matrix) = create_test_problem(
            create_test_environment(),
            vec![create_test_vehicle("D1", "A1", 100.0)],
        );
        let input = TourInput::new(&problem, &matrix, VehicleIdx::new(0), problem.targets());

        let tour = solve_exact(&input, far_deadline()).unwrap();
        let ids = tour
            .targets
            .iter()
            .map(|&target| problem.waypoint_id(target))
            .collect::<Vec<_>>();

        // T1 + T2 is about 83.6, anything with T3 is over 100
        assert_eq!(ids, vec!["T1", "T2"]);
        assert_eq!(tour.score, 3);
        assert!(tour.distance <= 100.0);
    }

    #[test]
    fn test_exact_prefers_lexicographic_order_on_ties() {
        let (problem, matrix) = create_test_problem(
            create_test_environment(),
            vec![create_test_vehicle("D1", "A1", 100.0)],
        );
        let input = TourInput::new(&problem, &matrix, VehicleIdx::new(0), problem.targets());
        let tour = solve_exact(&input, far_deadline()).unwrap();

        // A1 T1 T2 A1 and A1 T2 T1 A1 have the same length
        assert_eq!(problem.waypoint_id(tour.targets[0]), "T1");
    }

    #[test]
    fn test_exact_expired_deadline() {
        let (problem, matrix) = create_test_problem(
            create_test_environment(),
            vec![create_test_vehicle("D1", "A1", 100.0)],
        );
        let input = TourInput::new(&problem, &matrix, VehicleIdx::new(0), problem.targets());

        // Too few subsets to reach a deadline check
        assert!(solve_exact(&input, Timestamp::now() - SignedDuration::from_secs(1)).is_some());
    }
}
