use comfy_table::{Cell, CellAlignment, Table, presets::UTF8_FULL};
use jiff::tz::TimeZone;
use sortie_optimizer::{json::types::JsonSolution, solver::solution::optimization_log::OptimizationEvent};

use crate::mission_store::MissionRecord;

fn number(value: f64) -> Cell {
    Cell::new(format!("{value:.2}")).set_alignment(CellAlignment::Right)
}

fn timestamp(value: jiff::Timestamp) -> String {
    value
        .to_zoned(TimeZone::UTC)
        .strftime("%Y-%m-%d %H:%M:%S")
        .to_string()
}

pub fn routes_table(solution: &JsonSolution) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Vehicle",
        "Route",
        "Distance",
        "Budget",
        "Remaining",
        "Score",
        "Origin",
    ]);

    for route in &solution.routes {
        table.add_row(vec![
            Cell::new(&route.vehicle_id),
            Cell::new(route.waypoints.join(" → ")),
            number(route.summary.distance),
            number(route.summary.budget),
            number(route.summary.remaining_fuel),
            Cell::new(route.summary.score).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:?}", route.summary.origin)),
        ]);
    }

    table
}

pub fn events_table(events: &[OptimizationEvent]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Event", "Target", "Vehicles", "Details"]);

    for event in events {
        let row = match event {
            OptimizationEvent::Migration {
                target,
                from_vehicle,
                to_vehicle,
                ssd,
                osd,
                savings,
            } => vec![
                "migration".to_owned(),
                target.clone(),
                format!("{from_vehicle} → {to_vehicle}"),
                format!("ssd {ssd:.2}, osd {osd:.2}, savings {savings:.2}"),
            ],
            OptimizationEvent::Insertion {
                target,
                vehicle,
                position,
                marginal_cost,
            } => vec![
                "insertion".to_owned(),
                target.clone(),
                vehicle.clone(),
                format!("position {position}, cost {marginal_cost:.2}"),
            ],
            OptimizationEvent::Uncross {
                vehicle,
                from,
                to,
                distance_before,
                distance_after,
            } => vec![
                "uncross".to_owned(),
                String::new(),
                vehicle.clone(),
                format!("{from}..={to}, {distance_before:.2} → {distance_after:.2}"),
            ],
        };

        table.add_row(row);
    }

    table
}

pub fn missions_table(records: &[MissionRecord]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Mission",
        "Created",
        "Updated",
        "Vehicles",
        "Score",
        "Distance",
        "Replans",
    ]);

    for record in records {
        table.add_row(vec![
            Cell::new(record.id),
            Cell::new(timestamp(record.created_at)),
            Cell::new(timestamp(record.updated_at)),
            Cell::new(record.solution.routes.len()).set_alignment(CellAlignment::Right),
            Cell::new(record.solution.total_score).set_alignment(CellAlignment::Right),
            number(record.solution.total_distance),
            Cell::new(record.parent.map(|parent| parent.to_string()).unwrap_or_default()),
        ]);
    }

    table
}

/// Routes, optimization events and the targets left out of the mission.
pub fn mission_report(record: &MissionRecord) -> String {
    let solution = &record.solution;
    let mut report = format!(
        "Mission {} (score {}, distance {:.2})\n{}\n",
        record.id,
        solution.total_score,
        solution.total_distance,
        routes_table(solution)
    );

    if !solution.log.is_empty() {
        report.push_str(&format!("{}\n", events_table(&solution.log)));
    }

    for (label, targets) in [
        ("Unvisited", &solution.unvisited),
        ("Unreachable", &solution.unreachable),
        ("Orphaned", &solution.orphaned),
        ("Filtered", &solution.filtered),
        ("Inside threat zones", &solution.inside_zones),
    ] {
        if !targets.is_empty() {
            report.push_str(&format!("{label}: {}\n", targets.join(", ")));
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use sortie_optimizer::solver::{solve, solver_params::SolverParams};

    use super::*;
    use crate::test_utils::create_test_request;

    fn record() -> MissionRecord {
        let request = create_test_request();
        let (environment, vehicles) = request.clone().into_parts();
        let solution = solve(environment, vehicles, &SolverParams::default()).unwrap();

        MissionRecord::new(request, JsonSolution::from(&solution), None)
    }

    #[test]
    fn test_mission_report_lists_every_vehicle() {
        let record = record();
        let report = mission_report(&record);

        assert!(report.contains(&record.id.to_string()));
        assert!(report.contains("D1"));
        assert!(report.contains("D2"));
    }

    #[test]
    fn test_events_table() {
        let table = events_table(&[OptimizationEvent::Migration {
            target: "T7".to_owned(),
            from_vehicle: "D1".to_owned(),
            to_vehicle: "D2".to_owned(),
            ssd: 11.47,
            osd: 6.0,
            savings: 5.47,
        }]);

        let rendered = table.to_string();
        assert!(rendered.contains("T7"));
        assert!(rendered.contains("savings 5.47"));
    }

    #[test]
    fn test_missions_table_has_a_row_per_mission() {
        let records = vec![record(), record()];
        let rendered = missions_table(&records).to_string();

        for record in &records {
            assert!(rendered.contains(&record.id.to_string()));
        }
    }
}
