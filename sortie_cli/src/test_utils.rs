use sortie_optimizer::json::types::JsonMissionRequest;

const REQUEST: &str = r#"{
    "environment": {
        "bases": [
            { "id": "A1", "coordinates": [0.0, 0.0] },
            { "id": "A2", "coordinates": [100.0, 0.0] }
        ],
        "targets": [
            { "id": "T1", "coordinates": [20.0, 0.0] },
            { "id": "T2", "coordinates": [40.0, 10.0], "priority": 2 },
            { "id": "T3", "coordinates": [60.0, -10.0], "priority": 3 }
        ]
    },
    "vehicles": [
        { "id": "D1", "fuel_budget": 100.0, "start": { "base": "A1" } },
        { "id": "D2", "fuel_budget": 100.0, "start": { "base": "A2" } }
    ]
}"#;

pub fn create_test_request() -> JsonMissionRequest {
    serde_json::from_str(REQUEST).unwrap()
}
