//! Call-spec derivation and validate-and-coerce

use ai_fncall::schema::{to_call_spec, FieldType, Schema};
use ai_fncall::Error;
use serde_json::json;

fn trip_schema() -> Schema {
    let stop = Schema::builder()
        .required("city", FieldType::String, "City name")
        .optional("nights", FieldType::Integer, "Nights to stay")
        .build();
    Schema::builder()
        .title("Trip")
        .required("traveler", FieldType::String, "Who travels")
        .required("stops", FieldType::array_of(FieldType::object(stop)), "Itinerary")
        .optional("budget", FieldType::Number, "Budget in EUR")
        .optional(
            "class",
            FieldType::Enum(vec!["economy".into(), "business".into()]),
            "Cabin class",
        )
        .build()
}

#[test]
fn test_call_spec_preserves_descriptions_and_required() {
    let spec = to_call_spec("plan_trip", "Plan a trip", &trip_schema()).unwrap();
    let params = &spec.parameters;

    assert_eq!(params["type"], "object");
    assert_eq!(params["required"], json!(["traveler", "stops"]));
    assert_eq!(params["properties"]["budget"]["description"], "Budget in EUR");
    assert_eq!(
        params["properties"]["stops"]["items"]["required"],
        json!(["city"])
    );
    assert!(params.get("title").is_none());
}

#[test]
fn test_call_spec_is_byte_identical_across_calls() {
    let first = serde_json::to_vec(&to_call_spec("plan_trip", "d", &trip_schema()).unwrap()).unwrap();
    for _ in 0..10 {
        let again = serde_json::to_vec(&to_call_spec("plan_trip", "d", &trip_schema()).unwrap()).unwrap();
        assert_eq!(first, again);
    }
}

#[test]
fn test_non_object_root_is_schema_error() {
    for doc in [
        json!({"type": "string"}),
        json!({"type": "array", "items": {}}),
        json!({"anyOf": [{"type": "object"}]}),
    ] {
        let err = to_call_spec("t", "d", &Schema::from_json(doc)).unwrap_err();
        assert!(matches!(err, Error::Schema { .. }));
    }
}

#[test]
fn test_validate_coerces_and_reports_in_order() {
    let schema = trip_schema();

    let ok = schema
        .validate(&json!({
            "traveler": "Ada",
            "stops": [{"city": "Oslo", "nights": "2"}],
            "budget": "1500.5"
        }))
        .unwrap();
    assert_eq!(ok["stops"][0]["nights"], json!(2));
    assert_eq!(ok["budget"], json!(1500.5));

    let failure = schema
        .validate(&json!({
            "stops": [{"nights": 1}, {"city": 7}],
            "class": "first"
        }))
        .unwrap_err();
    let paths: Vec<&str> = failure.issues().iter().map(|i| i.path.as_str()).collect();
    // Missing required fields first, then present keys in map order
    assert_eq!(paths, vec!["traveler", "class", "stops[0].city", "stops[1].city"]);
}

#[test]
fn test_validation_is_idempotent() {
    let schema = trip_schema();
    let inputs = [
        json!({"traveler": "Ada", "stops": []}),
        json!({"traveler": "Bo", "stops": [{"city": "Rome", "nights": 3.0}], "budget": "12"}),
        json!({"traveler": "Cy", "stops": [{"city": "Lima"}], "class": "business"}),
    ];
    for input in inputs {
        let once = schema.validate(&input).unwrap();
        let reparsed: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&once).unwrap()).unwrap();
        let twice = schema.validate(&reparsed).unwrap();
        assert_eq!(once, twice);
    }
}

#[derive(serde::Deserialize, schemars::JsonSchema, Debug, PartialEq)]
struct Reading {
    /// Sensor id
    sensor: String,
    celsius: f64,
    tags: Vec<String>,
}

#[test]
fn test_schema_from_rust_type() {
    let schema = Schema::from_type::<Reading>().unwrap();
    let spec = to_call_spec("record", "", &schema).unwrap();
    assert_eq!(spec.parameters["properties"]["sensor"]["description"], "Sensor id");

    let reading: Reading = schema
        .validate_into(&json!({"sensor": "s1", "celsius": "21.5", "tags": []}))
        .unwrap();
    assert_eq!(reading.celsius, 21.5);
}

#[derive(serde::Deserialize, schemars::JsonSchema)]
struct Leg {
    to: Port,
}

#[derive(serde::Deserialize, schemars::JsonSchema)]
struct Port {
    code: String,
    berth: i64,
}

#[test]
fn test_builder_embeds_derived_schema_with_definitions() {
    let schema = Schema::builder()
        .required("leg", FieldType::object(Schema::from_type::<Leg>().unwrap()), "Next leg")
        .build();

    let doc = schema.to_json_schema();
    assert_eq!(doc["properties"]["leg"]["properties"]["to"]["$ref"], "#/definitions/Port");
    assert_eq!(doc["definitions"]["Port"]["required"], json!(["berth", "code"]));
    assert!(doc["properties"]["leg"].get("definitions").is_none());

    let value = schema
        .validate(&json!({"leg": {"to": {"code": "OSL", "berth": "4"}}}))
        .unwrap();
    assert_eq!(value, json!({"leg": {"to": {"code": "OSL", "berth": 4}}}));

    let failure = schema.validate(&json!({"leg": {"to": {"code": "OSL"}}})).unwrap_err();
    assert_eq!(failure.issues()[0].path, "leg.to.berth");

    let spec = to_call_spec("sail", "Plan a leg", &schema).unwrap();
    assert!(spec.parameters["definitions"]["Port"].is_object());
}
