use serde_json::{json, Value};
use timeline_core::{
    document, edit, AnimationFile, Axis, Config, ErrorKind, FileKind, LayerKey, STANDALONE_ATOM_ID,
};

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn load(name: &str) -> AnimationFile {
    let json = timeline_test_fixtures::animations::json(name).expect("load fixture");
    document::parse_str(&json, &Config::default()).expect("parse fixture")
}

fn load_scene(name: &str) -> AnimationFile {
    let json = timeline_test_fixtures::scenes::json(name).expect("load scene fixture");
    document::parse_str(&json, &Config::default()).expect("parse scene fixture")
}

#[test]
fn standalone_export_is_read_into_the_flat_clip_list() {
    let file = load("person-base");
    assert!(!file.is_scene());
    assert_eq!(file.atom_type(), Some("Person"));
    assert_eq!(file.len(), 4);
    assert_eq!(file.atoms(), vec![STANDALONE_ATOM_ID.to_string()]);
    assert_eq!(
        file.segments(STANDALONE_ATOM_ID),
        vec!["Gestures".to_string(), "Locomotion".to_string()]
    );

    let walk = file
        .find_clip(&LayerKey::standalone("Locomotion", "Main"), "BaseWalk")
        .expect("BaseWalk");
    approx(walk.length, 2.0, 1e-6);
    assert_eq!(walk.order_index, 0);
    assert_eq!(walk.next_animation_name(), Some("BaseRun"));
    assert_eq!(walk.other["BlendDuration"], "0.25");

    let blink = file
        .find_clip(&LayerKey::standalone("Gestures", "Face"), "Blink")
        .expect("Blink");
    assert_eq!(blink.order_index, 3);
    let param = &blink.float_params[0];
    assert_eq!((param.storable.as_str(), param.name.as_str()), ("geometry", "Eyes Closed"));
    // "Min" is stored as text and "Max" as a number in the fixture.
    assert_eq!(param.min, Some(0.0));
    assert_eq!(param.max, Some(1.0));
}

#[test]
fn writing_back_reproduces_the_same_clips() {
    let config = Config::default();
    let file = load("person-base");
    let value = document::to_value(&file, &config);
    let reparsed = document::parse(value, &config).expect("reparse");
    assert_eq!(reparsed.clips(), file.clips());
}

#[test]
fn export_without_bounds_round_trips_exactly() {
    let original = timeline_test_fixtures::animations::value("cube-export").expect("fixture");
    let file = document::parse(original.clone(), &Config::default()).expect("parse");
    assert_eq!(document::to_value(&file, &Config::default()), original);
}

#[test]
fn bounds_and_lengths_are_normalized_on_output() {
    let doc = json!({
        "SerializeVersion": 1,
        "AtomType": "Person",
        "Clips": [{
            "AnimationName": "Clip",
            "AnimationLength": 2.5,
            "OrderIndex": 7,
            "FloatParams": [{ "Storable": "s", "Name": "p", "Value": [], "Min": "0.1", "Max": 2 }]
        }]
    });
    let file = document::parse(doc, &Config::default()).expect("parse");
    let clip = &file.clips()[0];
    assert_eq!(clip.segment, "Default");
    assert_eq!(clip.layer, "Default");
    assert!(!clip.other.contains_key("OrderIndex"));

    let out = document::to_value(&file, &Config::default());
    let written = &out["Clips"][0];
    assert_eq!(written["AnimationLength"], "2.5");
    assert_eq!(written["FloatParams"][0]["Min"], json!(0.1));
    assert_eq!(written["FloatParams"][0]["Max"], json!(2.0));
    assert!(written.get("OrderIndex").is_none());
}

#[test]
fn controllers_are_written_with_all_seven_axes() {
    let doc = json!({
        "AtomType": "Person",
        "Clips": [{
            "AnimationName": "Clip",
            "AnimationLength": "1",
            "Controllers": [{ "Controller": "hipControl", "X": ["A0000803F"], "Parent": "root" }]
        }]
    });
    let file = document::parse(doc, &Config::default()).expect("parse");
    let out = document::to_value(&file, &Config::default());
    let controller = out["Clips"][0]["Controllers"][0]
        .as_object()
        .expect("controller object");
    let keys: Vec<&str> = controller.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec!["Controller", "X", "Y", "Z", "RotX", "RotY", "RotZ", "RotW", "Parent"]
    );
    assert_eq!(controller["Y"], json!([]));
    assert_eq!(out["Clips"][0]["AnimationLength"], "1.0");
}

#[test]
fn axis_values_that_are_not_curves_pass_through() {
    let doc = json!({
        "AtomType": "Person",
        "Clips": [{
            "AnimationName": "Clip",
            "Controllers": [{ "Controller": "hipControl", "X": null, "Z": ["A0000803F"] }]
        }]
    });
    let file = document::parse(doc, &Config::default()).expect("parse");
    let controller = &file.clips()[0].controllers[0];
    assert!(controller.curve(Axis::X).is_none());
    assert_eq!(controller.curve(Axis::Z).expect("z").len(), 1);

    let out = document::to_value(&file, &Config::default());
    let written = &out["Clips"][0]["Controllers"][0];
    assert_eq!(written["X"], Value::Null);
    assert_eq!(written["Z"], json!(["A0000803F"]));
    let keys: Vec<&str> = written
        .as_object()
        .expect("controller object")
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(keys[..4], ["Controller", "X", "Y", "Z"]);
}

#[test]
fn targets_are_sorted_by_identity_on_output() {
    let doc = json!({
        "Clips": [{
            "AnimationName": "Clip",
            "FloatParams": [
                { "Storable": "b", "Name": "x", "Value": [] },
                { "Storable": "a", "Name": "y", "Value": [] }
            ],
            "Triggers": [
                { "Name": "Zed", "Live": "0", "Triggers": [] },
                { "Name": "Alpha", "Live": "1", "Triggers": [] }
            ]
        }]
    });
    let file = document::parse(doc, &Config::default()).expect("parse");
    let out = document::to_value(&file, &Config::default());
    let clip = &out["Clips"][0];
    assert_eq!(clip["FloatParams"][0]["Storable"], "a");
    assert_eq!(clip["Triggers"][0]["Name"], "Alpha");
    assert_eq!(clip["Triggers"][0]["Live"], "1");
}

#[test]
fn scene_clips_carry_their_atom_and_storable() {
    let file = load_scene("two-atoms");
    assert!(file.is_scene());
    assert_eq!(file.atom_type(), None);
    // The atom without an id is ignored.
    assert_eq!(file.len(), 3);
    assert_eq!(file.atoms(), vec!["Cube".to_string(), "Person".to_string()]);

    let wave = file
        .find_clip(&LayerKey::new("Person", "Main", "Arms"), "Wave")
        .expect("Wave");
    assert_eq!(
        wave.storable_id.as_deref(),
        Some("plugin#0_VamTimeline.AtomPlugin")
    );
    assert_eq!(wave.order_index, 1);
}

#[test]
fn scene_save_refills_storables_and_keeps_the_envelope() {
    let config = Config::default();
    let mut file = load_scene("two-atoms");
    edit::create_segment(&mut file, "Person", "Extra").expect("segment");

    let out = document::to_value(&file, &config);
    let FileKind::Scene { envelope } = &file.kind else {
        panic!("scene expected");
    };
    assert_eq!(out["playerHeightAdjust"], envelope["playerHeightAdjust"]);
    assert_eq!(out["atoms"][0], envelope["atoms"][0]);

    let person_plugin = &out["atoms"][1]["storables"][1];
    assert_eq!(person_plugin["Animation"]["Speed"], "1");
    assert_eq!(person_plugin["Options"]["Locked"], "0");
    let names: Vec<&str> = person_plugin["Animation"]["Clips"]
        .as_array()
        .expect("clips")
        .iter()
        .filter_map(|c| c["AnimationName"].as_str())
        .collect();
    assert_eq!(names, vec!["Idle", "Wave", "New Animation"]);

    let cube_clips = &out["atoms"][2]["storables"][0]["Animation"]["Clips"];
    assert_eq!(cube_clips.as_array().map(Vec::len), Some(1));
    // Atoms that were never read are written back untouched.
    assert_eq!(out["atoms"][3], envelope["atoms"][3]);
}

#[test]
fn pretty_output_uses_the_configured_indent() {
    let file = load("cube-export");
    let text = document::to_string_pretty(&file, &Config::default()).expect("text");
    assert!(text.starts_with("{\n   \"SerializeVersion\": 1,"), "{text}");

    let config = Config {
        output_indent: 2,
        ..Config::default()
    };
    let text = document::to_string_pretty(&file, &config).expect("text");
    assert!(text.starts_with("{\n  \"SerializeVersion\": 1,"), "{text}");
}

#[test]
fn rejects_documents_that_are_not_timeline_files() {
    let config = Config::default();
    let err = document::parse_str("[1, 2]", &config).expect_err("array");
    assert_eq!(err.kind(), ErrorKind::Document);

    let err = document::parse_str("{", &config).expect_err("truncated");
    assert_eq!(err.kind(), ErrorKind::Document);

    let err = document::parse(json!({ "atoms": {} }), &config).expect_err("atoms object");
    assert_eq!(err.kind(), ErrorKind::Document);

    let err = document::parse(
        json!({ "Clips": [{ "AnimationName": "x", "AnimationLength": "long" }] }),
        &config,
    )
    .expect_err("length");
    assert!(err.to_string().contains("AnimationLength"));

    let empty = document::parse(Value::Object(Default::default()), &config).expect("empty");
    assert!(empty.is_empty());
}
