use timeline_core::{
    codec, document,
    merge::merge_layers,
    AnimationFile, Clip, Config, ErrorKind, LayerKey,
};

fn load(name: &str) -> AnimationFile {
    let json = timeline_test_fixtures::animations::json(name).expect("load fixture");
    document::parse_str(&json, &Config::default()).expect("parse fixture")
}

fn clip<'a>(file: &'a AnimationFile, layer: &str, name: &str) -> &'a Clip {
    file.find_clip(&LayerKey::standalone("Idle", layer), name)
        .unwrap_or_else(|| panic!("clip {layer}/{name}"))
}

fn param_names(clip: &Clip) -> Vec<&str> {
    clip.float_params.iter().map(|p| p.name.as_str()).collect()
}

#[test]
fn merges_same_named_clips_and_moves_the_rest() {
    let mut file = load("layer-merge");
    let report = merge_layers(
        &mut file,
        &LayerKey::standalone("Idle", "LayerA"),
        &LayerKey::standalone("Idle", "LayerB"),
    )
    .expect("merge");

    assert_eq!(report.merged_clips, 1);
    assert_eq!(report.moved_clips, 1);
    assert_eq!(file.len(), 3);
    assert!(file
        .layer_clips(&LayerKey::standalone("Idle", "LayerA"))
        .is_empty());

    let b1 = clip(&file, "LayerB", "B1");
    let mut names = param_names(b1);
    names.sort();
    assert_eq!(names, vec!["ParamX", "ParamY", "ParamZ"]);
}

#[test]
fn conflicting_trigger_groups_are_renamed() {
    let mut file = load("layer-merge");
    let report = merge_layers(
        &mut file,
        &LayerKey::standalone("Idle", "LayerA"),
        &LayerKey::standalone("Idle", "LayerB"),
    )
    .expect("merge");

    assert_eq!(
        report.renamed_trigger_groups,
        vec![(
            "B1".to_string(),
            "Audio 1".to_string(),
            "Audio 1 (merged)".to_string()
        )]
    );
    let groups: Vec<&str> = clip(&file, "LayerB", "B1")
        .trigger_groups
        .iter()
        .map(|g| g.name.as_str())
        .collect();
    assert_eq!(groups, vec!["Audio 1", "Audio 1 (merged)"]);
}

#[test]
fn every_clip_of_the_target_layer_animates_the_same_targets() {
    let mut file = load("layer-merge");
    let report = merge_layers(
        &mut file,
        &LayerKey::standalone("Idle", "LayerA"),
        &LayerKey::standalone("Idle", "LayerB"),
    )
    .expect("merge");
    assert_eq!(report.harmonized_targets, 10);

    // Missing params are appended in first-seen order: source layer first.
    let a1 = clip(&file, "LayerB", "A1");
    assert_eq!(param_names(a1), vec!["ParamX", "ParamZ", "ParamY"]);
    let synthesized = a1
        .float_params
        .iter()
        .find(|p| p.name == "ParamZ")
        .expect("ParamZ");
    assert_eq!(synthesized.keyframes, codec::flat_curve(2.0, 0.0));
    assert_eq!(synthesized.keyframes, vec!["C0000000003", "A00000040"]);

    let hip = a1.controller("hipControl").expect("hip controller at rest");
    assert_eq!(
        hip.curve(timeline_core::Axis::RotW).expect("RotW"),
        ["D000000000000803F03", "A00000040"]
    );
    assert_eq!(
        hip.curve(timeline_core::Axis::X).expect("X"),
        ["C0000000003", "A00000040"]
    );

    let audio = a1
        .trigger_groups
        .iter()
        .find(|g| g.name == "Audio 1")
        .expect("spanning trigger group");
    assert_eq!(audio.triggers.len(), 1);
    assert_eq!(audio.triggers[0]["startTime"], "0");
    assert_eq!(audio.triggers[0]["endTime"], "2.0");

    let c1 = clip(&file, "LayerB", "C1");
    let mut names = param_names(c1);
    names.sort();
    assert_eq!(names, vec!["ParamX", "ParamY", "ParamZ"]);
    // C1 is one second long, so its resting curves end at t=1.
    let x = c1
        .float_params
        .iter()
        .find(|p| p.name == "ParamX")
        .expect("ParamX");
    assert_eq!(x.keyframes, codec::flat_curve(1.0, 0.0));
}

#[test]
fn merging_a_layer_into_itself_is_rejected() {
    let mut file = load("layer-merge");
    let key = LayerKey::standalone("Idle", "LayerA");
    let err = merge_layers(&mut file, &key, &key).expect_err("self merge");
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert_eq!(file.len(), 4);
}

#[test]
fn layers_of_different_segments_cannot_be_merged() {
    let mut file = load("person-base");
    let err = merge_layers(
        &mut file,
        &LayerKey::standalone("Gestures", "Arms"),
        &LayerKey::standalone("Locomotion", "Main"),
    )
    .expect_err("cross segment");
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert_eq!(file.len(), 4);
}
