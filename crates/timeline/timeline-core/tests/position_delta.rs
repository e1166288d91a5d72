use timeline_core::{
    codec, document,
    transform::{apply_position_delta, center_root, center_root_delta, value_at},
    AnimationFile, Axis, Clip, ClipId, Config, ErrorKind,
};

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn load() -> AnimationFile {
    let json = timeline_test_fixtures::animations::json("center-root").expect("load fixture");
    document::parse_str(&json, &Config::default()).expect("parse fixture")
}

fn id_of(file: &AnimationFile, name: &str) -> ClipId {
    file.clips()
        .iter()
        .find(|c| c.name == name)
        .unwrap_or_else(|| panic!("clip {name}"))
        .id()
}

fn values(clip: &Clip, controller: &str, axis: Axis) -> Vec<f32> {
    let tokens = clip
        .controller(controller)
        .and_then(|c| c.curve(axis))
        .expect("curve");
    codec::decode_curve(tokens)
        .expect("decode")
        .into_iter()
        .map(|s| s.value)
        .collect()
}

fn selection<'a>(file: &'a mut AnimationFile, names: &[&str]) -> Vec<&'a mut Clip> {
    let ids: Vec<ClipId> = names.iter().map(|n| id_of(file, n)).collect();
    file.select_mut(&ids)
}

#[test]
fn reads_the_root_position_at_time_zero() {
    let file = load();
    let offset = file.clip(id_of(&file, "Offset")).expect("clip");
    let hip = offset.controller("hipControl").expect("hip");
    approx(value_at(hip, Axis::X, 0.0).expect("x"), 1.5, 1e-6);
    approx(value_at(hip, Axis::X, 1.0).expect("x"), 2.5, 1e-6);
    approx(value_at(hip, Axis::Z, 0.0).expect("z"), -3.0, 1e-6);
    // No keyframe at that time.
    approx(value_at(hip, Axis::X, 0.5).expect("x"), 0.0, 1e-6);

    let delta = center_root_delta(offset, &Config::default()).expect("delta");
    approx(delta[0], -1.5, 1e-6);
    approx(delta[1], 0.0, 1e-6);
    approx(delta[2], 3.0, 1e-6);
}

#[test]
fn center_root_shifts_every_selected_clip_by_the_first_clips_delta() {
    let mut file = load();
    let config = Config::default();
    let report = {
        let mut clips = selection(&mut file, &["Offset", "Follow"]);
        center_root(&mut clips, &config).expect("center")
    };
    assert_eq!(report.processed, 2);
    assert!(report.failures.is_empty());

    let offset = file.clip(id_of(&file, "Offset")).expect("clip");
    let x = values(offset, "hipControl", Axis::X);
    assert_eq!(x.len(), 3);
    approx(x[0], 0.0, 1e-6);
    approx(x[1], 1.0, 1e-6);
    approx(x[2], 0.0, 1e-6);
    let z = values(offset, "hipControl", Axis::Z);
    approx(z[0], 0.0, 1e-6);
    approx(z[1], 2.0, 1e-6);

    // Curve types survive the shift.
    let hip = offset.controller("hipControl").expect("hip");
    let types: Vec<u8> = codec::decode_curve(hip.curve(Axis::X).expect("x"))
        .expect("decode")
        .into_iter()
        .map(|s| s.curve_type)
        .collect();
    assert_eq!(types, vec![3, 1, 3]);

    let follow = file.clip(id_of(&file, "Follow")).expect("clip");
    for v in values(follow, "hipControl", Axis::X) {
        approx(v, 0.0, 1e-6);
    }
    for v in values(follow, "hipControl", Axis::Z) {
        approx(v, 0.0, 1e-6);
    }
}

#[test]
fn rotation_and_untouched_axes_keep_their_tokens() {
    let mut file = load();
    let before = file.clip(id_of(&file, "Offset")).expect("clip").clone();
    {
        let mut clips = selection(&mut file, &["Offset"]);
        center_root(&mut clips, &Config::default()).expect("center");
    }
    let after = file.clip(id_of(&file, "Offset")).expect("clip");

    let hip_before = before.controller("hipControl").expect("hip");
    let hip_after = after.controller("hipControl").expect("hip");
    for axis in [Axis::Y, Axis::RotX, Axis::RotY, Axis::RotZ, Axis::RotW] {
        assert_eq!(hip_before.curve(axis), hip_after.curve(axis), "{axis:?}");
    }
    assert_eq!(
        before.controller("headRotation"),
        after.controller("headRotation")
    );
}

#[test]
fn missing_root_controller_fails_without_changes() {
    let mut file = load();
    let before: Vec<Clip> = file.clips().to_vec();
    let err = {
        let mut clips = selection(&mut file, &["NoRoot", "Offset"]);
        center_root(&mut clips, &Config::default()).expect_err("no root")
    };
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert!(err.to_string().contains("hipControl"));
    assert_eq!(file.clips(), before.as_slice());
}

#[test]
fn a_malformed_clip_is_reported_and_left_whole() {
    let mut file = load();
    let follow_id = id_of(&file, "Follow");
    let follow_z_before = {
        let follow = file.clip_mut(follow_id).expect("clip");
        let hip = follow
            .controllers
            .iter_mut()
            .find(|c| c.id == "hipControl")
            .expect("hip");
        hip.axis_curves.insert(Axis::X, vec!["Zbad".to_string()]);
        hip.curve(Axis::Z).expect("z").to_vec()
    };

    let report = {
        let clips = selection(&mut file, &["Offset", "Follow"]);
        apply_position_delta(clips, [1.0, 0.0, 1.0])
    };
    assert_eq!(report.processed, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].name, "Follow");
    assert_eq!(report.failures[0].clip, follow_id);

    let follow = file.clip(follow_id).expect("clip");
    let hip = follow.controller("hipControl").expect("hip");
    assert_eq!(hip.curve(Axis::Z).expect("z"), follow_z_before.as_slice());
}

#[test]
fn manual_offset_moves_only_the_requested_axis() {
    let mut file = load();
    let before = file.clip(id_of(&file, "Follow")).expect("clip").clone();
    let report = {
        let clips = selection(&mut file, &["Follow"]);
        apply_position_delta(clips, [0.0, 0.5, 0.0])
    };
    assert_eq!(report.processed, 1);

    let after = file.clip(id_of(&file, "Follow")).expect("clip");
    for v in values(after, "hipControl", Axis::Y) {
        approx(v, 1.4, 1e-5);
    }
    let hip_before = before.controller("hipControl").expect("hip");
    let hip_after = after.controller("hipControl").expect("hip");
    assert_eq!(hip_before.curve(Axis::X), hip_after.curve(Axis::X));
    assert_eq!(hip_before.curve(Axis::Z), hip_after.curve(Axis::Z));
}

#[test]
fn zero_delta_leaves_every_token_untouched() {
    let mut file = load();
    let before: Vec<Clip> = file.clips().to_vec();
    let report = {
        let clips = selection(&mut file, &["Offset", "Follow", "NoRoot"]);
        apply_position_delta(clips, [0.0, 0.0, 0.0])
    };
    assert_eq!(report.processed, 3);
    assert_eq!(file.clips(), before.as_slice());
}
