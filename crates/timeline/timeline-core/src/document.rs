//! Reading and writing Timeline JSON documents.
//!
//! Two shapes are recognized:
//! - scene: top-level `atoms` array; clips live under `Animation.Clips` of
//!   every storable whose id contains the plugin marker.
//! - standalone export: `SerializeVersion`, `AtomType` and a `Clips` array.
//!
//! Unknown clip fields are kept verbatim and written back after the known
//! ones. Targets are written sorted by identity for stable diffs.

use std::collections::BTreeMap;

use hashbrown::{HashMap, HashSet};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Number, Value};

use crate::config::Config;
use crate::error::{Result, TimelineError};
use crate::ids::ClipId;
use crate::model::{
    format_decimal, AnimationFile, Axis, Clip, ControllerTarget, FileKind, FloatParamTarget,
    JsonMap, TriggerGroupTarget, STANDALONE_ATOM_ID,
};

/// Parse document text into an AnimationFile.
pub fn parse_str(text: &str, config: &Config) -> Result<AnimationFile> {
    let root: Value = serde_json::from_str(text)?;
    parse(root, config)
}

/// Build an AnimationFile from a parsed JSON document.
pub fn parse(root: Value, config: &Config) -> Result<AnimationFile> {
    if !root.is_object() {
        return Err(TimelineError::InvalidDocument(
            "top-level JSON value must be an object".into(),
        ));
    }
    if root.get("atoms").is_some() {
        parse_scene(root, config)
    } else {
        parse_standalone(&root)
    }
}

fn parse_standalone(root: &Value) -> Result<AnimationFile> {
    let serialize_version = root.get("SerializeVersion").cloned();
    let atom_type = root
        .get("AtomType")
        .and_then(Value::as_str)
        .map(str::to_string);
    let mut file = AnimationFile::standalone(serialize_version, atom_type);

    let clips = match root.get("Clips") {
        None | Some(Value::Null) => &[][..],
        Some(Value::Array(clips)) => clips.as_slice(),
        Some(_) => {
            return Err(TimelineError::InvalidDocument(
                "'Clips' must be an array".into(),
            ))
        }
    };
    for (index, raw) in clips.iter().enumerate() {
        let clip = parse_clip(raw, STANDALONE_ATOM_ID, None, index)?;
        file.push(clip);
    }
    debug!("Loaded animation export with {} clip(s).", file.len());
    Ok(file)
}

fn parse_scene(root: Value, config: &Config) -> Result<AnimationFile> {
    let Some(atoms) = root.get("atoms").and_then(Value::as_array) else {
        return Err(TimelineError::InvalidDocument(
            "'atoms' must be an array".into(),
        ));
    };

    let mut clips = Vec::new();
    for atom in atoms {
        let Some(atom_id) = atom.get("id").and_then(Value::as_str).filter(|s| !s.is_empty())
        else {
            continue;
        };
        let storables = atom
            .get("storables")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for storable in storables {
            let storable_id = storable.get("id").and_then(Value::as_str).unwrap_or_default();
            if !storable_id.contains(&config.plugin_storable_marker) {
                continue;
            }
            let Some(raw_clips) = storable
                .get("Animation")
                .and_then(|a| a.get("Clips"))
                .and_then(Value::as_array)
            else {
                continue;
            };
            for (index, raw) in raw_clips.iter().enumerate() {
                clips.push(parse_clip(raw, atom_id, Some(storable_id), index)?);
            }
        }
    }

    let mut file = AnimationFile::scene(root);
    for clip in clips {
        file.push(clip);
    }
    debug!("Loaded scene with {} clip(s).", file.len());
    Ok(file)
}

// ----- JSON schema (serde) -----

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberText {
    Number(f64),
    Text(String),
}

impl NumberText {
    fn to_f32(&self, field: &str) -> Result<f32> {
        match self {
            NumberText::Number(n) => Ok(*n as f32),
            NumberText::Text(s) => s.trim().parse::<f32>().map_err(|_| {
                TimelineError::InvalidDocument(format!("{field} '{s}' is not a number"))
            }),
        }
    }
}

fn default_name() -> String {
    "Unnamed".to_string()
}

fn default_group() -> String {
    "Default".to_string()
}

fn default_trigger_name() -> String {
    "Unnamed Trigger".to_string()
}

#[derive(Deserialize)]
struct RawClip {
    #[serde(rename = "AnimationName", default = "default_name")]
    name: String,
    #[serde(rename = "AnimationSegment", default = "default_group")]
    segment: String,
    #[serde(rename = "AnimationLayer", default = "default_group")]
    layer: String,
    #[serde(rename = "AnimationLength", default)]
    length: Option<NumberText>,
    #[serde(rename = "FloatParams", default)]
    float_params: Vec<RawFloatParam>,
    #[serde(rename = "Controllers", default)]
    controllers: Vec<RawController>,
    #[serde(rename = "Triggers", default)]
    triggers: Vec<RawTriggerGroup>,
    #[serde(flatten)]
    other: JsonMap,
}

#[derive(Deserialize)]
struct RawFloatParam {
    #[serde(rename = "Storable", default)]
    storable: String,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Value", default)]
    value: Vec<String>,
    #[serde(rename = "Min", default)]
    min: Option<NumberText>,
    #[serde(rename = "Max", default)]
    max: Option<NumberText>,
}

#[derive(Deserialize)]
struct RawController {
    #[serde(rename = "Controller", default)]
    id: String,
    #[serde(flatten)]
    rest: JsonMap,
}

#[derive(Deserialize)]
struct RawTriggerGroup {
    #[serde(rename = "Name", default = "default_trigger_name")]
    name: String,
    #[serde(rename = "Live", default)]
    live: Option<Value>,
    #[serde(rename = "Triggers", default)]
    triggers: Vec<Value>,
}

fn parse_clip(
    raw: &Value,
    atom_id: &str,
    storable_id: Option<&str>,
    index: usize,
) -> Result<Clip> {
    let rc = RawClip::deserialize(raw)?;
    let length = match &rc.length {
        Some(n) => n.to_f32("AnimationLength")?,
        None => 0.0,
    };

    let mut float_params = Vec::with_capacity(rc.float_params.len());
    for p in rc.float_params {
        float_params.push(FloatParamTarget {
            min: p.min.as_ref().map(|n| n.to_f32("Min")).transpose()?,
            max: p.max.as_ref().map(|n| n.to_f32("Max")).transpose()?,
            storable: p.storable,
            name: p.name,
            keyframes: p.value,
        });
    }

    let mut controllers = Vec::with_capacity(rc.controllers.len());
    for c in rc.controllers {
        let mut target = ControllerTarget::new(c.id);
        for (key, value) in c.rest {
            match Axis::from_key(&key) {
                Some(axis) => match value {
                    Value::Array(items) if items.iter().all(Value::is_string) => {
                        let tokens = items
                            .into_iter()
                            .filter_map(|v| match v {
                                Value::String(token) => Some(token),
                                _ => None,
                            })
                            .collect();
                        target.axis_curves.insert(axis, tokens);
                    }
                    other => {
                        debug!(
                            "Keeping non-curve '{key}' of controller '{}' as-is.",
                            target.id
                        );
                        target.extra.insert(key, other);
                    }
                },
                None => {
                    target.extra.insert(key, value);
                }
            }
        }
        controllers.push(target);
    }

    let trigger_groups = rc
        .triggers
        .into_iter()
        .map(|t| TriggerGroupTarget {
            name: t.name,
            live: match t.live {
                None => "0".to_string(),
                Some(Value::String(s)) => s,
                Some(other) => other.to_string(),
            },
            triggers: t.triggers,
        })
        .collect();

    let other: JsonMap = rc
        .other
        .into_iter()
        .filter(|(key, _)| key != "OrderIndex")
        .collect();

    Ok(Clip {
        id: ClipId(u32::MAX),
        name: rc.name,
        segment: rc.segment,
        layer: rc.layer,
        atom_id: atom_id.to_string(),
        storable_id: storable_id.map(str::to_string),
        length,
        order_index: index as i64,
        other,
        float_params,
        controllers,
        trigger_groups,
    })
}

/// JSON object for one clip, in the plugin's field order.
pub fn clip_to_value(clip: &Clip) -> Value {
    let mut out = JsonMap::new();
    out.insert("AnimationName".into(), json!(clip.name));
    out.insert("AnimationSegment".into(), json!(clip.segment));
    out.insert("AnimationLayer".into(), json!(clip.layer));
    out.insert("AnimationLength".into(), json!(format_decimal(clip.length)));
    for (key, value) in &clip.other {
        out.insert(key.clone(), value.clone());
    }

    if !clip.float_params.is_empty() {
        let mut params: Vec<&FloatParamTarget> = clip.float_params.iter().collect();
        params.sort_by(|a, b| (&a.storable, &a.name).cmp(&(&b.storable, &b.name)));
        let params: Vec<Value> = params.into_iter().map(float_param_to_value).collect();
        out.insert("FloatParams".into(), Value::Array(params));
    }
    if !clip.controllers.is_empty() {
        let mut controllers: Vec<&ControllerTarget> = clip.controllers.iter().collect();
        controllers.sort_by(|a, b| a.id.cmp(&b.id));
        let controllers: Vec<Value> = controllers.into_iter().map(controller_to_value).collect();
        out.insert("Controllers".into(), Value::Array(controllers));
    }
    if !clip.trigger_groups.is_empty() {
        let mut groups: Vec<&TriggerGroupTarget> = clip.trigger_groups.iter().collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        let groups: Vec<Value> = groups
            .into_iter()
            .map(|g| json!({ "Name": g.name, "Live": g.live, "Triggers": g.triggers }))
            .collect();
        out.insert("Triggers".into(), Value::Array(groups));
    }
    Value::Object(out)
}

fn float_param_to_value(p: &FloatParamTarget) -> Value {
    let mut out = JsonMap::new();
    out.insert("Storable".into(), json!(p.storable));
    out.insert("Name".into(), json!(p.name));
    out.insert("Value".into(), json!(p.keyframes));
    if let Some(min) = p.min {
        out.insert("Min".into(), decimal_number(min));
    }
    if let Some(max) = p.max {
        out.insert("Max".into(), decimal_number(max));
    }
    Value::Object(out)
}

/// JSON number for `v` using its shortest decimal form, so 0.1f32 is
/// written as `0.1` rather than its widened f64 value.
fn decimal_number(v: f32) -> Value {
    format_decimal(v)
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map_or(Value::Null, Value::Number)
}

fn controller_to_value(c: &ControllerTarget) -> Value {
    let mut out = JsonMap::new();
    out.insert("Controller".into(), json!(c.id));
    for axis in Axis::ALL {
        let tokens = c.curve(axis).unwrap_or_default();
        out.insert(axis.key().into(), json!(tokens));
    }
    for (key, value) in &c.extra {
        out.insert(key.clone(), value.clone());
    }
    Value::Object(out)
}

/// Clips sorted by order index, ties kept in file order.
fn ordered<'a>(clips: impl IntoIterator<Item = &'a Clip>) -> Vec<&'a Clip> {
    let mut out: Vec<&Clip> = clips.into_iter().collect();
    out.sort_by_key(|c| c.order_index);
    out
}

/// Serialize an AnimationFile back into its document shape.
pub fn to_value(file: &AnimationFile, config: &Config) -> Value {
    match &file.kind {
        FileKind::Standalone {
            serialize_version,
            atom_type,
        } => {
            let clips: Vec<Value> = ordered(file.clips()).into_iter().map(clip_to_value).collect();
            json!({
                "SerializeVersion": serialize_version.clone().unwrap_or(Value::Null),
                "AtomType": atom_type,
                "Clips": clips,
            })
        }
        FileKind::Scene { envelope } => scene_to_value(file, envelope, config),
    }
}

fn is_plugin_storable(storable: &Value, config: &Config) -> bool {
    storable
        .get("id")
        .and_then(Value::as_str)
        .is_some_and(|id| id.contains(&config.plugin_storable_marker))
        && storable.get("Animation").is_some_and(Value::is_object)
}

fn scene_to_value(file: &AnimationFile, envelope: &Value, config: &Config) -> Value {
    let mut out = envelope.clone();

    // (atom, storable) slots that can receive clips, and each atom's first slot.
    let mut slots: HashSet<(String, String)> = HashSet::new();
    let mut first_slot: HashMap<String, String> = HashMap::new();
    for atom in out.get("atoms").and_then(Value::as_array).into_iter().flatten() {
        let Some(atom_id) = atom.get("id").and_then(Value::as_str) else {
            continue;
        };
        for storable in atom
            .get("storables")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            if !is_plugin_storable(storable, config) {
                continue;
            }
            let storable_id = storable.get("id").and_then(Value::as_str).unwrap_or_default();
            slots.insert((atom_id.to_string(), storable_id.to_string()));
            first_slot
                .entry(atom_id.to_string())
                .or_insert_with(|| storable_id.to_string());
        }
    }

    let mut grouped: BTreeMap<(String, String), Vec<&Clip>> = BTreeMap::new();
    for clip in ordered(file.clips()) {
        let own = clip
            .storable_id
            .as_ref()
            .map(|s| (clip.atom_id.clone(), s.clone()))
            .filter(|slot| slots.contains(slot));
        let slot = own.or_else(|| {
            first_slot
                .get(&clip.atom_id)
                .map(|s| (clip.atom_id.clone(), s.clone()))
        });
        match slot {
            Some(slot) => grouped.entry(slot).or_default().push(clip),
            None => warn!(
                "Clip '{}' of atom '{}' has no animation storable to be saved in.",
                clip.name, clip.atom_id
            ),
        }
    }

    if let Some(atoms) = out.get_mut("atoms").and_then(Value::as_array_mut) {
        for atom in atoms {
            let Some(atom_id) = atom.get("id").and_then(Value::as_str).map(str::to_string) else {
                continue;
            };
            let Some(storables) = atom.get_mut("storables").and_then(Value::as_array_mut) else {
                continue;
            };
            for storable in storables {
                if !is_plugin_storable(storable, config) {
                    continue;
                }
                let storable_id = storable
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let clips: Vec<Value> = grouped
                    .get(&(atom_id.clone(), storable_id))
                    .map(|clips| clips.iter().map(|c| clip_to_value(c)).collect())
                    .unwrap_or_default();
                if let Some(animation) = storable.get_mut("Animation").and_then(Value::as_object_mut)
                {
                    animation.insert("Clips".into(), Value::Array(clips));
                }
            }
        }
    }
    out
}

/// Pretty-printed document text using the configured indentation.
pub fn to_string_pretty(file: &AnimationFile, config: &Config) -> Result<String> {
    let value = to_value(file, config);
    let indent = " ".repeat(config.output_indent);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    String::from_utf8(buf).map_err(|e| TimelineError::InvalidDocument(e.to_string()))
}
