//! Keyframe codec for the compact per-axis curve tokens.
//!
//! Token layout: one flag character `'A' + bits` (bit0 = value present,
//! bit1 = curve type present), the keyframe time as 4 little-endian bytes of
//! an IEEE-754 `f32` written as 8 uppercase hex digits, then optionally the
//! value (8 hex digits) and optionally the curve type (2 hex digits).
//!
//! Tokens are delta-encoded against the previous keyframe of the same curve,
//! so a curve must be replayed in stored order carrying [`KeyframeState`].

use crate::error::{Result, TimelineError};

/// Value-change threshold: a keyframe carries its value only above this.
pub const VALUE_EPSILON: f32 = 1e-7;

/// Curve type the plugin starts replaying from.
pub const DEFAULT_CURVE_TYPE: u8 = 3;

const FLAG_HAS_VALUE: u8 = 1 << 0;
const FLAG_HAS_CURVE_TYPE: u8 = 1 << 1;
const TIME_HEX_LEN: usize = 8;
const VALUE_HEX_LEN: usize = 8;
const CURVE_HEX_LEN: usize = 2;

/// Decoded keyframe. Exists only while a curve is being transformed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeyframeSample {
    pub time: f32,
    pub value: f32,
    pub curve_type: u8,
}

impl KeyframeSample {
    pub fn new(time: f32, value: f32, curve_type: u8) -> Self {
        Self {
            time,
            value,
            curve_type,
        }
    }
}

/// State carried from one keyframe to the next while encoding or decoding.
///
/// `curve_type == None` means "no predecessor": the next token always
/// carries its curve type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeyframeState {
    pub value: f32,
    pub curve_type: Option<u8>,
}

impl KeyframeState {
    /// Replay origin used by the plugin: value 0, curve type 3.
    pub const INITIAL: Self = Self {
        value: 0.0,
        curve_type: Some(DEFAULT_CURVE_TYPE),
    };

    /// No predecessor at all; used for the first key of synthesized curves.
    pub const UNSET: Self = Self {
        value: 0.0,
        curve_type: None,
    };

    pub fn new(value: f32, curve_type: u8) -> Self {
        Self {
            value,
            curve_type: Some(curve_type),
        }
    }

    fn after(sample: &KeyframeSample) -> Self {
        Self::new(sample.value, sample.curve_type)
    }
}

/// Encode a single keyframe against its predecessor.
pub fn encode_keyframe(sample: KeyframeSample, prev: KeyframeState) -> String {
    let has_value = (sample.value - prev.value).abs() > VALUE_EPSILON;
    let has_curve_type = prev.curve_type != Some(sample.curve_type);

    let mut flags = 0u8;
    if has_value {
        flags |= FLAG_HAS_VALUE;
    }
    if has_curve_type {
        flags |= FLAG_HAS_CURVE_TYPE;
    }

    let mut out = String::with_capacity(1 + TIME_HEX_LEN + VALUE_HEX_LEN + CURVE_HEX_LEN);
    out.push(char::from(b'A' + flags));
    push_hex(&mut out, &sample.time.to_le_bytes());
    if has_value {
        push_hex(&mut out, &sample.value.to_le_bytes());
    }
    if has_curve_type {
        push_hex(&mut out, &[sample.curve_type]);
    }
    out
}

/// Decode a single keyframe token, defaulting absent fields from `prev`.
pub fn decode_keyframe(token: &str, prev: KeyframeState) -> Result<KeyframeSample> {
    let bytes = token.as_bytes();
    let Some(&flag) = bytes.first() else {
        return Err(TimelineError::malformed(token, "token is empty"));
    };
    if !(b'A'..=b'D').contains(&flag) {
        return Err(TimelineError::malformed(
            token,
            format!("unknown flag character '{}'", char::from(flag)),
        ));
    }
    let flags = flag - b'A';
    let has_value = flags & FLAG_HAS_VALUE != 0;
    let has_curve_type = flags & FLAG_HAS_CURVE_TYPE != 0;

    let mut required = 1 + TIME_HEX_LEN;
    if has_value {
        required += VALUE_HEX_LEN;
    }
    if has_curve_type {
        required += CURVE_HEX_LEN;
    }
    if bytes.len() < required {
        return Err(TimelineError::malformed(
            token,
            format!("expected at least {required} characters, found {}", bytes.len()),
        ));
    }

    let mut cursor = 1;
    let time = f32::from_le_bytes(read_hex::<4>(token, bytes, &mut cursor)?);

    let value = if has_value {
        f32::from_le_bytes(read_hex::<4>(token, bytes, &mut cursor)?)
    } else {
        prev.value
    };

    let curve_type = if has_curve_type {
        read_hex::<1>(token, bytes, &mut cursor)?[0]
    } else {
        prev.curve_type.ok_or_else(|| {
            TimelineError::malformed(token, "curve type omitted but no previous keyframe")
        })?
    };

    Ok(KeyframeSample {
        time,
        value,
        curve_type,
    })
}

/// Decode a whole curve in stored order, replaying from [`KeyframeState::INITIAL`].
pub fn decode_curve<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<KeyframeSample>> {
    let mut state = KeyframeState::INITIAL;
    let mut samples = Vec::with_capacity(tokens.len());
    for token in tokens {
        let sample = decode_keyframe(token.as_ref(), state)?;
        state = KeyframeState::after(&sample);
        samples.push(sample);
    }
    Ok(samples)
}

/// Encode samples sequentially, starting from [`KeyframeState::INITIAL`].
pub fn encode_curve(samples: &[KeyframeSample]) -> Vec<String> {
    let mut state = KeyframeState::INITIAL;
    samples
        .iter()
        .map(|sample| {
            let token = encode_keyframe(*sample, state);
            state = KeyframeState::after(sample);
            token
        })
        .collect()
}

/// Two-key constant curve spanning `[0, length]`, as the plugin writes
/// freshly added targets: the first key has no predecessor.
pub fn flat_curve(length: f32, value: f32) -> Vec<String> {
    vec![
        encode_keyframe(
            KeyframeSample::new(0.0, value, DEFAULT_CURVE_TYPE),
            KeyframeState::UNSET,
        ),
        encode_keyframe(
            KeyframeSample::new(length, value, DEFAULT_CURVE_TYPE),
            KeyframeState::new(value, DEFAULT_CURVE_TYPE),
        ),
    ]
}

fn push_hex(out: &mut String, bytes: &[u8]) {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    for b in bytes {
        out.push(char::from(DIGITS[usize::from(b >> 4)]));
        out.push(char::from(DIGITS[usize::from(b & 0x0F)]));
    }
}

fn read_hex<const N: usize>(token: &str, bytes: &[u8], cursor: &mut usize) -> Result<[u8; N]> {
    let mut out = [0u8; N];
    for slot in out.iter_mut() {
        let hi = hex_digit(token, bytes[*cursor])?;
        let lo = hex_digit(token, bytes[*cursor + 1])?;
        *slot = (hi << 4) | lo;
        *cursor += 2;
    }
    Ok(out)
}

fn hex_digit(token: &str, c: u8) -> Result<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        _ => Err(TimelineError::malformed(
            token,
            format!("'{}' is not a hex digit", char::from(c)),
        )),
    }
}
