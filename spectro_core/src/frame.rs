//! Line framing for the sensor link.
//!
//! A malformed line is ordinary noise on a live serial link (boot banners,
//! partial lines after a reset, debug prints), so parsing never errors: it
//! either yields a frame or nothing.

/// Channel count every accepted frame must have.
pub const CHANNELS: usize = spectro_config::CHANNELS;

/// How the payload of a line is located and which numeric literals it may hold.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FramePolicy {
    /// Comma-separated numbers with an optional `TAG:` prefix; floats allowed.
    #[default]
    Untagged,
    /// The line must start with `tag`; payload is comma-separated integers.
    Tagged { tag: String },
}

/// One parsed reading, channel order preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame(Vec<f64>);

impl RawFrame {
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn width(&self) -> usize {
        self.0.len()
    }

    pub fn into_values(self) -> Vec<f64> {
        self.0
    }
}

impl From<Vec<f64>> for RawFrame {
    fn from(v: Vec<f64>) -> Self {
        RawFrame(v)
    }
}

/// Parse one transport line under `policy`.
///
/// Returns `None` unless exactly [`CHANNELS`] finite numbers remain after the
/// prefix is stripped and empty tokens are dropped.
pub fn parse_line(line: &str, policy: &FramePolicy) -> Option<RawFrame> {
    let s = line.trim();
    if s.is_empty() {
        return None;
    }

    let values = match policy {
        FramePolicy::Untagged => {
            let payload = after_first_colon(s);
            parse_tokens(payload, |t| t.parse::<f64>().ok())?
        }
        FramePolicy::Tagged { tag } => {
            let payload = s.strip_prefix(tag.as_str())?.trim();
            parse_tokens(payload, |t| t.parse::<i64>().ok().map(|v| v as f64))?
        }
    };

    if values.len() != CHANNELS {
        return None;
    }
    Some(RawFrame(values))
}

#[inline]
fn after_first_colon(s: &str) -> &str {
    match s.split_once(':') {
        Some((_, rest)) => rest.trim(),
        None => s,
    }
}

fn parse_tokens(payload: &str, parse: impl Fn(&str) -> Option<f64>) -> Option<Vec<f64>> {
    let mut out = Vec::with_capacity(CHANNELS);
    for token in payload.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        // Bail early on long garbage lines
        if out.len() == CHANNELS {
            return None;
        }
        let v = parse(token)?;
        if !v.is_finite() {
            return None;
        }
        out.push(v);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn tagged() -> FramePolicy {
        FramePolicy::Tagged {
            tag: "SORTED(405-855nm):".to_string(),
        }
    }

    #[test]
    fn untagged_floats_with_spaces() {
        let f = parse_line(
            " 1.5, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12.25 \r\n",
            &FramePolicy::Untagged,
        )
        .unwrap();
        assert_eq!(f.width(), 12);
        assert_eq!(f.values()[0], 1.5);
        assert_eq!(f.values()[11], 12.25);
    }

    #[test]
    fn untagged_strips_any_prefix_tag() {
        let f = parse_line("RAW:1,2,3,4,5,6,7,8,9,10,11,12", &FramePolicy::Untagged).unwrap();
        assert_eq!(f.values(), &[1., 2., 3., 4., 5., 6., 7., 8., 9., 10., 11., 12.]);
    }

    #[test]
    fn tagged_firmware_line() {
        let line = "SORTED(405-855nm): 914,4652,6628,7001,7123,6999,6400,5300,4100,3000,2000,1033";
        let f = parse_line(line, &tagged()).unwrap();
        assert_eq!(f.values()[0], 914.0);
        assert_eq!(f.values()[11], 1033.0);
    }

    #[test]
    fn tag_with_inner_colon_keeps_whole_prefix() {
        let policy = FramePolicy::Tagged {
            tag: "CH:A:".to_string(),
        };
        let f = parse_line("CH:A: 1,2,3,4,5,6,7,8,9,10,11,12", &policy).unwrap();
        assert_eq!(f.values()[0], 1.0);
        assert_eq!(f.values()[11], 12.0);
        assert_eq!(parse_line("CH:B: 1,2,3,4,5,6,7,8,9,10,11,12", &policy), None);
    }

    #[test]
    fn empty_tokens_are_dropped() {
        let f = parse_line("1,2,,3,4,5,6,7,8,9,10,11,12,", &FramePolicy::Untagged);
        assert!(f.is_some());
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("BAD,DATA")]
    #[case("1,2,3,4,5,6,7,8,9,10,11")]
    #[case("1,2,3,4,5,6,7,8,9,10,11,12,13")]
    #[case("1,2,3,4,5,6,7,8,9,10,11,x")]
    #[case("1,2,3,4,5,6,7,8,9,10,11,inf")]
    #[case("1,2,3,4,5,6,7,8,9,10,11,NaN")]
    #[case("AS7343 ready")]
    fn untagged_rejects(#[case] line: &str) {
        assert_eq!(parse_line(line, &FramePolicy::Untagged), None);
    }

    #[rstest]
    #[case("1,2,3,4,5,6,7,8,9,10,11,12")]
    #[case("RAW:1,2,3,4,5,6,7,8,9,10,11,12")]
    #[case("SORTED(405-855nm): 1,2,3,4,5,6,7,8,9,10,11,12.5")]
    #[case("SORTED(405-855nm): 1,2,3")]
    fn tagged_rejects(#[case] line: &str) {
        assert_eq!(parse_line(line, &tagged()), None);
    }
}
