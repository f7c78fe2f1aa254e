#![no_main]
use libfuzzer_sys::fuzz_target;
use spectro_core::{CHANNELS, FramePolicy, parse_line};

fuzz_target!(|data: &str| {
    let tagged = FramePolicy::Tagged {
        tag: spectro_config::DEFAULT_FRAME_TAG.to_string(),
    };
    for policy in [FramePolicy::Untagged, tagged] {
        if let Some(frame) = parse_line(data, &policy) {
            assert_eq!(frame.width(), CHANNELS);
            assert!(frame.values().iter().all(|v| v.is_finite()));
        }
    }
});
