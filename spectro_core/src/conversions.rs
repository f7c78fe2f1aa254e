//! `From` implementations bridging `spectro_config` types to `spectro_core` types.

use std::time::Duration;

use spectro_config::FrameConvention;

use crate::frame::FramePolicy;
use crate::orchestrator::OrchestratorCfg;

// ── FramePolicy ──────────────────────────────────────────────────────────────

impl From<&spectro_config::FrameCfg> for FramePolicy {
    fn from(c: &spectro_config::FrameCfg) -> Self {
        match c.convention {
            FrameConvention::Untagged => FramePolicy::Untagged,
            FrameConvention::Tagged => FramePolicy::Tagged { tag: c.tag.clone() },
        }
    }
}

// ── OrchestratorCfg ──────────────────────────────────────────────────────────

impl From<&spectro_config::Config> for OrchestratorCfg {
    fn from(c: &spectro_config::Config) -> Self {
        Self {
            policy: FramePolicy::from(&c.frame),
            reads_per_sample: c.sampling.reads_per_sample,
            read_timeout: Duration::from_millis(c.serial.read_timeout_ms),
            idle_reset: (c.sampling.idle_reset_ms > 0)
                .then(|| Duration::from_millis(c.sampling.idle_reset_ms)),
            reply_confidence: c.reply.confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: &str = r#"
[models]
juice = "j.json"
concentration = "c.json"
"#;

    #[test]
    fn defaults_map_to_untagged_without_idle_reset() {
        let cfg = spectro_config::load_toml(MIN).unwrap();
        let o = OrchestratorCfg::from(&cfg);
        assert_eq!(o.policy, FramePolicy::Untagged);
        assert_eq!(o.reads_per_sample, 5);
        assert_eq!(o.read_timeout, Duration::from_millis(1000));
        assert_eq!(o.idle_reset, None);
        assert!(o.reply_confidence);
    }

    #[test]
    fn tagged_convention_carries_tag() {
        let toml = format!(
            "{MIN}\n[frame]\nconvention = \"tagged\"\n\n[sampling]\nreads_per_sample = 3\nidle_reset_ms = 1500\n"
        );
        let cfg = spectro_config::load_toml(&toml).unwrap();
        let o = OrchestratorCfg::from(&cfg);
        assert_eq!(
            o.policy,
            FramePolicy::Tagged {
                tag: spectro_config::DEFAULT_FRAME_TAG.to_string()
            }
        );
        assert_eq!(o.reads_per_sample, 3);
        assert_eq!(o.idle_reset, Some(Duration::from_millis(1500)));
    }
}
