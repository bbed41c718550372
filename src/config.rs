//! Caller-visible configuration surface (§10.3): renderer knobs and decoder
//! leniency, both exposed as small builder structs in the teacher's
//! `with_*`-method style (`tree_builder::TreeBuilder::with_writer`,
//! `xml_output::XmlOutput::with_writer`).

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::binxml::MAX_RECURSION_DEPTH;
#[cfg(test)]
use encoding::Encoding;

/// Output text width for a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputWidth {
    Utf8,
    Utf16,
}

/// Controls renderer-visible behavior: output width, cooperative
/// cancellation, the BinXml recursion-depth ceiling, and the codec used to
/// decode `AnsiString` substitution values (§10.3).
#[derive(Clone)]
pub struct RenderSettings {
    output_width: OutputWidth,
    abort: Option<Arc<AtomicBool>>,
    max_recursion_depth: u32,
    ansi_codec: encoding::EncodingRef,
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings {
            output_width: OutputWidth::Utf8,
            abort: None,
            max_recursion_depth: MAX_RECURSION_DEPTH,
            ansi_codec: encoding::all::WINDOWS_1252,
        }
    }
}

impl RenderSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_width(mut self, width: OutputWidth) -> Self {
        self.output_width = width;
        self
    }

    pub fn with_abort_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.abort = Some(flag);
        self
    }

    /// Overrides the codec `AnsiString` values are decoded with at render
    /// time. Defaults to Windows-1252, matching the teacher's own
    /// `value_variant.rs` use of the `encoding` crate.
    pub fn with_ansi_codec(mut self, codec: encoding::EncodingRef) -> Self {
        self.ansi_codec = codec;
        self
    }

    /// Lowers the recursion-depth ceiling. Values above the hard safety
    /// ceiling (`MAX_RECURSION_DEPTH`, 256) are clamped down to it; this
    /// knob can only make rendering stricter, never looser.
    pub fn with_max_recursion_depth(mut self, depth: u32) -> Self {
        self.max_recursion_depth = depth.min(MAX_RECURSION_DEPTH);
        self
    }

    pub fn output_width(&self) -> OutputWidth {
        self.output_width
    }

    pub fn max_recursion_depth(&self) -> u32 {
        self.max_recursion_depth
    }

    pub fn ansi_codec(&self) -> encoding::EncodingRef {
        self.ansi_codec
    }

    pub fn is_aborted(&self) -> bool {
        self.abort
            .as_ref()
            .map(|flag| flag.load(std::sync::atomic::Ordering::Relaxed))
            .unwrap_or(false)
    }
}

/// Controls descriptor-decoder leniency toward unrecognized element/map
/// table signatures (§10.3, §10.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownSignaturePolicy {
    /// Unrecognized tables are captured as an opaque blob rather than
    /// rejected, matching libfwevt's documented tolerance for
    /// vendor-specific extensions. Default.
    Capture,
    /// Unrecognized tables fail the whole decode with `Runtime::UnsupportedValue`.
    Reject,
}

#[derive(Debug, Clone, Copy)]
pub struct DecodeSettings {
    unknown_signature_policy: UnknownSignaturePolicy,
}

impl Default for DecodeSettings {
    fn default() -> Self {
        DecodeSettings {
            unknown_signature_policy: UnknownSignaturePolicy::Capture,
        }
    }
}

impl DecodeSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unknown_signature_policy(mut self, policy: UnknownSignaturePolicy) -> Self {
        self.unknown_signature_policy = policy;
        self
    }

    pub fn unknown_signature_policy(&self) -> UnknownSignaturePolicy {
        self.unknown_signature_policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_settings_clamp_recursion_depth_upward() {
        let settings = RenderSettings::new().with_max_recursion_depth(10_000);
        assert_eq!(settings.max_recursion_depth(), MAX_RECURSION_DEPTH);
    }

    #[test]
    fn render_settings_allow_lowering_recursion_depth() {
        let settings = RenderSettings::new().with_max_recursion_depth(4);
        assert_eq!(settings.max_recursion_depth(), 4);
    }

    #[test]
    fn decode_settings_default_to_capture() {
        assert_eq!(
            DecodeSettings::new().unknown_signature_policy(),
            UnknownSignaturePolicy::Capture
        );
    }

    #[test]
    fn render_settings_default_ansi_codec_is_windows_1252() {
        assert_eq!(
            RenderSettings::new().ansi_codec().name(),
            encoding::all::WINDOWS_1252.name()
        );
    }

    #[test]
    fn render_settings_ansi_codec_is_overridable() {
        let settings = RenderSettings::new().with_ansi_codec(encoding::all::ISO_8859_1);
        assert_eq!(settings.ansi_codec().name(), encoding::all::ISO_8859_1.name());
    }
}
