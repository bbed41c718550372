//! Property-based bounds-safety coverage (specification §8, property 1):
//! for every fuzz input, no decoding path reads outside the input slice.
//! `ByteCursor` turns an out-of-bounds read into a `TruncatedData` error
//! rather than a panic, so the property under test here is narrower and
//! directly observable: feeding an arbitrary byte buffer through a public
//! decode entry point must return (`Ok` or `Err`), never panic.

use proptest::prelude::*;
use wevt_templates::{parse_crim_manifest, BinXmlReader};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn parse_crim_manifest_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..4096)) {
        let _ = parse_crim_manifest(&bytes);
    }

    #[test]
    fn binxml_read_fragment_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..4096)) {
        let _ = BinXmlReader::new(&bytes).read_fragment();
    }

    /// A buffer that at least starts with a plausible `CRIM` header (so
    /// most cases get past the signature check and exercise the offset
    /// arithmetic in `parse_provider`/`parse_provider_element` instead of
    /// bailing out on the first four bytes every time).
    #[test]
    fn parse_crim_manifest_with_crim_prefix_never_panics(
        size in any::<u32>(),
        major in any::<u16>(),
        minor in any::<u16>(),
        provider_count in 0u32..8,
        rest in prop::collection::vec(any::<u8>(), 0..4096),
    ) {
        let mut bytes = Vec::with_capacity(16 + rest.len());
        bytes.extend_from_slice(b"CRIM");
        bytes.extend_from_slice(&size.to_le_bytes());
        bytes.extend_from_slice(&major.to_le_bytes());
        bytes.extend_from_slice(&minor.to_le_bytes());
        bytes.extend_from_slice(&provider_count.to_le_bytes());
        bytes.extend_from_slice(&rest);
        let _ = parse_crim_manifest(&bytes);
    }
}
