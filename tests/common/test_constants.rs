//! Shared constants for integration tests.
//!
//! Integration tests are compiled as separate crates (one per top-level file in
//! `tests/`). Placing shared constants under `tests/common/` avoids creating an
//! additional integration test binary while still allowing reuse via:
//!
//! ```rust
//! #[path = "common/test_constants.rs"]
//! mod test_constants;
//! ```

/// Image used by fixtures that do not care which image they run.
pub const DEFAULT_IMAGE: &str = "nginx:1.27";

/// Manifest with two named entries and one unnamed entry.
pub const SAMPLE_MANIFEST: &str = "\
containers:
  - name: web
    image: nginx:1.27
    env:
      - name: PORT
        value: \"8080\"
  - name: cache
    image: redis:7
  - image: alpine:3.20
";
