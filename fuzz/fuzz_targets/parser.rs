#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Avoid pathological allocations in the harness itself; libFuzzer will still mutate below this.
    if data.len() > 64 * 1024 {
        return;
    }
    let src = String::from_utf8_lossy(data);
    let env = keva::default_env();
    let parsed = keva::parse(&env, &src);

    // Malformed input degrades to diagnostics, and every diagnostic
    // must render against the original text with a visible span.
    for error in &parsed.errors {
        assert!(error.length > 0);
    }
    let _ = keva::render_diagnostics(&src, &parsed.errors);
});
