#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Runtime fuzzing stays conservative: small programs and a small
    // depth budget, so runaway recursion is cheap and must surface as
    // an error value, never a native fault.
    if data.len() > 4 * 1024 {
        return;
    }
    let src = String::from_utf8_lossy(data);
    let env = keva::default_env();
    let _ = keva::evaluate_with_options(&env, &src, &keva::ParseOptions::default(), 64);
});
