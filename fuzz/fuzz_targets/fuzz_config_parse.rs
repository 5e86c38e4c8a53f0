#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = toml::from_str::<sessiond::Config>(s) {
            // Validation must reject or accept without panicking.
            let _ = config.validate();
            let _ = config.sessions.sweep_policy();
            let _ = config.display.tz();
        }
    }
});
