#![no_main]

use libfuzzer_sys::fuzz_target;
use pda_agent::Config;

fuzz_target!(|data: &[u8]| {
    if let Ok(raw) = std::str::from_utf8(data) {
        if let Ok(config) = toml::from_str::<Config>(raw) {
            // Validation must reject bad values, never panic on them
            let _ = config.validate();
        }
    }
});
