#![no_main]

use libfuzzer_sys::fuzz_target;
use pda_agent::config::EthicsConfig;
use pda_agent::ethics::create_ethics_filter;

// First line is the user input, the rest the model reply.
fuzz_target!(|data: &[u8]| {
    let lossy = String::from_utf8_lossy(data);
    let text: &str = &lossy;
    let (input, reply) = text.split_once('\n').unwrap_or((text, ""));
    let filter = create_ethics_filter(&EthicsConfig::default());
    let report = filter.apply_with_report(reply, input);
    assert!(report.text.starts_with(reply));
});
