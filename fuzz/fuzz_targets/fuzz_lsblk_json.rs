#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(devices) = ewfwizard::devices::parse_lsblk_json(text) {
            let _ = ewfwizard::devices::format_device_table(&devices);
        }
    }
});
