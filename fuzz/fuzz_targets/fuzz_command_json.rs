//! Fuzz target: `CommandRequest::from_json`
//!
//! Drives arbitrary web-socket frames into the ingress parser and asserts
//! that it never panics and that whatever it accepts stays inside the
//! documented limits.
//!
//! cargo fuzz run fuzz_command_json

#![no_main]

use libfuzzer_sys::fuzz_target;
use scanrig::app::commands::{CommandRequest, PROJECT_NAME_CAPACITY};
use scanrig::config::validate_config;

fuzz_target!(|data: &[u8]| {
    match CommandRequest::from_json(data) {
        Ok(CommandRequest::SetCommand { command, .. }) => {
            assert!((command as u8) < 8, "wire code out of range");
        }
        Ok(CommandRequest::SetProjectName(name)) => {
            assert!(name.len() <= PROJECT_NAME_CAPACITY);
        }
        Ok(CommandRequest::UpdateConfig(cfg)) => {
            // Must not panic whatever the values; rejection is fine.
            let _ = validate_config(&cfg);
            let _ = cfg.valid_range();
        }
        Ok(CommandRequest::SaveConfig) | Err(_) => {}
    }
});
