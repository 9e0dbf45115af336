use std::path::Path;

use anyhow::Result;

use crate::agents::memory::load_event_set;
use crate::config::RuntimeConfig;
use crate::provider::{API_KEY_ENV, env_present, validate_model};

pub fn run_doctor(cfg: &RuntimeConfig) -> Result<()> {
    println!(
        "Active profile: '{}' (config: {})",
        cfg.profile, cfg.config_path
    );

    println!("Provider environment check:");
    let key_status = if env_present(API_KEY_ENV) {
        "set"
    } else {
        "missing"
    };
    println!("- {API_KEY_ENV}: {key_status}");
    if key_status == "missing" {
        println!("Tip: export {API_KEY_ENV}='your-key-here' before run, monitor or serve");
    }

    match validate_model(&cfg.model) {
        Ok(()) => println!("Model: {} (ok) via {}", cfg.model, cfg.api_base_url),
        Err(err) => println!("Model: {} ({err})", cfg.model),
    }
    println!(
        "Generation: timeout_secs={} analyze_matches={}",
        cfg.generation_timeout_secs, cfg.analyze_matches
    );

    let set = load_event_set(Path::new(&cfg.data_path));
    match set.unavailable {
        Some(err) => println!("Birthday data: {} ({err})", cfg.data_path),
        None => println!(
            "Birthday data: {} (birthdays={} other_events={} skipped={})",
            cfg.data_path,
            set.events.len(),
            set.other_events,
            set.skipped_records
        ),
    }

    println!("Monitor: poll_interval_secs={}", cfg.poll_interval_secs);
    println!(
        "Telemetry: enabled={} path={}",
        cfg.telemetry_enabled, cfg.telemetry_path
    );

    Ok(())
}
