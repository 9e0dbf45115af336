use anyhow::Result;

use crate::config::{ProfilesFile, RuntimeConfig};

pub fn run_profiles_list(profiles: &ProfilesFile, cfg: &RuntimeConfig) -> Result<()> {
    println!("Configured profiles (active='{}'):", cfg.profile);
    for (marker, name, source) in profile_listing(profiles, &cfg.profile) {
        println!("{marker} {name} ({source})");
    }
    Ok(())
}

/// `default` is always listed, marked implicit unless the file defines it.
fn profile_listing(profiles: &ProfilesFile, active: &str) -> Vec<(char, String, &'static str)> {
    let mut names = profiles.profiles.keys().cloned().collect::<Vec<String>>();
    if !names.iter().any(|name| name == "default") {
        names.push("default".to_string());
    }
    names.sort();

    names
        .into_iter()
        .map(|name| {
            let marker = if name == active { '*' } else { ' ' };
            let source = if profiles.profiles.contains_key(&name) {
                "configured"
            } else {
                "implicit"
            };
            (marker, name, source)
        })
        .collect()
}

pub fn run_profiles_show(cfg: &RuntimeConfig) -> Result<()> {
    println!("Active profile: {}", cfg.profile);
    println!("Config path: {}", cfg.config_path);
    println!("Model: {}", cfg.model);
    println!("API base URL: {}", cfg.api_base_url);
    println!("Data path: {}", cfg.data_path);
    println!("Generation timeout (secs): {}", cfg.generation_timeout_secs);
    println!("Poll interval (secs): {}", cfg.poll_interval_secs);
    println!("Analyze matches: {}", cfg.analyze_matches);
    println!("Telemetry enabled: {}", cfg.telemetry_enabled);
    println!("Telemetry path: {}", cfg.telemetry_path);
    Ok(())
}
