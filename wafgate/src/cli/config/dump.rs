use serde::Serialize;
use std::path::PathBuf;
use wafgate_core::WafConfig;

pub fn dump(path: PathBuf, json: bool, yaml: bool) -> anyhow::Result<()> {
    let cfg = WafConfig::from_file(&path)?;

    if yaml {
        println!("{}", render_yaml(&cfg)?);
    } else if json || !yaml {
        // default: json
        println!("{}", render_json(&cfg)?);
    }

    Ok(())
}

fn render_json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn render_yaml<T: Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_yaml::to_string(value)?)
}
