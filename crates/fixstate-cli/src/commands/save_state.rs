use super::{check_prereqs, core_error, json_pretty, spin_fail, spin_ok, spinner, style_path};
use super::{resolve_target, EXIT_SUCCESS};
use fixstate_core::Initializer;
use fixstate_store::Partition;
use std::fs;
use std::path::{Path, PathBuf};

/// `states/<YYYY-MM-DD-HH-MM-SS>.state` in the working directory.
pub fn default_state_name() -> PathBuf {
    PathBuf::from(format!(
        "states/{}.state",
        chrono::Local::now().format("%Y-%m-%d-%H-%M-%S")
    ))
}

pub fn run(config: &Path, profile: &str, name: Option<&Path>, json: bool) -> Result<u8, String> {
    let target = resolve_target(config, profile)?;
    let initializer = Initializer::for_root(&target);
    check_prereqs(&initializer)?;

    let name = name.map_or_else(default_state_name, Path::to_path_buf);
    if let Some(parent) = name.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| format!("failed to create '{}': {e}", parent.display()))?;
    }

    let pb = (!json).then(|| spinner("saving state..."));
    let archive = initializer.save_state(&name).map_err(|e| {
        if let Some(pb) = &pb {
            spin_fail(pb, "save failed");
        }
        core_error(&e)
    })?;
    if let Some(pb) = &pb {
        spin_ok(pb, "state saved");
    }

    if json {
        let partitions: Vec<&str> = Partition::ALL
            .into_iter()
            .filter(|p| archive.contains(*p))
            .map(Partition::as_str)
            .collect();
        let payload = serde_json::json!({
            "target": target,
            "state": name,
            "partitions": partitions,
            "entries": archive.entries().len(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("state has been successfully saved to:");
        println!("{}", style_path(&name));
    }
    Ok(EXIT_SUCCESS)
}
