use super::{check_prereqs, core_error, json_pretty, spin_fail, spin_ok, spinner, style_path};
use super::{resolve_target, EXIT_SUCCESS, STATE_ERROR_PREFIX};
use fixstate_core::Initializer;
use std::path::Path;

pub fn run(name: &Path, config: &Path, profile: &str, json: bool) -> Result<u8, String> {
    let target = resolve_target(config, profile)?;
    if !name.is_file() {
        return Err(format!(
            "{STATE_ERROR_PREFIX} '{}' is not an existing state archive",
            name.display()
        ));
    }
    let initializer = Initializer::for_root(&target);
    check_prereqs(&initializer)?;

    let pb = (!json).then(|| spinner("restoring state..."));
    initializer.restore_state(name).map_err(|e| {
        if let Some(pb) = &pb {
            spin_fail(pb, "restore failed");
        }
        core_error(&e)
    })?;
    if let Some(pb) = &pb {
        spin_ok(pb, "state restored");
    }

    if json {
        let payload = serde_json::json!({
            "target": target,
            "state": name,
            "restored": true,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("state has been successfully restored from:");
        println!("{}", style_path(name));
    }
    Ok(EXIT_SUCCESS)
}
