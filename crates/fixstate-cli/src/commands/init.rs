use super::{core_error, json_pretty, resolve_target, EXIT_SUCCESS};
use fixstate_core::Initializer;
use std::path::Path;

pub fn run(
    config: &Path,
    profile: &str,
    store: &str,
    scope: &str,
    json: bool,
) -> Result<u8, String> {
    let target = resolve_target(config, profile)?;
    let params = Initializer::new(&target, store, scope)
        .initialize()
        .map_err(|e| core_error(&e))?;
    if json {
        let payload = serde_json::json!({
            "target": target,
            "code": params.code,
            "scope": params.scope,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "{} now runs {} '{}'",
            target.display(),
            params.scope,
            params.code
        );
    }
    Ok(EXIT_SUCCESS)
}
