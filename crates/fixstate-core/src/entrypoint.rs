//! Front controller rewriting for installed environments.
//!
//! The application's `index.php.sample` loads its compiler config and
//! bootstrap file relative to the document root. The environment lives
//! elsewhere, so both are pointed at absolute source paths, and the tail of
//! the script (from `umask(0);` on) is replaced by a stanza that runs the
//! application with the environment's run params.

use crate::layout::AppLayout;
use crate::CoreError;
use fixstate_schema::PARAMS_FILENAME;
use std::path::Path;

const TAIL_MARKER: &str = "umask(0);";

fn run_params_stanza() -> String {
    format!(
        r#"umask(0);

$paramsFilename = '{PARAMS_FILENAME}';
if (file_exists($paramsFilename)) {{
    $params = json_decode(file_get_contents($paramsFilename), true);
    Mage::run($params['code'], $params['type'], $params['options']);
}} else {{
    die("Cannot run test instance without run params.");
}}
"#
    )
}

/// Rewrite the entrypoint template for an environment backed by `source_root`.
pub fn rewrite_entrypoint(
    template: &str,
    source_root: &Path,
    layout: &AppLayout,
) -> Result<String, CoreError> {
    let compiler = layout.compiler_config.display();
    let marker = layout.marker.display();
    let mut index = template
        .replace(
            &format!("$compilerConfig = '{compiler}';"),
            &format!(
                "$compilerConfig = '{}';",
                source_root.join(&layout.compiler_config).display()
            ),
        )
        .replace(
            &format!("$mageFilename = '{marker}';"),
            &format!(
                "$mageFilename = '{}';",
                source_root.join(&layout.marker).display()
            ),
        );

    let Some(tail) = index.find(TAIL_MARKER) else {
        return Err(CoreError::InstallFailed(format!(
            "entrypoint template has no '{TAIL_MARKER}' line to replace"
        )));
    };
    index.truncate(tail);
    index.push_str(&run_params_stanza());
    Ok(index)
}
