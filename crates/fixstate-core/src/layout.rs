use std::path::PathBuf;

/// Source-tree conventions of the application being installed.
///
/// All paths are relative to the application source root, except
/// `shared` destinations which are relative to the environment root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppLayout {
    /// File whose presence identifies an application source root.
    pub marker: PathBuf,
    /// Front controller template rewritten into `<target>/index.php`.
    pub entrypoint_template: PathBuf,
    pub compiler_config: PathBuf,
    /// Directory whose regular files are linked into `<target>/etc`.
    pub etc_dir: PathBuf,
    /// Files of `etc_dir` that are not linked.
    pub etc_excluded: Vec<String>,
    /// Template rendered into `<target>/etc/<local_config>`.
    pub local_config_template: PathBuf,
    pub local_config: String,
    /// Paths linked as-is: (source, destination).
    pub shared: Vec<(PathBuf, PathBuf)>,
}

impl AppLayout {
    pub fn magento1() -> Self {
        Self {
            marker: PathBuf::from("app/Mage.php"),
            entrypoint_template: PathBuf::from("index.php.sample"),
            compiler_config: PathBuf::from("includes/config.php"),
            etc_dir: PathBuf::from("app/etc"),
            etc_excluded: vec!["local.xml".to_owned()],
            local_config_template: PathBuf::from("app/etc/local.xml.template"),
            local_config: "local.xml".to_owned(),
            shared: vec![
                (PathBuf::from("app/etc/modules"), PathBuf::from("etc/modules")),
                (PathBuf::from("js"), PathBuf::from("js")),
                (PathBuf::from("skin"), PathBuf::from("skin")),
                (PathBuf::from(".htaccess"), PathBuf::from(".htaccess")),
            ],
        }
    }
}

impl Default for AppLayout {
    fn default() -> Self {
        Self::magento1()
    }
}
