//! API documentation metadata served at `/apidocs.json`.

use serde::{Deserialize, Serialize};

use crate::registry::module_base_path;
use crate::version;

pub const APIDOCS_PATH: &str = "/apidocs.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiDocs {
    pub title: String,
    pub description: String,
    pub version: String,
    pub license: License,
    /// Base path of every HTTP module.
    pub paths: Vec<String>,
}

impl ApiDocs {
    pub fn new<'a>(app_name: &str, modules: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            title: app_name.to_string(),
            description: format!("HTTP API of the {} service", app_name),
            version: version::short().to_string(),
            license: License {
                name: "MIT".into(),
                url: "http://mit.org".into(),
            },
            paths: modules
                .into_iter()
                .map(|module| module_base_path(app_name, module))
                .collect(),
        }
    }
}
