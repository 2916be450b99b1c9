//! Hooks tying [`JsonModel`] files to a model library.

use std::path::Path;

use serde_json::Value;

use modelshelf_core::error::{Error, Result};
use modelshelf_core::model::{DataModel, ModelFormat};

use crate::model::JsonModel;

pub const DEFAULT_OBSERVATORY: &str = "jwst";

#[derive(Debug, Clone)]
pub struct JsonFormat {
    observatory: String,
}

impl Default for JsonFormat {
    fn default() -> Self {
        Self::new(DEFAULT_OBSERVATORY)
    }
}

impl JsonFormat {
    pub fn new(observatory: impl Into<String>) -> Self {
        Self {
            observatory: observatory.into(),
        }
    }
}

/// `meta.group_id` if present, else `jw{program}{observation}{visit}` when
/// all three are set.
fn group_id_of(model: &JsonModel) -> Option<String> {
    if let Some(id) = model.meta_str("group_id") {
        return Some(id.to_string());
    }
    let part = |key: &str| match model.meta(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    Some(format!(
        "jw{}{}{}",
        part("program")?,
        part("observation")?,
        part("visit")?
    ))
}

impl ModelFormat for JsonFormat {
    type Model = JsonModel;

    fn crds_observatory(&self) -> &str {
        &self.observatory
    }

    fn open_model(&self, path: &Path) -> Result<JsonModel> {
        JsonModel::open(path)
    }

    fn filename_to_group_id(&self, path: &Path) -> Result<String> {
        let model = JsonModel::open(path)?;
        group_id_of(&model)
            .ok_or_else(|| Error::NoGroupId(format!("{} has no group id", path.display())))
    }

    fn model_to_group_id(&self, model: &JsonModel) -> Result<String> {
        group_id_of(model).ok_or_else(|| {
            Error::NoGroupId(format!("{} has no group id", self.model_to_filename(model)))
        })
    }
}
