//! JSON-backed data model.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use modelshelf_core::error::{Error, Result};
use modelshelf_core::model::{CrdsParameters, DataModel};

/// On-disk layout: `{"meta": {...}, "data": ...}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonModel {
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl JsonModel {
    pub fn new(filename: impl Into<String>) -> Self {
        let mut meta = Map::new();
        meta.insert("filename".into(), Value::String(filename.into()));
        Self {
            meta,
            data: Value::Null,
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn open(path: &Path) -> Result<Self> {
        let f = File::open(path).map_err(|e| Error::io(path, e))?;
        let model: JsonModel = serde_json::from_reader(BufReader::new(f))
            .map_err(|e| Error::Model(format!("{}: {e}", path.display())))?;
        tracing::trace!(path = %path.display(), "opened json model");
        Ok(model)
    }
}

impl DataModel for JsonModel {
    fn meta(&self, key: &str) -> Option<&Value> {
        self.meta.get(key)
    }

    fn set_meta(&mut self, key: &str, value: Value) {
        self.meta.insert(key.to_string(), value);
    }

    fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let f = File::create(path).map_err(|e| Error::io(path, e))?;
        let mut writer = BufWriter::new(f);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush().map_err(|e| Error::io(path, e))?;
        Ok(())
    }

    /// Metadata flattened to dotted keys under `meta.`; the payload is left out.
    fn crds_parameters(&self) -> CrdsParameters {
        let mut out = CrdsParameters::new();
        flatten_into("meta", &self.meta, &mut out);
        out
    }
}

fn flatten_into(prefix: &str, map: &Map<String, Value>, out: &mut CrdsParameters) {
    for (key, value) in map {
        let name = format!("{prefix}.{key}");
        match value {
            Value::Object(inner) => flatten_into(&name, inner, out),
            other => {
                out.insert(name, other.clone());
            }
        }
    }
}
