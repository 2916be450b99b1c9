//! Data-model collaborator interfaces.
//!
//! The library never reads or writes model files itself. A `ModelFormat`
//! supplies open/derive hooks and its `Model` type knows how to save itself.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::{Map, Value};

use crate::association::{AssociationDescriptor, Member};
use crate::error::Result;

/// Header-like parameter set used for reference-file resolution.
pub type CrdsParameters = BTreeMap<String, Value>;

/// Filename used for a model whose metadata carries none.
pub const DEFAULT_MODEL_FILENAME: &str = "model.json";

/// Exposure type assumed for models that do not declare one.
pub const DEFAULT_EXPTYPE: &str = "SCIENCE";

/// A loaded data model.
pub trait DataModel {
    /// Top-level metadata value for `key`.
    fn meta(&self, key: &str) -> Option<&Value>;

    fn set_meta(&mut self, key: &str, value: Value);

    /// Persist the full model to `path`, replacing any existing file.
    fn save(&self, path: &Path) -> Result<()>;

    fn crds_parameters(&self) -> CrdsParameters;

    fn meta_str(&self, key: &str) -> Option<&str> {
        self.meta(key).and_then(Value::as_str)
    }
}

/// Format-specific hooks for one family of data models.
pub trait ModelFormat {
    type Model: DataModel;

    /// Observatory name used for CRDS lookups.
    fn crds_observatory(&self) -> &str;

    fn open_model(&self, path: &Path) -> Result<Self::Model>;

    fn load_asn(&self, path: &Path) -> Result<AssociationDescriptor> {
        AssociationDescriptor::from_path(path)
    }

    /// Group id for a file without building a full model.
    ///
    /// Return `Error::NoGroupId` to request the default id.
    fn filename_to_group_id(&self, path: &Path) -> Result<String>;

    /// Group id of a loaded model; `Error::NoGroupId` requests the default id.
    fn model_to_group_id(&self, model: &Self::Model) -> Result<String>;

    fn model_to_filename(&self, model: &Self::Model) -> String {
        model
            .meta_str("filename")
            .unwrap_or(DEFAULT_MODEL_FILENAME)
            .to_string()
    }

    fn model_to_exptype(&self, model: &Self::Model) -> String {
        model
            .meta_str("exptype")
            .unwrap_or(DEFAULT_EXPTYPE)
            .to_string()
    }

    /// Stamp association-level facts onto a model loaded for `member`.
    fn assign_member_to_model(
        &self,
        model: &mut Self::Model,
        member: &Member,
        asn: &AssociationDescriptor,
    ) {
        if let Some(group_id) = &member.group_id {
            model.set_meta("group_id", Value::from(group_id.as_str()));
        }
        model.set_meta("exptype", Value::from(member.exptype.as_str()));
        if let Some(catalog) = member.extra.get("tweakreg_catalog") {
            model.set_meta("tweakreg_catalog", catalog.clone());
        }

        let mut asn_meta = match model.meta("asn") {
            Some(Value::Object(existing)) => existing.clone(),
            _ => Map::new(),
        };
        asn_meta.insert(
            "table_name".into(),
            Value::from(asn.table_name.clone().unwrap_or_default()),
        );
        asn_meta.insert(
            "pool_name".into(),
            Value::from(asn.asn_pool.clone().unwrap_or_default()),
        );
        model.set_meta("asn", Value::Object(asn_meta));
    }
}
