//! Association manifests: an ordered member list plus product metadata.
//!
//! The manifest is JSON shaped like
//!
//! ```json
//! { "asn_id": "a0001", "asn_pool": "pool",
//!   "products": [ { "name": "out", "members": [
//!       { "expname": "a.json", "exptype": "science", "group_id": "g1" } ] } ] }
//! ```
//!
//! Only the first product's members are managed; every other key is carried
//! through untouched in the `extra` maps.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// One entry of an association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// Source file path, relative to the association's base directory.
    pub expname: String,
    pub exptype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// Any other per-member keys (e.g. `tweakreg_catalog`).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Member {
    pub fn new(expname: impl Into<String>, exptype: impl Into<String>) -> Self {
        Self {
            expname: expname.into(),
            exptype: exptype.into(),
            group_id: None,
            extra: Map::new(),
        }
    }

    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    pub fn is_science(&self) -> bool {
        self.exptype.eq_ignore_ascii_case("science")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub members: Vec<Member>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Product {
    pub fn new(name: Option<String>, members: Vec<Member>) -> Self {
        Self {
            name,
            members,
            extra: Map::new(),
        }
    }
}

/// Parsed association manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asn_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asn_pool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    pub products: Vec<Product>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AssociationDescriptor {
    /// Single-product association over `members`.
    pub fn from_members(members: Vec<Member>) -> Self {
        Self {
            asn_id: None,
            asn_pool: None,
            table_name: None,
            products: vec![Product::new(None, members)],
            extra: Map::new(),
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let asn: Self =
            serde_json::from_str(s).map_err(|e| Error::AssociationFormat(e.to_string()))?;
        asn.validate()?;
        Ok(asn)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let asn: Self =
            serde_json::from_value(value).map_err(|e| Error::AssociationFormat(e.to_string()))?;
        asn.validate()?;
        Ok(asn)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json_str(&text).map_err(|e| match e {
            Error::AssociationFormat(msg) => {
                Error::AssociationFormat(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Every member needs a non-empty expname; at least one product is required.
    pub fn validate(&self) -> Result<()> {
        if self.products.is_empty() {
            return Err(Error::AssociationFormat(
                "association has no products".into(),
            ));
        }
        for (i, m) in self.members().iter().enumerate() {
            if m.expname.is_empty() {
                return Err(Error::AssociationFormat(format!(
                    "member {i} has an empty expname"
                )));
            }
        }
        Ok(())
    }

    /// Members of the first product, in manifest order.
    pub fn members(&self) -> &[Member] {
        self.products
            .first()
            .map(|p| p.members.as_slice())
            .unwrap_or(&[])
    }

    pub fn member(&self, index: usize) -> Option<&Member> {
        self.members().get(index)
    }

    pub fn len(&self) -> usize {
        self.members().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members().is_empty()
    }

    /// Resolve a member's source path against `base_dir` (absolute expnames are kept).
    pub fn member_path(&self, index: usize, base_dir: Option<&Path>) -> Option<PathBuf> {
        let member = self.member(index)?;
        let p = Path::new(&member.expname);
        Some(match base_dir {
            Some(dir) if p.is_relative() => dir.join(p),
            _ => p.to_path_buf(),
        })
    }

    /// Construction-time filtering: keep members whose exptype matches one of
    /// `exptypes` (case-insensitive), then truncate to `n_members`.
    pub fn filter_members(&mut self, exptypes: Option<&[String]>, n_members: Option<usize>) {
        let Some(product) = self.products.first_mut() else {
            return;
        };
        if let Some(wanted) = exptypes {
            product
                .members
                .retain(|m| wanted.iter().any(|w| w.eq_ignore_ascii_case(&m.exptype)));
        }
        if let Some(n) = n_members {
            product.members.truncate(n);
        }
    }

    pub(crate) fn members_mut(&mut self) -> &mut [Member] {
        self.products
            .first_mut()
            .map(|p| p.members.as_mut_slice())
            .unwrap_or(&mut [])
    }
}
