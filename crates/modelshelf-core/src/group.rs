//! Group index: group id -> member indices, derived once from the association.

use std::collections::HashMap;
use std::path::Path;

use crate::association::AssociationDescriptor;
use crate::error::Result;
use crate::model::ModelFormat;

/// Default group id for the member at `index` when none can be derived.
pub fn default_group_id(index: usize) -> String {
    format!("exposure{:04}", index + 1)
}

/// Fill in `group_id` for every member that lacks one.
///
/// Uses `ModelFormat::filename_to_group_id` (no model open); a `NoGroupId`
/// answer falls back to [`default_group_id`]. Only the in-memory descriptor is
/// updated; the manifest on disk is never rewritten.
pub fn resolve_group_ids<F: ModelFormat + ?Sized>(
    asn: &mut AssociationDescriptor,
    base_dir: Option<&Path>,
    format: &F,
) -> Result<()> {
    for (index, member) in asn.members_mut().iter_mut().enumerate() {
        if member.group_id.is_some() {
            continue;
        }
        let path = match base_dir {
            Some(dir) if Path::new(&member.expname).is_relative() => dir.join(&member.expname),
            _ => Path::new(&member.expname).to_path_buf(),
        };
        let group_id = match format.filename_to_group_id(&path) {
            Ok(id) => id,
            Err(e) if e.is_no_group_id() => default_group_id(index),
            Err(e) => return Err(e),
        };
        member.group_id = Some(group_id);
    }
    Ok(())
}

/// Read-only partition of `0..len` by group id.
///
/// Groups keep first-seen order; indices within a group are ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupIndex {
    groups: Vec<(String, Vec<usize>)>,
    lookup: HashMap<String, usize>,
    member_groups: Vec<usize>,
}

impl GroupIndex {
    /// Build from one group id per member index.
    pub fn from_group_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
        let mut lookup = HashMap::new();
        let mut member_groups = Vec::new();
        for (index, id) in ids.into_iter().enumerate() {
            let id = id.into();
            let slot = match lookup.get(&id) {
                Some(&slot) => slot,
                None => {
                    lookup.insert(id.clone(), groups.len());
                    groups.push((id, Vec::new()));
                    groups.len() - 1
                }
            };
            groups[slot].1.push(index);
            member_groups.push(slot);
        }
        Self {
            groups,
            lookup,
            member_groups,
        }
    }

    /// Build from a descriptor whose group ids are already resolved; members
    /// still lacking one get [`default_group_id`].
    pub fn from_association(asn: &AssociationDescriptor) -> Self {
        Self::from_group_ids(
            asn.members()
                .iter()
                .enumerate()
                .map(|(i, m)| m.group_id.clone().unwrap_or_else(|| default_group_id(i))),
        )
    }

    /// Distinct group ids in first-seen order.
    pub fn names(&self) -> Vec<&str> {
        self.groups.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn indices(&self, name: &str) -> Option<&[usize]> {
        self.lookup
            .get(name)
            .map(|&slot| self.groups[slot].1.as_slice())
    }

    /// `(group id, member indices)` pairs in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[usize])> {
        self.groups
            .iter()
            .map(|(name, idx)| (name.as_str(), idx.as_slice()))
    }

    /// Group id of the member at `index`.
    pub fn group_of(&self, index: usize) -> Option<&str> {
        self.member_groups
            .get(index)
            .map(|&slot| self.groups[slot].0.as_str())
    }

    /// Number of distinct groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn member_count(&self) -> usize {
        self.member_groups.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::association::Member;

    #[test]
    fn partitions_every_index_exactly_once() {
        let idx = GroupIndex::from_group_ids(["b", "a", "b", "c", "a"]);
        assert_eq!(idx.names(), ["b", "a", "c"]);
        assert_eq!(idx.indices("b").unwrap(), [0, 2]);
        assert_eq!(idx.indices("a").unwrap(), [1, 4]);
        assert_eq!(idx.indices("c").unwrap(), [3]);
        assert!(idx.indices("zzz").is_none());

        let mut seen: Vec<usize> = idx.iter().flat_map(|(_, i)| i.iter().copied()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..5).collect::<Vec<_>>());
        assert_eq!(idx.member_count(), 5);
    }

    #[test]
    fn group_of_maps_back_to_name() {
        let idx = GroupIndex::from_group_ids(["x", "y", "x"]);
        assert_eq!(idx.group_of(2), Some("x"));
        assert_eq!(idx.group_of(1), Some("y"));
        assert_eq!(idx.group_of(3), None);
    }

    #[test]
    fn default_ids_are_unique_and_one_based() {
        assert_eq!(default_group_id(0), "exposure0001");
        assert_eq!(default_group_id(41), "exposure0042");

        let asn = AssociationDescriptor::from_members(vec![
            Member::new("a.json", "science"),
            Member::new("b.json", "science").with_group_id("g"),
            Member::new("c.json", "science"),
        ]);
        let idx = GroupIndex::from_association(&asn);
        assert_eq!(idx.names(), ["exposure0001", "g", "exposure0003"]);
    }

    #[test]
    fn empty_association_has_no_groups() {
        let idx = GroupIndex::from_group_ids(Vec::<String>::new());
        assert!(idx.is_empty());
        assert_eq!(idx.names().len(), 0);
    }
}
