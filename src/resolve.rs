use crate::cluster::DuplicateGroup;
use crate::hash::SkippedImage;
use crate::photo::Photo;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Final outcome of a scan: duplicate groups in claimant order, each with
/// one keeper and the rest flagged for deletion.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanResult {
    pub deletions_count: usize,
    #[serde(serialize_with = "serialize_groups")]
    pub groups: Vec<DuplicateGroup>,
    pub skipped: Vec<SkippedImage>,
}

fn serialize_groups<S: Serializer>(groups: &[DuplicateGroup], s: S) -> Result<S::Ok, S::Error> {
    let mut map = s.serialize_map(Some(groups.len()))?;
    for group in groups {
        map.serialize_entry(&group.key, &group.photos)?;
    }
    map.end()
}

/// Pick the largest photo of each group as keeper and flag the rest.
/// Ties go to whichever photo came first. Returns the number flagged.
pub fn resolve_groups(groups: &mut [DuplicateGroup]) -> usize {
    let mut flagged = 0;
    for group in groups.iter_mut() {
        group.photos.sort_by(|a, b| b.size().cmp(&a.size()));
        for (i, photo) in group.photos.iter_mut().enumerate() {
            let delete = i > 0;
            photo.set_marked(delete);
            if delete {
                flagged += 1;
            }
        }
        if let Some(keeper) = group.photos.first() {
            log::debug!(
                "Group {}: keeping {}, {} to delete",
                group.key,
                keeper.name(),
                group.photos.len() - 1
            );
        }
    }
    flagged
}

impl ScanResult {
    pub fn new(mut groups: Vec<DuplicateGroup>, skipped: Vec<SkippedImage>) -> Self {
        let deletions_count = resolve_groups(&mut groups);
        Self {
            deletions_count,
            groups,
            skipped,
        }
    }

    pub fn group(&self, key: &str) -> Option<&DuplicateGroup> {
        self.groups.iter().find(|g| g.key == key)
    }

    /// Flip the deletion flag of one member and keep `deletions_count` in
    /// step. Returns the new flag, or `None` if there is no such member.
    pub fn toggle(&mut self, key: &str, index: usize) -> Option<bool> {
        let photo = self
            .groups
            .iter_mut()
            .find(|g| g.key == key)?
            .photos
            .get_mut(index)?;
        let delete = !photo.is_marked();
        photo.set_marked(delete);
        if delete {
            self.deletions_count += 1;
        } else {
            self.deletions_count = self.deletions_count.saturating_sub(1);
        }
        Some(delete)
    }

    /// Every photo currently flagged for deletion.
    pub fn marked(&self) -> impl Iterator<Item = &Photo> {
        self.groups
            .iter()
            .flat_map(|g| g.photos.iter())
            .filter(|p| p.is_marked())
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photo::{ImageFile, PerceptualHash};

    fn photo(name: &str, size: u64) -> Photo {
        Photo::new(
            ImageFile::new(format!("/photos/{}", name), size),
            PerceptualHash::from_bytes(&[0]),
        )
    }

    fn group(key: &str, photos: Vec<Photo>) -> DuplicateGroup {
        DuplicateGroup {
            key: key.to_string(),
            photos,
        }
    }

    #[test]
    fn test_largest_is_kept() {
        let result = ScanResult::new(
            vec![group("k", vec![photo("a.jpg", 100), photo("b.jpg", 200)])],
            Vec::new(),
        );

        let g = result.group("k").unwrap();
        assert_eq!(g.photos[0].name(), "b.jpg");
        assert!(!g.photos[0].is_marked());
        assert!(g.photos[1].is_marked());
        assert_eq!(g.keeper().unwrap().name(), "b.jpg");
        assert_eq!(result.deletions_count, 1);
    }

    #[test]
    fn test_size_ties_keep_first_encountered() {
        let result = ScanResult::new(
            vec![group(
                "k",
                vec![photo("first.jpg", 10), photo("second.jpg", 10), photo("small.jpg", 5)],
            )],
            Vec::new(),
        );

        let names: Vec<&str> = result.groups[0].photos.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["first.jpg", "second.jpg", "small.jpg"]);
        assert_eq!(result.groups[0].keeper().unwrap().name(), "first.jpg");
    }

    #[test]
    fn test_deletions_count_is_members_minus_keepers() {
        let result = ScanResult::new(
            vec![
                group("a", vec![photo("1", 1), photo("2", 2), photo("3", 3)]),
                group("b", vec![photo("4", 4), photo("5", 5)]),
            ],
            Vec::new(),
        );

        let expected: usize = result.groups.iter().map(|g| g.len() - 1).sum();
        assert_eq!(result.deletions_count, expected);
        assert_eq!(result.marked().count(), expected);
        for g in &result.groups {
            let keeper = g.keeper().unwrap();
            assert!(g.photos.iter().all(|p| keeper.size() >= p.size()));
        }
    }

    #[test]
    fn test_toggle_tracks_count() {
        let mut result = ScanResult::new(
            vec![group("k", vec![photo("a.jpg", 100), photo("b.jpg", 200)])],
            Vec::new(),
        );

        assert_eq!(result.toggle("k", 1), Some(false));
        assert_eq!(result.deletions_count, 0);
        assert_eq!(result.toggle("k", 0), Some(true));
        assert_eq!(result.deletions_count, 1);
        assert_eq!(result.toggle("k", 5), None);
        assert_eq!(result.toggle("missing", 0), None);
    }

    #[test]
    fn test_serialises_groups_as_ordered_map() {
        let result = ScanResult::new(
            vec![
                group("zz", vec![photo("a.jpg", 1), photo("b.jpg", 2)]),
                group("aa", vec![photo("c.jpg", 1), photo("d.jpg", 2)]),
            ],
            Vec::new(),
        );

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.find("\"zz\"").unwrap() < json.find("\"aa\"").unwrap());

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["deletions_count"], 2);
        assert_eq!(value["groups"]["zz"][0]["name"], "b.jpg");
        assert_eq!(value["groups"]["zz"][0]["delete_flag"], false);
        assert_eq!(value["groups"]["zz"][1]["delete_flag"], true);
    }
}
