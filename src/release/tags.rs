//! Release tag parsing and lookup
//!
//! Recognized formats:
//! - `v1.2.3` (single-product repos)
//! - `name@v1.2.3`
//! - `name-v1.2.3`

use crate::release::version::SemanticVersion;

/// A tag that names a release version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseTag {
  /// Product name, empty for plain `vX.Y.Z` tags
  pub name: String,
  pub version: SemanticVersion,
  /// Full tag name as it appears in git
  pub tag_name: String,
}

impl ReleaseTag {
  /// Parse a tag name. Pre-release tags are not release tags and yield `None`.
  pub fn parse(tag_name: &str) -> Option<Self> {
    let build = |name: &str, version_str: &str| {
      SemanticVersion::parse(version_str).ok().map(|version| Self {
        name: name.to_string(),
        version,
        tag_name: tag_name.to_string(),
      })
    };

    if let Some((name, version_str)) = tag_name.split_once('@')
      && let Some(version_str) = version_str.strip_prefix('v')
    {
      return build(name, version_str);
    }

    if let Some(v_pos) = tag_name.rfind("-v")
      && let Some(tag) = build(&tag_name[..v_pos], &tag_name[v_pos + 2..])
    {
      return Some(tag);
    }

    tag_name.strip_prefix('v').and_then(|version_str| build("", version_str))
  }

  /// Tag name for a version under the configured prefix
  pub fn format(prefix: &str, version: &SemanticVersion) -> String {
    format!("{}{}", prefix, version)
  }
}

/// Release tags among `tags` that belong to this product, unsorted
fn product_tags<'a>(tags: &'a [String], prefix: &'a str) -> impl Iterator<Item = ReleaseTag> + 'a {
  tags.iter().filter_map(move |tag| {
    let version_str = tag.strip_prefix(prefix)?;
    let version = SemanticVersion::parse(version_str).ok()?;
    let name = ReleaseTag::parse(tag).map(|t| t.name).unwrap_or_default();
    Some(ReleaseTag {
      name,
      version,
      tag_name: tag.clone(),
    })
  })
}

/// Highest release tag carrying the configured prefix
pub fn latest_release_tag(tags: &[String], prefix: &str) -> Option<ReleaseTag> {
  product_tags(tags, prefix).max_by(|a, b| a.version.cmp(&b.version))
}

/// Existing tag for `version`, if any
pub fn find_conflicting_tag(tags: &[String], prefix: &str, version: &SemanticVersion) -> Option<String> {
  let exact = ReleaseTag::format(prefix, version);
  if tags.iter().any(|t| *t == exact) {
    return Some(exact);
  }
  product_tags(tags, prefix)
    .find(|t| t.version == *version)
    .map(|t| t.tag_name)
}
