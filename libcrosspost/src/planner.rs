//! Publication planning
//!
//! Turns a working set of content items into publish requests: one per item that still
//! has pending platforms. Items that cannot be read are reported separately and never
//! stop the run.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::config::SiteConfig;
use crate::frontmatter::FrontmatterStore;
use crate::types::PublishRequest;

/// An item left out of the plan because it could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub item: PathBuf,
    pub reason: String,
}

/// Ordered mapping from item identifier to its publish request
///
/// Serialized as a JSON object whose keys keep detection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishPlan {
    entries: Vec<(String, PublishRequest)>,
}

impl PublishPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a request, replacing an earlier one for the same item
    pub fn insert(&mut self, item: impl Into<String>, request: PublishRequest) {
        let item = item.into();
        match self.entries.iter_mut().find(|(key, _)| *key == item) {
            Some(entry) => entry.1 = request,
            None => self.entries.push((item, request)),
        }
    }

    pub fn get(&self, item: &str) -> Option<&PublishRequest> {
        self.entries
            .iter()
            .find(|(key, _)| key == item)
            .map(|(_, request)| request)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PublishRequest)> {
        self.entries.iter().map(|(item, request)| (item.as_str(), request))
    }

    pub fn items(&self) -> Vec<&str> {
        self.entries.iter().map(|(item, _)| item.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for PublishPlan {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (item, request) in &self.entries {
            map.serialize_entry(item, request)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PublishPlan {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PlanVisitor;

        impl<'de> Visitor<'de> for PlanVisitor {
            type Value = PublishPlan;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map from item path to publish request")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<PublishPlan, A::Error> {
                let mut plan = PublishPlan::new();
                while let Some((item, request)) = access.next_entry::<String, PublishRequest>()? {
                    plan.insert(item, request);
                }
                Ok(plan)
            }
        }

        deserializer.deserialize_map(PlanVisitor)
    }
}

/// Planner output: the plan plus the items skipped with a warning
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionReport {
    pub plan: PublishPlan,
    pub skipped: Vec<SkippedItem>,
    /// Items whose declared platforms are all posted
    pub complete: Vec<PathBuf>,
}

impl DetectionReport {
    pub fn has_work(&self) -> bool {
        !self.plan.is_empty()
    }
}

pub struct Planner<'a> {
    store: &'a FrontmatterStore,
    site: &'a SiteConfig,
    load_body: bool,
}

impl<'a> Planner<'a> {
    pub fn new(store: &'a FrontmatterStore, site: &'a SiteConfig) -> Self {
        Self {
            store,
            site,
            load_body: false,
        }
    }

    /// Also copy each item's markdown body into its request
    pub fn with_body(mut self, load_body: bool) -> Self {
        self.load_body = load_body;
        self
    }

    pub fn plan(&self, items: &[PathBuf]) -> DetectionReport {
        let mut report = DetectionReport::default();

        for item in items {
            match self.plan_item(item) {
                Ok(Some(request)) => {
                    info!(
                        item = %item.display(),
                        platforms = ?request.pending_platforms,
                        "Item has pending platforms"
                    );
                    report.plan.insert(item_key(item), request);
                }
                Ok(None) => {
                    debug!(item = %item.display(), "Item already posted everywhere");
                    report.complete.push(item.clone());
                }
                Err(reason) => {
                    warn!(item = %item.display(), "Skipping item: {}", reason);
                    report.skipped.push(SkippedItem {
                        item: item.clone(),
                        reason,
                    });
                }
            }
        }

        report
    }

    fn plan_item(&self, item: &Path) -> Result<Option<PublishRequest>, String> {
        let document = self.store.read(item).map_err(|e| e.to_string())?;
        let metadata = document.metadata.clone();

        let pending = metadata.pending_platforms();
        if pending.is_empty() {
            return Ok(None);
        }

        Ok(Some(PublishRequest {
            slug: metadata.slug.clone(),
            title: metadata.title.clone(),
            summary: metadata.abstract_text().to_string(),
            canonical_url: self.site.canonical_url(&metadata.slug),
            pending_platforms: pending,
            body: self.load_body.then(|| document.body().to_string()),
            metadata,
        }))
    }
}

/// Item identifier as used in detection output and results artifacts
pub fn item_key(item: &Path) -> String {
    item.to_string_lossy().replace('\\', "/")
}
