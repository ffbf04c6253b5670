// config.rs — render and spatial-index settings
//
// Plain serde structs. Every field has a default so a partial JSON document
// (or `{}`) deserializes into a usable configuration.

use log::debug;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{ProcError, Result};

/// Octree subdivision limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OctreeConfig {
    /// A node holding more objects than this is split.
    pub max_leaf_objects: usize,
    /// Nodes whose smallest edge is below this size are never split.
    pub min_node_size: f64,
    /// Hard limit on tree depth (root is depth 0).
    pub max_depth: u32,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            max_leaf_objects: 4,
            min_node_size: 1e-3,
            max_depth: 16,
        }
    }
}

/// Per-render settings shared by every worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderConfig {
    /// Maximum recursion depth for secondary rays. Depth 0 is the primary ray.
    pub max_ray_depth: usize,
    /// Worker thread count. `None` uses rayon's global pool.
    pub threads: Option<usize>,
    /// Multiplier applied to the antialiasing footprint handed to textures.
    pub antialiasing: f64,
    pub octree: OctreeConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_ray_depth: 8,
            threads: None,
            antialiasing: 1.0,
            octree: OctreeConfig::default(),
        }
    }
}

impl RenderConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ProcError::Graph(format!("render config: {e}")))
    }

    /// A dedicated pool of `threads` workers, or `None` to run on rayon's
    /// global pool.
    pub fn thread_pool(&self) -> Result<Option<ThreadPool>> {
        let Some(n) = self.threads else {
            return Ok(None);
        };
        let pool = ThreadPoolBuilder::new()
            .num_threads(n)
            .thread_name(|i| format!("procgraph-worker-{i}"))
            .build()?;
        debug!("built render pool with {} threads", pool.current_num_threads());
        Ok(Some(pool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = RenderConfig::from_json("{}").unwrap();
        assert_eq!(cfg.max_ray_depth, 8);
        assert_eq!(cfg.octree.max_leaf_objects, 4);
        assert!(cfg.threads.is_none());
    }

    #[test]
    fn nested_octree_fields_override() {
        let cfg = RenderConfig::from_json(
            r#"{ "maxRayDepth": 3, "octree": { "maxLeafObjects": 10 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.max_ray_depth, 3);
        assert_eq!(cfg.octree.max_leaf_objects, 10);
        assert_eq!(cfg.octree.max_depth, 16);
    }

    #[test]
    fn thread_count_builds_a_pool() {
        assert!(RenderConfig::default().thread_pool().unwrap().is_none());
        let cfg = RenderConfig {
            threads: Some(2),
            ..RenderConfig::default()
        };
        let pool = cfg.thread_pool().unwrap().unwrap();
        assert_eq!(pool.current_num_threads(), 2);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(RenderConfig::from_json("{ maxRayDepth: ").is_err());
    }
}
