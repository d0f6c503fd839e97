//! Frame identifiers.
//!
//! Every frame except the shared global reference is prefixed with the
//! vehicle namespace so that several estimators can publish into the same
//! transform tree without colliding.

use tracing::warn;

/// Default global reference frame shared by all vehicles.
pub const DEFAULT_GLOBAL_FRAME: &str = "earth";

/// Prefix `frame` with `namespace`.
///
/// A leading `/` on the namespace is dropped.  A frame that already starts
/// with `/` is treated as absolute and returned without the slash.
///
/// ```rust
/// use aerostate_tf::names::generate_tf_name;
///
/// assert_eq!(generate_tf_name("/drone0", "map"), "drone0/map");
/// assert_eq!(generate_tf_name("drone0", "base_link"), "drone0/base_link");
/// assert_eq!(generate_tf_name("drone0", "/earth"), "earth");
/// ```
pub fn generate_tf_name(namespace: &str, frame: &str) -> String {
    if let Some(absolute) = frame.strip_prefix('/') {
        return absolute.to_string();
    }
    let ns = namespace.trim_start_matches('/').trim_end_matches('/');
    if ns.is_empty() {
        frame.to_string()
    } else {
        format!("{ns}/{frame}")
    }
}

/// The four frames of the estimator tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameNames {
    pub global: String,
    pub map: String,
    pub odom: String,
    pub base: String,
}

impl FrameNames {
    /// Derive the frame set for `namespace`.
    ///
    /// An empty `base_frame` falls back to the bare namespace and emits a
    /// warning.
    pub fn new(global_frame: &str, namespace: &str, base_frame: &str) -> Self {
        let base = if base_frame.is_empty() {
            let fallback = namespace.trim_start_matches('/').to_string();
            warn!(base_frame = %fallback, "no base frame specified, using namespace");
            fallback
        } else {
            generate_tf_name(namespace, base_frame)
        };
        Self {
            global: global_frame.to_string(),
            map: generate_tf_name(namespace, "map"),
            odom: generate_tf_name(namespace, "odom"),
            base,
        }
    }

    /// All four names, root first.
    pub fn all(&self) -> [&str; 4] {
        [&self.global, &self.map, &self.odom, &self.base]
    }

    /// The first name used for more than one frame, if any.
    ///
    /// Lookups resolve a name to the first frame carrying it, so a tree with
    /// a repeated name silently answers for the wrong frame.
    pub fn duplicate(&self) -> Option<&str> {
        let all = self.all();
        for (i, name) in all.into_iter().enumerate() {
            if all[i + 1..].contains(&name) {
                return Some(name);
            }
        }
        None
    }
}
