pub const CONFIG_DIR_NAME: &str = "reident";
pub const CONFIG_FILE_NAME: &str = "config.json";

pub const LABELS_FILE_SUFFIX: &str = "labels.jsonl";
pub const REPORT_FILE_SUFFIX: &str = "identities.json";

/// Scenes shorter than this many seconds are folded into the previous scene.
pub const DEFAULT_MIN_SCENE_DURATION: f64 = 5.0;

/// Frames between progress log lines.
pub const PROGRESS_THROTTLE_FRAMES: usize = 100;
