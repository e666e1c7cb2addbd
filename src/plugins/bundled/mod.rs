//! Plugins shipped with the binary

mod github;
mod weather;

pub use github::GithubPlugin;
pub use weather::WeatherPlugin;

use super::Plugin;
use std::sync::Arc;

/// Names of every bundled plugin
pub fn names() -> [&'static str; 2] {
    ["weather", "github"]
}

/// Instantiate a bundled plugin by name
pub fn create(name: &str) -> Option<Arc<dyn Plugin>> {
    match name {
        "weather" => Some(Arc::new(WeatherPlugin::new())),
        "github" => Some(Arc::new(GithubPlugin::new())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_known() {
        for name in names() {
            let plugin = create(name).unwrap();
            assert_eq!(plugin.metadata().name, name);
            assert!(!plugin.tools().is_empty());
        }
    }

    #[test]
    fn test_create_unknown() {
        assert!(create("calendar").is_none());
    }
}
