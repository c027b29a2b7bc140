use std::path::{Path, PathBuf};
use std::time::Duration;

use eframe::egui::Color32;

use crate::canvas::{HitTestOrder, RelayoutPolicy};

/// Pinned OpenMoji commit holding the geometric symbol set.
pub const DEFAULT_LISTING_REF: &str = "44c02495e040c52fbea0bfb1cba89aa24754f9a8";

/// Application settings that persist across sessions
#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    /// GitHub `owner/name` of the icon repository
    pub listing_repo: String,
    /// Directory inside the repository that holds the SVG files
    pub listing_path: String,
    /// Branch, tag or commit to list
    pub listing_ref: String,
    pub user_agent: String,
    /// Per-request timeout for listing and icon downloads
    pub fetch_timeout_secs: u64,
    pub relayout_policy: RelayoutPolicy,
    pub hit_test_order: HitTestOrder,
    pub window_width: f32,
    pub window_height: f32,
    pub canvas_background: Color32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            listing_repo: "hfg-gmuend/openmoji".to_string(),
            listing_path: "src/symbols/geometric".to_string(),
            listing_ref: DEFAULT_LISTING_REF.to_string(),
            user_agent: concat!("GeoCanvas/", env!("CARGO_PKG_VERSION")).to_string(),
            fetch_timeout_secs: 20,
            relayout_policy: RelayoutPolicy::Randomize,
            hit_test_order: HitTestOrder::Topmost,
            window_width: 1080.0,
            window_height: 720.0,
            canvas_background: Color32::from_rgb(0xF0, 0xF0, 0xF0),
        }
    }
}

impl AppSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/geocanvas/geocanvas_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\GeoCanvas\geocanvas_settings.cfg
    /// On macOS:   ~/Library/Application Support/GeoCanvas/geocanvas_settings.cfg
    /// Fallback:   same directory as the executable.
    /// Only computes the path; [`AppSettings::save`] creates the directory.
    pub(crate) fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("geocanvas");
            return Some(config_dir.join("geocanvas_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            let config_dir = PathBuf::from(appdata).join("GeoCanvas");
            return Some(config_dir.join("geocanvas_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            let config_dir = PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("GeoCanvas");
            return Some(config_dir.join("geocanvas_settings.cfg"));
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe().ok().and_then(|p| p.parent().map(|d| d.join("geocanvas_settings.cfg")))
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    /// Serialize a Color32 as "r,g,b"
    fn color_to_str(c: Color32) -> String {
        format!("{},{},{}", c.r(), c.g(), c.b())
    }

    /// Parse a Color32 from "r,g,b"
    fn str_to_color(s: &str) -> Option<Color32> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() == 3 {
            let r = parts[0].trim().parse::<u8>().ok()?;
            let g = parts[1].trim().parse::<u8>().ok()?;
            let b = parts[2].trim().parse::<u8>().ok()?;
            Some(Color32::from_rgb(r, g, b))
        } else {
            None
        }
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "listing_repo={}\n\
             listing_path={}\n\
             listing_ref={}\n\
             user_agent={}\n\
             fetch_timeout_secs={}\n\
             relayout_policy={}\n\
             hit_test_order={}\n\
             window_width={}\n\
             window_height={}\n\
             canvas_background={}\n",
            self.listing_repo,
            self.listing_path,
            self.listing_ref,
            self.user_agent,
            self.fetch_timeout_secs,
            self.relayout_policy.as_str(),
            self.hit_test_order.as_str(),
            self.window_width,
            self.window_height,
            Self::color_to_str(self.canvas_background),
        )
    }

    /// Parse `key=value` lines.  Unknown keys and unparsable values fall back
    /// to the defaults.
    pub fn from_config_str(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "listing_repo" if !val.is_empty() => s.listing_repo = val.to_string(),
                "listing_path" => s.listing_path = val.trim_matches('/').to_string(),
                "listing_ref" if !val.is_empty() => s.listing_ref = val.to_string(),
                "user_agent" if !val.is_empty() => s.user_agent = val.to_string(),
                "fetch_timeout_secs" => {
                    s.fetch_timeout_secs = val.parse().unwrap_or(s.fetch_timeout_secs);
                }
                "relayout_policy" => {
                    s.relayout_policy = RelayoutPolicy::parse(val).unwrap_or_default();
                }
                "hit_test_order" => {
                    s.hit_test_order = HitTestOrder::parse(val).unwrap_or_default();
                }
                "window_width" => {
                    s.window_width = val.parse().unwrap_or(s.window_width);
                }
                "window_height" => {
                    s.window_height = val.parse().unwrap_or(s.window_height);
                }
                "canvas_background" => {
                    if let Some(c) = Self::str_to_color(val) {
                        s.canvas_background = c;
                    }
                }
                _ => {}
            }
        }
        s
    }

    /// Save settings to disk
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        if let Err(e) = std::fs::write(&path, self.to_config_string()) {
            crate::log_warn!("Could not write settings to {}: {}", path.display(), e);
        }
    }

    /// Load settings from disk (returns default if file missing or corrupt).
    /// A missing file is created with the defaults so it can be edited by hand.
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        let s = Self::read_from(&path);
        if !path.exists() {
            s.save();
        }
        s
    }

    /// Like [`AppSettings::load`] but never writes: a missing file just
    /// yields the defaults. Used by the headless CLI.
    pub fn load_existing() -> Self {
        Self::settings_path()
            .map(|path| Self::read_from(&path))
            .unwrap_or_default()
    }

    fn read_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_config_str(&content),
            Err(_) => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_text_round_trip() {
        let settings = AppSettings {
            listing_repo: "someone/icons".to_string(),
            listing_path: "svg/shapes".to_string(),
            listing_ref: "main".to_string(),
            fetch_timeout_secs: 5,
            relayout_policy: RelayoutPolicy::Preserve,
            hit_test_order: HitTestOrder::FirstAdded,
            window_width: 800.0,
            window_height: 600.0,
            canvas_background: Color32::from_rgb(1, 2, 3),
            ..Default::default()
        };
        assert_eq!(AppSettings::from_config_str(&settings.to_config_string()), settings);
    }

    #[test]
    fn bad_values_fall_back_to_defaults() {
        let s = AppSettings::from_config_str(
            "# comment\n\
             fetch_timeout_secs=soon\n\
             relayout_policy=shuffle\n\
             canvas_background=1,2\n\
             listing_path=/a/b/\n\
             mystery=1\n\
             no equals sign here\n",
        );
        let d = AppSettings::default();
        assert_eq!(s.fetch_timeout_secs, d.fetch_timeout_secs);
        assert_eq!(s.relayout_policy, RelayoutPolicy::Randomize);
        assert_eq!(s.canvas_background, d.canvas_background);
        assert_eq!(s.listing_path, "a/b");
    }

    #[test]
    fn timeout_is_at_least_one_second() {
        let s = AppSettings {
            fetch_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(s.fetch_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn reading_a_missing_file_creates_nothing() {
        let dir = std::env::temp_dir().join(format!("geocanvas_settings_missing_{}", std::process::id()));
        let path = dir.join("geocanvas_settings.cfg");
        assert_eq!(AppSettings::read_from(&path), AppSettings::default());
        assert!(!dir.exists());
    }

    #[test]
    fn reads_an_existing_file() {
        let path = std::env::temp_dir().join(format!("geocanvas_settings_{}.cfg", std::process::id()));
        std::fs::write(&path, "relayout_policy=preserve\nfetch_timeout_secs=3\n").unwrap();
        let s = AppSettings::read_from(&path);
        let _ = std::fs::remove_file(&path);
        assert_eq!(s.relayout_policy, RelayoutPolicy::Preserve);
        assert_eq!(s.fetch_timeout_secs, 3);
    }
}
