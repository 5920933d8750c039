use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "http://api.jamendo.com/get2";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            format: self.playback.format,
            page_size: self.playback.albums_per_page,
            image_size: self.catalog.image_size,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub api_url: String,
    pub timeout_secs: u64,
    pub image_size: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout_secs: 30,
            image_size: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub format: AudioFormat,
    pub albums_per_page: NonZeroU32,
    /// 스트림 URL을 넘겨 받을 외부 플레이어 명령. 없으면 URL만 보여준다.
    pub player: Option<String>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            format: AudioFormat::default(),
            albums_per_page: DEFAULT_PAGE_SIZE,
            player: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

const DEFAULT_PAGE_SIZE: NonZeroU32 = match NonZeroU32::new(10) {
    Some(n) => n,
    None => unreachable!(),
};

/// 스트리밍 인코딩.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Ogg2,
    Mp31,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 2] = [AudioFormat::Ogg2, AudioFormat::Mp31];

    pub fn as_str(self) -> &'static str {
        match self {
            AudioFormat::Ogg2 => "ogg2",
            AudioFormat::Mp31 => "mp31",
        }
    }
}

/// 한 번의 페이지 요청에 복사되어 전달되는 설정 값.
/// 바뀐 설정은 이후 요청에만 적용되고 이미 받아 둔 페이지에는 영향이 없다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSettings {
    pub format: AudioFormat,
    pub page_size: NonZeroU32,
    pub image_size: u32,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Config::default().fetch_settings()
    }
}

fn config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
        .join(".config")
        .join("jamendo-sidebar")
        .join("config.toml")
}

/// 설정 파일을 읽는다. 파일이 잘못되었으면 기본값과 함께 경고 문구를 돌려준다.
/// 로거가 준비되기 전에 불리므로 경고는 호출한 쪽에서 남긴다.
pub fn load_config() -> (Config, Option<String>) {
    load_config_from(&config_path())
}

fn load_config_from(path: &Path) -> (Config, Option<String>) {
    if !path.exists() {
        return (Config::default(), None);
    }
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(cfg) => (cfg, None),
            Err(e) => (
                Config::default(),
                Some(format!("ignoring invalid config {}: {}", path.display(), e)),
            ),
        },
        Err(e) => (
            Config::default(),
            Some(format!("cannot read config {}: {}", path.display(), e)),
        ),
    }
}

pub fn save_config(config: &Config) -> Result<()> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content)
        .with_context(|| format!("설정 파일을 쓸 수 없습니다: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Config::default().fetch_settings();
        assert_eq!(settings.format, AudioFormat::Ogg2);
        assert_eq!(settings.page_size.get(), 10);
        assert_eq!(settings.image_size, 50);
    }

    #[test]
    fn test_parse_partial_file() {
        let cfg: Config = toml::from_str(
            r#"
            [playback]
            format = "mp31"
            albums_per_page = 25
            "#,
        )
        .unwrap();
        assert_eq!(cfg.playback.format, AudioFormat::Mp31);
        assert_eq!(cfg.playback.albums_per_page.get(), 25);
        assert_eq!(cfg.catalog.api_url, DEFAULT_API_URL);
        assert_eq!(cfg.logging.level, "warn");
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let parsed: Result<Config, _> = toml::from_str("[playback]\nalbums_per_page = 0\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_invalid_file_is_reported() {
        let dir = std::env::temp_dir().join(format!("jamendo-sidebar-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[playback]\nalbums_per_page = 0\nplayer = \"mpv\"\n").unwrap();

        let (cfg, warning) = load_config_from(&path);
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(cfg.playback.player, None);
        let warning = warning.unwrap();
        assert!(warning.contains("ignoring invalid config"));
        assert!(warning.contains("config.toml"));
    }

    #[test]
    fn test_missing_file_is_silent() {
        let path = std::env::temp_dir().join("jamendo-sidebar-missing/config.toml");
        let (cfg, warning) = load_config_from(&path);
        assert!(warning.is_none());
        assert_eq!(cfg.playback.albums_per_page.get(), 10);
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let mut cfg = Config::default();
        cfg.playback.player = Some("mpv".to_string());
        let text = toml::to_string_pretty(&cfg).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.playback.player.as_deref(), Some("mpv"));
    }
}
