use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::config::{AudioFormat, CatalogConfig, FetchSettings};
use crate::models::{Album, Artwork, PlayTarget, Track};
use crate::sources::{AlbumQuery, CatalogError, CatalogSource};

const USER_AGENT: &str = "jamendo-sidebar";
const ALBUM_FIELDS: &str =
    "id+name+duration+image+genre+dates+artist_id+artist_name+artist_url";

/// Jamendo get2 REST API 클라이언트.
pub struct JamendoClient {
    client: Client,
    base: Url,
}

#[derive(Deserialize)]
struct RawAlbum {
    #[serde(deserialize_with = "lenient_u64")]
    id: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    duration: u32,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    genre: Option<String>,
    #[serde(default)]
    dates: Option<RawDates>,
    #[serde(default, deserialize_with = "lenient_u64")]
    artist_id: u64,
    #[serde(default)]
    artist_name: Option<String>,
    #[serde(default)]
    artist_url: Option<String>,
}

#[derive(Deserialize)]
struct RawDates {
    release: Option<String>,
}

#[derive(Deserialize)]
struct RawTrack {
    #[serde(deserialize_with = "lenient_u64")]
    id: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    duration: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLicense {
    Name(String),
    Object { name: String },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Int(u64),
    Float(f64),
    Text(String),
}

/// 숫자 필드는 숫자 또는 숫자 문자열로 온다. null은 0으로 본다.
fn lenient_u64<'de, D: Deserializer<'de>>(de: D) -> Result<u64, D::Error> {
    match Option::<RawNumber>::deserialize(de)? {
        None => Ok(0),
        Some(RawNumber::Int(n)) => Ok(n),
        Some(RawNumber::Float(f)) => Ok(f.max(0.0) as u64),
        Some(RawNumber::Text(s)) if s.trim().is_empty() => Ok(0),
        Some(RawNumber::Text(s)) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn lenient_u32<'de, D: Deserializer<'de>>(de: D) -> Result<u32, D::Error> {
    let n = lenient_u64(de)?;
    u32::try_from(n).map_err(serde::de::Error::custom)
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl From<RawAlbum> for Album {
    fn from(raw: RawAlbum) -> Self {
        Album {
            id: raw.id,
            name: raw.name.unwrap_or_default(),
            duration: raw.duration,
            artist_id: raw.artist_id,
            artist_name: raw.artist_name.unwrap_or_default(),
            artist_url: non_empty(raw.artist_url),
            genre: non_empty(raw.genre),
            release: raw.dates.and_then(|d| non_empty(d.release)),
            licenses: Vec::new(),
            image: match non_empty(raw.image) {
                Some(url) => Artwork::Remote(url),
                None => Artwork::Missing,
            },
            tracks: Vec::new(),
        }
    }
}

fn decode<T: DeserializeOwned>(body: &[u8], what: &'static str) -> Result<T, CatalogError> {
    serde_json::from_slice(body).map_err(|e| CatalogError::Decode {
        what,
        reason: e.to_string(),
    })
}

/// 앨범 목록 JSON 배열을 파싱한다.
pub fn parse_albums(body: &[u8]) -> Result<Vec<Album>, CatalogError> {
    let raw: Vec<RawAlbum> = decode(body, "album list")?;
    Ok(raw.into_iter().map(Album::from).collect())
}

pub fn parse_tracks(body: &[u8], album_id: u64) -> Result<Vec<Track>, CatalogError> {
    let raw: Vec<RawTrack> = decode(body, "track list")?;
    Ok(raw
        .into_iter()
        .map(|t| Track {
            id: t.id,
            name: t.name.unwrap_or_default(),
            duration: t.duration,
            album_id,
        })
        .collect())
}

pub fn parse_licenses(body: &[u8]) -> Result<Vec<String>, CatalogError> {
    let raw: Vec<RawLicense> = decode(body, "license list")?;
    Ok(raw
        .into_iter()
        .map(|l| match l {
            RawLicense::Name(name) | RawLicense::Object { name } => name,
        })
        .collect())
}

/// reqwest 오류를 가장 안쪽 원인 문자열과 함께 NetworkError로 바꾼다.
fn network_error(e: reqwest::Error) -> CatalogError {
    if let Some(status) = e.status() {
        return CatalogError::Service {
            status: status.as_u16(),
        };
    }
    let reason = if e.is_timeout() {
        "timed out".to_string()
    } else {
        let mut source: &dyn std::error::Error = &e;
        while let Some(inner) = source.source() {
            source = inner;
        }
        source.to_string()
    };
    CatalogError::Network { reason }
}

impl JamendoClient {
    /// 새 JamendoClient를 생성한다. User-Agent와 요청 타임아웃을 설정한다.
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let base = Url::parse(&config.api_url)
            .with_context(|| format!("잘못된 API 주소입니다: {}", config.api_url))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("잘못된 API 주소입니다: {}", config.api_url);
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Jamendo HTTP 클라이언트 생성에 실패했습니다")?;

        Ok(Self { client, base })
    }

    /// `path`는 `/`로 구분된 세그먼트. 끝의 `/`는 그대로 유지된다.
    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(path.split('/'));
        }
        url
    }

    pub fn album_list_url(&self, query: &AlbumQuery, settings: &FetchSettings) -> Url {
        let mut url = self.endpoint(&format!("{}/album/json/", ALBUM_FIELDS));
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("n", &settings.page_size.to_string())
                .append_pair("imagesize", &settings.image_size.to_string())
                .append_pair("order", query.order.as_str());
            if let Some((field, value)) = &query.filter {
                pairs.append_pair(field.param(), value);
            }
            pairs.append_pair("pn", &query.page.to_string());
        }
        url
    }

    pub fn track_list_url(&self, album_id: u64) -> Url {
        let mut url = self.endpoint("id+name+duration/track/json/");
        url.query_pairs_mut()
            .append_pair("album_id", &album_id.to_string())
            .append_pair("order", "numalbum_asc");
        url
    }

    pub fn license_list_url(&self, album_id: u64) -> Url {
        let mut url = self.endpoint("name/license/json/album_license/");
        url.query_pairs_mut()
            .append_pair("album_id", &album_id.to_string());
        url
    }

    pub fn stream_redirect_url(&self, target: PlayTarget, format: AudioFormat) -> Url {
        let (prop, id) = match target {
            PlayTarget::Album(id) => ("album_id", id),
            PlayTarget::Track(id) => ("id", id),
        };
        let mut url = self.endpoint("stream/track/redirect/");
        url.query_pairs_mut()
            .append_pair(prop, &id.to_string())
            .append_pair("streamencoding", format.as_str());
        url
    }

    pub fn album_redirect_url(&self, album_id: u64) -> Url {
        let mut url = self.endpoint("url/album/redirect/");
        url.query_pairs_mut().append_pair("id", &album_id.to_string());
        url
    }

    fn get_bytes(&self, url: Url) -> Result<Vec<u8>, CatalogError> {
        log::debug!("GET {}", url);
        let resp = self.client.get(url).send().map_err(network_error)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CatalogError::Service {
                status: status.as_u16(),
            });
        }
        Ok(resp.bytes().map_err(network_error)?.to_vec())
    }
}

impl CatalogSource for JamendoClient {
    fn name(&self) -> &str {
        "Jamendo"
    }

    fn list_albums(
        &self,
        query: &AlbumQuery,
        settings: &FetchSettings,
    ) -> Result<Vec<Album>, CatalogError> {
        let body = self.get_bytes(self.album_list_url(query, settings))?;
        parse_albums(&body)
    }

    fn fetch_image(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        let url = Url::parse(url).map_err(|e| CatalogError::Decode {
            what: "image url",
            reason: e.to_string(),
        })?;
        self.get_bytes(url)
    }

    fn fetch_tracks(&self, album_id: u64) -> Result<Vec<Track>, CatalogError> {
        let body = self.get_bytes(self.track_list_url(album_id))?;
        parse_tracks(&body, album_id)
    }

    fn fetch_licenses(&self, album_id: u64) -> Result<Vec<String>, CatalogError> {
        let body = self.get_bytes(self.license_list_url(album_id))?;
        parse_licenses(&body)
    }

    fn stream_url(&self, target: PlayTarget, format: AudioFormat) -> String {
        self.stream_redirect_url(target, format).to_string()
    }

    fn album_page_url(&self, album_id: u64) -> String {
        self.album_redirect_url(album_id).to_string()
    }
}
