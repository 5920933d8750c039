pub mod jamendo;

#[cfg(test)]
pub mod testing;

use thiserror::Error;

use crate::config::{AudioFormat, FetchSettings};
use crate::models::{Album, Artwork, PlayTarget, Track};

/// 카탈로그 요청 실패 분류.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// 연결 실패, 시간 초과 등 서버에 닿지 못한 경우.
    #[error("network error: {reason}")]
    Network { reason: String },
    /// 서버가 성공이 아닌 상태 코드를 돌려준 경우.
    #[error("catalog service returned status {status}")]
    Service { status: u16 },
    /// JSON 형식이 잘못되었거나 이미지 응답을 읽을 수 없는 경우.
    #[error("could not decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },
}

impl CatalogError {
    /// 사용자에게 보여줄 오류 메시지.
    pub fn user_message(&self) -> String {
        match self {
            CatalogError::Network { reason } => {
                format!("Jamendo 서버에 연결하지 못했습니다.\n{}.", capitalize(reason))
            }
            CatalogError::Service { status } => {
                format!("Jamendo 서버가 코드 {}을(를) 반환했습니다", status)
            }
            CatalogError::Decode { .. } => format!("앨범을 가져오는 중 오류가 발생했습니다: {}", self),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// 앨범 목록 정렬 기준.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    RatingDesc,
    DateDesc,
}

impl Order {
    pub fn as_str(self) -> &'static str {
        match self {
            Order::RatingDesc => "rating_desc",
            Order::DateDesc => "date_desc",
        }
    }
}

/// 검색어를 적용할 필드.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchField {
    #[default]
    ArtistName,
    Tag,
}

impl SearchField {
    pub const ALL: [SearchField; 2] = [SearchField::ArtistName, SearchField::Tag];

    pub fn param(self) -> &'static str {
        match self {
            SearchField::ArtistName => "artist_name",
            SearchField::Tag => "tag_idstr",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SearchField::ArtistName => "아티스트",
            SearchField::Tag => "태그",
        }
    }
}

/// 앨범 목록 한 페이지를 고르는 조건.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumQuery {
    pub order: Order,
    pub filter: Option<(SearchField, String)>,
    /// 1부터 시작하는 페이지 번호.
    pub page: u32,
}

/// 음악 카탈로그 트레이트.
/// 앨범 목록, 커버 이미지, 트랙 목록, 라이선스를 각각 가져오는 요청을 추상화한다.
pub trait CatalogSource: Send + Sync {
    fn name(&self) -> &str;
    /// 조건에 맞는 앨범 목록을 가져온다. 트랙과 라이선스는 비어 있다.
    fn list_albums(&self, query: &AlbumQuery, settings: &FetchSettings)
        -> Result<Vec<Album>, CatalogError>;
    /// 커버 이미지 바이트를 다운로드한다.
    fn fetch_image(&self, url: &str) -> Result<Vec<u8>, CatalogError>;
    /// 앨범 내 순서대로 정렬된 트랙 목록을 가져온다.
    fn fetch_tracks(&self, album_id: u64) -> Result<Vec<Track>, CatalogError>;
    /// 앨범의 라이선스 이름 목록을 가져온다.
    fn fetch_licenses(&self, album_id: u64) -> Result<Vec<String>, CatalogError>;
    /// 외부 플레이어에 넘길 스트림 주소.
    fn stream_url(&self, target: PlayTarget, format: AudioFormat) -> String;
    /// 앨범 웹 페이지 주소.
    fn album_page_url(&self, album_id: u64) -> String;

    /// 앨범 한 페이지를 완성해서 가져온다.
    ///
    /// 앨범마다 이미지 → 트랙 → 라이선스 순서로 한 번에 하나씩 요청하고,
    /// 완성된 앨범을 `on_album`에 넘긴다. 어느 요청이든 실패하면 페이지 전체를 포기한다.
    fn fetch_page(
        &self,
        query: &AlbumQuery,
        settings: &FetchSettings,
        on_album: &mut dyn FnMut(&Album),
    ) -> Result<Vec<Album>, CatalogError> {
        let mut albums = self.list_albums(query, settings)?;
        for album in albums.iter_mut() {
            if let Artwork::Remote(url) = &album.image {
                let bytes = self.fetch_image(url)?;
                album.image = Artwork::Fetched(bytes);
            }
            album.tracks = self.fetch_tracks(album.id)?;
            album.licenses = self.fetch_licenses(album.id)?;
            on_album(album);
        }
        Ok(albums)
    }
}
