use chrono::NaiveDate;
use image::RgbaImage;

/// 카탈로그에서 가져온 앨범 한 장.
/// 가져온 뒤에는 커버 이미지(`image`)만 디코딩된 비트맵으로 교체된다.
#[derive(Debug, Clone, Default)]
pub struct Album {
    pub id: u64,
    pub name: String,
    pub duration: u32,
    pub artist_id: u64,
    pub artist_name: String,
    pub artist_url: Option<String>,
    pub genre: Option<String>,
    pub release: Option<String>,
    pub licenses: Vec<String>,
    pub image: Artwork,
    pub tracks: Vec<Track>,
}

impl Album {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "알 수 없음"
        } else {
            &self.name
        }
    }

    pub fn display_artist(&self) -> &str {
        if self.artist_name.is_empty() {
            "알 수 없음"
        } else {
            &self.artist_name
        }
    }

    /// `dates.release`의 앞 10글자(`YYYY-MM-DD`)를 날짜로 해석한다.
    pub fn release_date(&self) -> Option<NaiveDate> {
        let raw = self.release.as_deref()?;
        let day = raw.get(..10)?;
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }

    pub fn license(&self) -> Option<&str> {
        self.licenses.first().map(String::as_str)
    }

    /// 받아 둔 커버 바이트를 RGBA 비트맵으로 바꾼다.
    /// 읽을 수 없는 이미지는 1x1 자리표시 비트맵으로 대체한다.
    pub fn decode_artwork(&mut self) {
        let Artwork::Fetched(bytes) = &self.image else {
            return;
        };
        let bitmap = match image::load_from_memory(bytes) {
            Ok(img) => img.to_rgba8(),
            Err(e) => {
                log::warn!("album {} cover could not be decoded: {}", self.id, e);
                RgbaImage::new(1, 1)
            }
        };
        self.image = Artwork::Decoded(bitmap);
    }

    pub fn summary(&self) -> String {
        format!("{} - {}", self.display_artist(), self.display_name())
    }
}

/// 앨범 커버의 상태. 원격 URL → 받아 둔 바이트 → 디코딩된 비트맵 순으로 바뀐다.
#[derive(Debug, Clone, Default)]
pub enum Artwork {
    #[default]
    Missing,
    Remote(String),
    Fetched(Vec<u8>),
    Decoded(RgbaImage),
}

impl Artwork {
    pub fn bitmap(&self) -> Option<&RgbaImage> {
        match self {
            Artwork::Decoded(bitmap) => Some(bitmap),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Track {
    pub id: u64,
    pub name: String,
    pub duration: u32,
    /// 소속 앨범 id. 소유 관계가 아니라 참조만 한다.
    pub album_id: u64,
}

/// 재생 대상. 앨범 전체 또는 트랙 하나.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayTarget {
    Album(u64),
    Track(u64),
}
