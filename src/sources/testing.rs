use std::sync::Mutex;

use super::{AlbumQuery, CatalogError, CatalogSource};
use crate::config::{AudioFormat, FetchSettings};
use crate::models::{Album, Artwork, PlayTarget, Track};

pub fn album(id: u64) -> Album {
    Album {
        id,
        name: format!("Album {}", id),
        duration: 1800,
        artist_id: 1000 + id,
        artist_name: format!("Artist {}", id),
        image: Artwork::Remote(format!("http://img.example/{}.jpg", id)),
        ..Default::default()
    }
}

pub fn albums(ids: std::ops::Range<u64>) -> Vec<Album> {
    ids.map(album).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    List(u32),
    Image(u64),
    Tracks(u64),
    Licenses(u64),
}

pub struct FakeCatalog {
    pages: Vec<Vec<Album>>,
    failures: Vec<(Failure, CatalogError)>,
    requested: Mutex<Vec<u32>>,
}

impl FakeCatalog {
    /// `pages[0]`이 1페이지 응답이다. 범위를 벗어난 페이지는 빈 목록을 돌려준다.
    pub fn new(pages: Vec<Vec<Album>>) -> Self {
        Self {
            pages,
            failures: Vec::new(),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn fail(mut self, at: Failure, error: CatalogError) -> Self {
        self.failures.push((at, error));
        self
    }

    /// 지금까지 요청된 페이지 번호들.
    pub fn requested_pages(&self) -> Vec<u32> {
        self.requested.lock().unwrap().clone()
    }

    fn check(&self, at: Failure) -> Result<(), CatalogError> {
        match self.failures.iter().find(|(f, _)| *f == at) {
            Some((_, e)) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

impl CatalogSource for FakeCatalog {
    fn name(&self) -> &str {
        "Fake"
    }

    fn list_albums(
        &self,
        query: &AlbumQuery,
        settings: &FetchSettings,
    ) -> Result<Vec<Album>, CatalogError> {
        self.requested.lock().unwrap().push(query.page);
        self.check(Failure::List(query.page))?;
        let page = self
            .pages
            .get(query.page as usize - 1)
            .cloned()
            .unwrap_or_default();
        Ok(page
            .into_iter()
            .take(settings.page_size.get() as usize)
            .collect())
    }

    fn fetch_image(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        if let Some(id) = url
            .rsplit('/')
            .next()
            .and_then(|f| f.trim_end_matches(".jpg").parse().ok())
        {
            self.check(Failure::Image(id))?;
        }
        Ok(b"not really a jpeg".to_vec())
    }

    fn fetch_tracks(&self, album_id: u64) -> Result<Vec<Track>, CatalogError> {
        self.check(Failure::Tracks(album_id))?;
        Ok((1..=2)
            .map(|n| Track {
                id: album_id * 100 + n,
                name: format!("Track {}", n),
                duration: 200,
                album_id,
            })
            .collect())
    }

    fn fetch_licenses(&self, album_id: u64) -> Result<Vec<String>, CatalogError> {
        self.check(Failure::Licenses(album_id))?;
        Ok(vec!["by-sa".to_string()])
    }

    fn stream_url(&self, target: PlayTarget, format: AudioFormat) -> String {
        match target {
            PlayTarget::Album(id) => format!("fake://album/{}.{}", id, format.as_str()),
            PlayTarget::Track(id) => format!("fake://track/{}.{}", id, format.as_str()),
        }
    }

    fn album_page_url(&self, album_id: u64) -> String {
        format!("fake://page/{}", album_id)
    }
}
