use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::config::FetchSettings;
use crate::core::pager::{NextPage, PageStore, PagerError, ResultSetKind};
use crate::core::player::Player;
use crate::core::worker::{FetchEvent, FetchListener, FetchRequest, FetchTicket, FetchWorker};
use crate::models::{Album, PlayTarget};
use crate::sources::{AlbumQuery, CatalogError, CatalogSource, Order, SearchField};

/// 이전/다음 버튼을 눌렀을 때의 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// 캐시된 페이지를 보여준다.
    Shown,
    /// 해당 페이지를 가져오는 중이다.
    Fetching(u32),
    /// 더 이상 페이지가 없다.
    NoMore,
    /// 이 탭은 이미 요청을 처리하는 중이다.
    Busy,
}

#[derive(Debug, Default)]
struct TabState {
    generation: u64,
    loading: Option<u32>,
    incoming: Vec<Album>,
    /// 꽉 찬 페이지 다음 요청이 빈 목록을 돌려준 경우.
    exhausted: bool,
    error: Option<String>,
}

/// 렌더러가 탭 하나를 그릴 때 필요한 값.
#[derive(Debug)]
pub struct TabView<'a> {
    pub kind: ResultSetKind,
    pub albums: &'a [Album],
    pub page: usize,
    pub loading: bool,
    pub progress: f32,
    pub can_previous: bool,
    pub can_next: bool,
    pub error: Option<&'a str>,
}

pub struct Coordinator {
    source: Arc<dyn CatalogSource>,
    player: Box<dyn Player>,
    settings: FetchSettings,
    store: PageStore,
    tabs: [TabState; 3],
    active: ResultSetKind,
    search: Option<(SearchField, String)>,
    worker: Option<FetchWorker>,
    tx: Sender<FetchEvent>,
    rx: Receiver<FetchEvent>,
    last_generation: u64,
    now_playing: Option<PlayTarget>,
}

impl Coordinator {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        player: Box<dyn Player>,
        settings: FetchSettings,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            source,
            player,
            settings,
            store: PageStore::default(),
            tabs: Default::default(),
            active: ResultSetKind::Search,
            search: None,
            worker: None,
            tx,
            rx,
            last_generation: 0,
            now_playing: None,
        }
    }

    pub fn active(&self) -> ResultSetKind {
        self.active
    }

    pub fn search(&self) -> Option<&(SearchField, String)> {
        self.search.as_ref()
    }

    pub fn now_playing(&self) -> Option<PlayTarget> {
        self.now_playing
    }

    pub fn is_loading(&self) -> bool {
        self.tabs.iter().any(|t| t.loading.is_some())
    }

    fn tab(&self, kind: ResultSetKind) -> &TabState {
        &self.tabs[kind.index()]
    }

    fn tab_mut(&mut self, kind: ResultSetKind) -> &mut TabState {
        &mut self.tabs[kind.index()]
    }

    /// 새 검색을 시작한다. 검색 탭의 이전 결과는 모두 버린다.
    /// 검색어가 비어 있으면 아무것도 하지 않고 `false`를 돌려준다.
    pub fn submit_search(&mut self, text: &str, field: SearchField) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        self.search = Some((field, text.to_string()));
        self.active = ResultSetKind::Search;
        self.reset_set(ResultSetKind::Search);
        self.start_fetch(ResultSetKind::Search, 1)
    }

    /// 탭을 바꾼다. 아직 받아 둔 페이지가 없는 탭은 첫 페이지를 가져온다.
    pub fn switch_tab(&mut self, kind: ResultSetKind) {
        self.active = kind;
        let empty = self.store.get(kind).page_count() == 0;
        if empty && self.tab(kind).loading.is_none() {
            self.start_fetch(kind, 1);
        }
    }

    pub fn previous(&mut self) -> Result<Navigation, PagerError> {
        let kind = self.active;
        if self.tab(kind).loading.is_some() {
            return Ok(Navigation::Busy);
        }
        self.store.go_previous(kind)?;
        self.tab_mut(kind).error = None;
        Ok(Navigation::Shown)
    }

    pub fn next(&mut self) -> Navigation {
        let kind = self.active;
        if self.tab(kind).loading.is_some() {
            return Navigation::Busy;
        }
        if !self.can_next(kind) {
            return Navigation::NoMore;
        }
        self.tab_mut(kind).error = None;
        match self.store.go_next(kind) {
            NextPage::Cached(_) => Navigation::Shown,
            NextPage::NeedFetch(page) => {
                if self.start_fetch(kind, page) {
                    Navigation::Fetching(page)
                } else {
                    Navigation::NoMore
                }
            }
        }
    }

    fn can_next(&self, kind: ResultSetKind) -> bool {
        let set = self.store.get(kind);
        let at_end = set.current_index() >= set.page_count();
        set.has_next(self.settings.page_size.get()) && !(at_end && self.tab(kind).exhausted)
    }

    /// 스트림 URL을 만들어 플레이어에 넘기고 재생 표시를 옮긴다.
    pub fn play(&mut self, target: PlayTarget) -> Result<String> {
        let url = self.source.stream_url(target, self.settings.format);
        self.player.play(&url)?;
        self.now_playing = Some(target);
        Ok(url)
    }

    pub fn set_player(&mut self, player: Box<dyn Player>) {
        self.player = player;
    }

    pub fn album_page_url(&self, album: &Album) -> String {
        self.source.album_page_url(album.id)
    }

    /// 새 설정을 적용한다. 받아 둔 페이지는 모두 버리고 현재 탭을 다시 가져온다.
    pub fn apply_settings(&mut self, settings: FetchSettings) {
        self.settings = settings;
        self.reset();
        self.switch_tab(self.active);
    }

    /// 모든 탭의 페이지와 진행 중인 요청에 대한 관심을 버린다. 검색어는 유지한다.
    pub fn reset(&mut self) {
        for kind in ResultSetKind::ALL {
            self.reset_set(kind);
        }
    }

    fn reset_set(&mut self, kind: ResultSetKind) {
        self.store.reset(kind);
        *self.tab_mut(kind) = TabState::default();
    }

    fn query_for(&self, kind: ResultSetKind, page: u32) -> Option<AlbumQuery> {
        let (order, filter) = match kind {
            ResultSetKind::Popular => (Order::RatingDesc, None),
            ResultSetKind::Latest => (Order::DateDesc, None),
            ResultSetKind::Search => (Order::DateDesc, Some(self.search.clone()?)),
        };
        Some(AlbumQuery {
            order,
            filter,
            page,
        })
    }

    fn start_fetch(&mut self, kind: ResultSetKind, page: u32) -> bool {
        let Some(query) = self.query_for(kind, page) else {
            return false;
        };
        self.last_generation += 1;
        let ticket = FetchTicket {
            kind,
            generation: self.last_generation,
            page,
        };
        let tab = self.tab_mut(kind);
        tab.generation = ticket.generation;
        tab.loading = Some(page);
        tab.incoming.clear();
        tab.error = None;

        let worker = FetchWorker::new(Arc::clone(&self.source), self.tx.clone());
        worker.start(FetchRequest {
            ticket,
            query,
            settings: self.settings,
        });
        if self.worker.replace(worker).is_some() {
            log::debug!("previous worker left to finish on its own");
        }
        true
    }

    /// 쌓여 있는 워커 메시지를 모두 처리한다. 기다리지 않는다.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.rx.try_recv() {
            log::trace!("worker event for {:?}", event.ticket());
            event.dispatch(self);
            handled += 1;
        }
        handled
    }

    /// 메시지가 하나 올 때까지 최대 `timeout`만큼 기다린 뒤 쌓인 메시지를 모두 처리한다.
    pub fn pump_wait(&mut self, timeout: Duration) -> usize {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => {
                event.dispatch(self);
                1 + self.pump()
            }
            Err(_) => 0,
        }
    }

    pub fn view(&self, kind: ResultSetKind) -> TabView<'_> {
        let tab = self.tab(kind);
        let set = self.store.get(kind);
        let loading = tab.loading.is_some();
        let albums: &[Album] = if loading {
            &tab.incoming
        } else {
            set.current_page()
                .map(|p| p.albums.as_slice())
                .unwrap_or_default()
        };
        let page_size = self.settings.page_size.get();
        TabView {
            kind,
            albums,
            page: tab.loading.map(|p| p as usize).unwrap_or(set.current_index()),
            loading,
            progress: if loading {
                (tab.incoming.len() as f32 / page_size as f32).min(1.0)
            } else {
                0.0
            },
            can_previous: !loading && set.has_previous(),
            can_next: !loading && self.can_next(kind),
            error: tab.error.as_deref(),
        }
    }

    fn is_current(&self, ticket: &FetchTicket) -> bool {
        let tab = self.tab(ticket.kind);
        let current = tab.generation == ticket.generation && tab.loading.is_some();
        if !current {
            log::debug!(
                "dropping stale {:?} event (generation {}, active {})",
                ticket.kind,
                ticket.generation,
                tab.generation
            );
        }
        current
    }
}

impl FetchListener for Coordinator {
    fn on_item(&mut self, ticket: FetchTicket, mut album: Album) {
        if !self.is_current(&ticket) {
            return;
        }
        album.decode_artwork();
        self.tab_mut(ticket.kind).incoming.push(album);
    }

    fn on_done(&mut self, ticket: FetchTicket, albums: Vec<Album>) {
        if !self.is_current(&ticket) {
            return;
        }
        let tab = self.tab_mut(ticket.kind);
        tab.loading = None;
        let incoming = std::mem::take(&mut tab.incoming);

        if albums.is_empty() {
            tab.exhausted = true;
            return;
        }
        tab.exhausted = false;

        // Reuse covers already decoded while items streamed in.
        let same = incoming.len() == albums.len()
            && incoming.iter().zip(&albums).all(|(a, b)| a.id == b.id);
        let page = if same {
            incoming
        } else {
            albums
                .into_iter()
                .map(|mut a| {
                    a.decode_artwork();
                    a
                })
                .collect()
        };
        self.store.record_page(ticket.kind, page);
    }

    fn on_error(&mut self, ticket: FetchTicket, error: CatalogError) {
        if !self.is_current(&ticket) {
            return;
        }
        let tab = self.tab_mut(ticket.kind);
        tab.loading = None;
        tab.incoming.clear();
        tab.error = Some(error.user_message());
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;
    use std::sync::Mutex;

    use super::*;
    use crate::config::AudioFormat;
    use crate::models::Artwork;
    use crate::sources::testing::{albums, FakeCatalog, Failure};

    #[derive(Clone, Default)]
    struct RecordingPlayer(Arc<Mutex<Vec<String>>>);

    impl Player for RecordingPlayer {
        fn play(&self, url: &str) -> Result<()> {
            self.0.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    fn settings(page_size: u32) -> FetchSettings {
        FetchSettings {
            format: AudioFormat::Ogg2,
            page_size: NonZeroU32::new(page_size).unwrap(),
            image_size: 50,
        }
    }

    fn coordinator(fake: &Arc<FakeCatalog>, page_size: u32) -> Coordinator {
        Coordinator::new(
            fake.clone(),
            Box::new(RecordingPlayer::default()),
            settings(page_size),
        )
    }

    fn settle(c: &mut Coordinator) {
        for _ in 0..200 {
            if !c.is_loading() {
                return;
            }
            c.pump_wait(Duration::from_secs(5));
        }
        panic!("fetch did not finish");
    }

    fn ids(view: &TabView<'_>) -> Vec<u64> {
        view.albums.iter().map(|a| a.id).collect()
    }

    #[test]
    fn test_short_second_page_is_last() {
        let fake = Arc::new(FakeCatalog::new(vec![albums(1..11), albums(11..15)]));
        let mut c = coordinator(&fake, 10);

        c.switch_tab(ResultSetKind::Popular);
        assert!(c.view(ResultSetKind::Popular).loading);
        settle(&mut c);
        let view = c.view(ResultSetKind::Popular);
        assert_eq!(view.page, 1);
        assert_eq!(view.albums.len(), 10);
        assert!(view.can_next);
        assert!(!view.can_previous);

        assert_eq!(c.next(), Navigation::Fetching(2));
        settle(&mut c);
        let view = c.view(ResultSetKind::Popular);
        assert_eq!(view.page, 2);
        assert_eq!(ids(&view), vec![11, 12, 13, 14]);
        assert!(!view.can_next);

        assert_eq!(c.next(), Navigation::NoMore);
        assert_eq!(fake.requested_pages(), vec![1, 2]);
    }

    #[test]
    fn test_previous_and_next_use_cache() {
        let fake = Arc::new(FakeCatalog::new(vec![albums(1..4), albums(4..7)]));
        let mut c = coordinator(&fake, 3);
        c.switch_tab(ResultSetKind::Latest);
        settle(&mut c);
        c.next();
        settle(&mut c);

        assert_eq!(c.previous(), Ok(Navigation::Shown));
        assert_eq!(ids(&c.view(ResultSetKind::Latest)), vec![1, 2, 3]);
        assert_eq!(c.previous(), Err(PagerError::AtFirstPage));
        assert_eq!(c.next(), Navigation::Shown);
        assert_eq!(ids(&c.view(ResultSetKind::Latest)), vec![4, 5, 6]);
        assert_eq!(fake.requested_pages(), vec![1, 2]);
    }

    #[test]
    fn test_empty_page_after_full_page() {
        let fake = Arc::new(FakeCatalog::new(vec![albums(1..4)]));
        let mut c = coordinator(&fake, 3);
        c.switch_tab(ResultSetKind::Popular);
        settle(&mut c);

        assert_eq!(c.next(), Navigation::Fetching(2));
        settle(&mut c);
        let view = c.view(ResultSetKind::Popular);
        assert_eq!(view.page, 1);
        assert_eq!(ids(&view), vec![1, 2, 3]);
        assert!(!view.can_next);
        assert_eq!(c.next(), Navigation::NoMore);
    }

    #[test]
    fn test_track_failure_surfaces_service_error() {
        let fake = Arc::new(
            FakeCatalog::new(vec![albums(40..45)])
                .fail(Failure::Tracks(42), CatalogError::Service { status: 500 }),
        );
        let mut c = coordinator(&fake, 10);
        assert!(c.submit_search("rock", SearchField::Tag));
        settle(&mut c);

        let view = c.view(ResultSetKind::Search);
        assert!(!view.loading);
        assert!(view.albums.is_empty());
        assert!(view.error.unwrap().contains("500"));
        assert_eq!(c.store.get(ResultSetKind::Search).page_count(), 0);
    }

    #[test]
    fn test_failed_next_keeps_cached_pages() {
        let fake = Arc::new(
            FakeCatalog::new(vec![albums(1..3), albums(3..5)]).fail(
                Failure::List(2),
                CatalogError::Network {
                    reason: "timed out".to_string(),
                },
            ),
        );
        let mut c = coordinator(&fake, 2);
        c.switch_tab(ResultSetKind::Popular);
        settle(&mut c);
        c.next();
        settle(&mut c);

        let view = c.view(ResultSetKind::Popular);
        assert_eq!(view.page, 1);
        assert_eq!(ids(&view), vec![1, 2]);
        assert!(view.error.unwrap().contains("Timed out"));
        assert!(view.can_next);
    }

    #[test]
    fn test_image_failure_on_next_page_keeps_cache() {
        let fake = Arc::new(
            FakeCatalog::new(vec![albums(1..3), albums(3..5)]).fail(
                Failure::Image(4),
                CatalogError::Network {
                    reason: "connection reset".to_string(),
                },
            ),
        );
        let mut c = coordinator(&fake, 2);
        c.switch_tab(ResultSetKind::Latest);
        settle(&mut c);
        assert_eq!(c.next(), Navigation::Fetching(2));
        settle(&mut c);

        let view = c.view(ResultSetKind::Latest);
        assert!(!view.loading);
        assert_eq!(view.page, 1);
        assert_eq!(ids(&view), vec![1, 2]);
        assert!(view.error.unwrap().contains("Connection reset"));
        assert_eq!(c.store.get(ResultSetKind::Latest).page_count(), 1);
    }

    #[test]
    fn test_license_failure_records_nothing() {
        let fake = Arc::new(
            FakeCatalog::new(vec![albums(1..3), albums(3..5)])
                .fail(Failure::Licenses(3), CatalogError::Service { status: 404 }),
        );
        let mut c = coordinator(&fake, 2);
        c.switch_tab(ResultSetKind::Popular);
        settle(&mut c);
        c.next();
        settle(&mut c);

        let view = c.view(ResultSetKind::Popular);
        assert_eq!(ids(&view), vec![1, 2]);
        assert!(view.error.unwrap().contains("404"));
        assert_eq!(c.store.get(ResultSetKind::Popular).page_count(), 1);
        assert!(view.can_next);
    }

    #[test]
    fn test_tabs_fetch_lazily_once() {
        let fake = Arc::new(FakeCatalog::new(vec![albums(1..3)]));
        let mut c = coordinator(&fake, 10);
        c.switch_tab(ResultSetKind::Popular);
        settle(&mut c);
        c.switch_tab(ResultSetKind::Latest);
        settle(&mut c);
        c.switch_tab(ResultSetKind::Popular);
        c.switch_tab(ResultSetKind::Latest);
        assert!(!c.is_loading());
        assert_eq!(fake.requested_pages().len(), 2);
    }

    #[test]
    fn test_search_tab_needs_query() {
        let fake = Arc::new(FakeCatalog::new(vec![albums(1..3)]));
        let mut c = coordinator(&fake, 10);
        assert!(!c.submit_search("   ", SearchField::ArtistName));
        c.switch_tab(ResultSetKind::Search);
        assert!(!c.is_loading());
        assert!(fake.requested_pages().is_empty());
    }

    #[test]
    fn test_new_search_discards_previous_results() {
        let fake = Arc::new(FakeCatalog::new(vec![albums(1..3)]));
        let mut c = coordinator(&fake, 2);
        c.submit_search("a", SearchField::ArtistName);
        settle(&mut c);
        c.next();
        settle(&mut c);
        assert_eq!(c.store.get(ResultSetKind::Search).page_count(), 1);

        c.submit_search("b", SearchField::ArtistName);
        settle(&mut c);
        let set = c.store.get(ResultSetKind::Search);
        assert_eq!(set.page_count(), 1);
        assert_eq!(set.current_index(), 1);
        assert_eq!(
            c.search(),
            Some(&(SearchField::ArtistName, "b".to_string()))
        );
    }

    #[test]
    fn test_stale_events_are_dropped() {
        let fake = Arc::new(FakeCatalog::new(vec![albums(1..3)]));
        let mut c = coordinator(&fake, 10);
        c.switch_tab(ResultSetKind::Popular);
        let stale = FetchTicket {
            kind: ResultSetKind::Popular,
            generation: c.tab(ResultSetKind::Popular).generation - 1,
            page: 1,
        };
        c.on_item(stale, albums(90..91).remove(0));
        c.on_done(stale, albums(90..92));
        c.on_error(stale, CatalogError::Service { status: 500 });
        assert!(c.view(ResultSetKind::Popular).error.is_none());

        settle(&mut c);
        assert_eq!(ids(&c.view(ResultSetKind::Popular)), vec![1, 2]);
        assert_eq!(c.store.get(ResultSetKind::Popular).page_count(), 1);
    }

    #[test]
    fn test_background_tab_results_are_kept() {
        let fake = Arc::new(FakeCatalog::new(vec![albums(1..3)]));
        let mut c = coordinator(&fake, 10);
        c.switch_tab(ResultSetKind::Popular);
        c.switch_tab(ResultSetKind::Latest);
        settle(&mut c);
        assert_eq!(c.active(), ResultSetKind::Latest);
        assert_eq!(c.store.get(ResultSetKind::Popular).page_count(), 1);
        assert_eq!(c.store.get(ResultSetKind::Latest).page_count(), 1);
    }

    #[test]
    fn test_items_are_decoded_and_progress_reported() {
        let fake = Arc::new(FakeCatalog::new(vec![albums(1..5)]));
        let mut c = coordinator(&fake, 8);
        c.switch_tab(ResultSetKind::Popular);
        let generation = c.tab(ResultSetKind::Popular).generation;
        let ticket = FetchTicket {
            kind: ResultSetKind::Popular,
            generation,
            page: 1,
        };
        let mut first = albums(1..2).remove(0);
        first.image = Artwork::Fetched(vec![1, 2, 3]);
        c.on_item(ticket, first);
        let view = c.view(ResultSetKind::Popular);
        assert_eq!(view.albums.len(), 1);
        assert!(view.albums[0].image.bitmap().is_some());
        assert_eq!(view.progress, 0.125);

        settle(&mut c);
        let view = c.view(ResultSetKind::Popular);
        assert!(view.albums.iter().all(|a| a.image.bitmap().is_some()));
    }

    #[test]
    fn test_play_marks_target() {
        let fake = Arc::new(FakeCatalog::new(vec![]));
        let player = RecordingPlayer::default();
        let mut c = Coordinator::new(fake, Box::new(player.clone()), settings(10));

        let url = c.play(PlayTarget::Track(4201)).unwrap();
        assert_eq!(url, "fake://track/4201.ogg2");
        assert_eq!(c.now_playing(), Some(PlayTarget::Track(4201)));
        assert_eq!(*player.0.lock().unwrap(), vec![url]);
    }

    #[test]
    fn test_apply_settings_resets_and_refetches() {
        let fake = Arc::new(FakeCatalog::new(vec![albums(1..11)]));
        let mut c = coordinator(&fake, 10);
        c.switch_tab(ResultSetKind::Popular);
        settle(&mut c);
        c.switch_tab(ResultSetKind::Latest);
        settle(&mut c);

        let mut new = settings(5);
        new.format = AudioFormat::Mp31;
        c.apply_settings(new);
        settle(&mut c);

        assert_eq!(c.store.get(ResultSetKind::Popular).page_count(), 0);
        assert_eq!(c.view(ResultSetKind::Latest).albums.len(), 5);
        assert_eq!(c.play(PlayTarget::Album(1)).unwrap(), "fake://album/1.mp31");
    }
}
