use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crate::config::FetchSettings;
use crate::core::pager::ResultSetKind;
use crate::models::Album;
use crate::sources::{AlbumQuery, CatalogError, CatalogSource};

/// 요청 하나를 식별한다. 결과가 어느 탭의 몇 번째 요청에 대한 것인지 알려준다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub kind: ResultSetKind,
    pub generation: u64,
    pub page: u32,
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub ticket: FetchTicket,
    pub query: AlbumQuery,
    pub settings: FetchSettings,
}

/// 백그라운드 스레드가 UI 쪽으로 보내는 메시지.
#[derive(Debug)]
pub enum FetchEvent {
    Item(FetchTicket, Album),
    Done(FetchTicket, Vec<Album>),
    Failed(FetchTicket, CatalogError),
}

impl FetchEvent {
    pub fn ticket(&self) -> FetchTicket {
        match self {
            FetchEvent::Item(t, _) | FetchEvent::Done(t, _) | FetchEvent::Failed(t, _) => *t,
        }
    }

    pub fn dispatch<L: FetchListener + ?Sized>(self, listener: &mut L) {
        match self {
            FetchEvent::Item(ticket, album) => listener.on_item(ticket, album),
            FetchEvent::Done(ticket, albums) => listener.on_done(ticket, albums),
            FetchEvent::Failed(ticket, error) => listener.on_error(ticket, error),
        }
    }
}

/// UI 스레드에서 실행되는 요청 콜백.
/// 요청마다 `on_item`이 0번 이상 불린 뒤 `on_done`과 `on_error` 중 정확히 하나가 불린다.
pub trait FetchListener {
    fn on_item(&mut self, ticket: FetchTicket, album: Album);
    fn on_done(&mut self, ticket: FetchTicket, albums: Vec<Album>);
    fn on_error(&mut self, ticket: FetchTicket, error: CatalogError);
}

/// 카탈로그 요청을 백그라운드 스레드에서 실행한다.
///
/// 결과는 채널로만 전달되고, 같은 워커로 들어온 요청은 내부 잠금으로 한 번에 하나씩 처리된다.
/// 진행 중인 요청을 취소하는 방법은 없다.
pub struct FetchWorker {
    source: Arc<dyn CatalogSource>,
    events: Sender<FetchEvent>,
    lock: Arc<Mutex<()>>,
}

impl FetchWorker {
    pub fn new(source: Arc<dyn CatalogSource>, events: Sender<FetchEvent>) -> Self {
        Self {
            source,
            events,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// 요청을 시작하고 바로 반환한다.
    pub fn start(&self, request: FetchRequest) -> JoinHandle<()> {
        let source = Arc::clone(&self.source);
        let events = self.events.clone();
        let lock = Arc::clone(&self.lock);

        thread::spawn(move || {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            run(source.as_ref(), request, &events);
        })
    }
}

fn run(source: &dyn CatalogSource, request: FetchRequest, events: &Sender<FetchEvent>) {
    let ticket = request.ticket;
    log::debug!(
        "{}: fetching {:?} page {} (generation {})",
        source.name(),
        ticket.kind,
        ticket.page,
        ticket.generation
    );

    let result = source.fetch_page(&request.query, &request.settings, &mut |album| {
        let _ = events.send(FetchEvent::Item(ticket, album.clone()));
    });

    match result {
        Ok(albums) => {
            log::debug!("{:?} page {}: {} albums", ticket.kind, ticket.page, albums.len());
            let _ = events.send(FetchEvent::Done(ticket, albums));
        }
        Err(e) => {
            log::warn!("{:?} page {} failed: {}", ticket.kind, ticket.page, e);
            let _ = events.send(FetchEvent::Failed(ticket, e));
        }
    }
}
