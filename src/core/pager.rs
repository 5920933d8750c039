use std::sync::Arc;

use thiserror::Error;

use crate::models::Album;

/// 탭 하나에 해당하는 결과 묶음 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultSetKind {
    Search,
    Popular,
    Latest,
}

impl ResultSetKind {
    pub const ALL: [ResultSetKind; 3] = [
        ResultSetKind::Search,
        ResultSetKind::Popular,
        ResultSetKind::Latest,
    ];

    pub fn index(self) -> usize {
        match self {
            ResultSetKind::Search => 0,
            ResultSetKind::Popular => 1,
            ResultSetKind::Latest => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ResultSetKind::Search => "검색 결과",
            ResultSetKind::Popular => "인기",
            ResultSetKind::Latest => "최신",
        }
    }
}

/// 한 번의 요청으로 받은 앨범 목록.
#[derive(Debug)]
pub struct Page {
    pub albums: Vec<Album>,
}

impl Page {
    pub fn is_full(&self, page_size: u32) -> bool {
        self.albums.len() >= page_size as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PagerError {
    #[error("already at the first page")]
    AtFirstPage,
}

/// `go_next`의 결과.
#[derive(Debug, Clone)]
pub enum NextPage {
    /// 이미 받아 둔 페이지로 이동했다.
    Cached(Arc<Page>),
    /// 캐시 범위를 벗어났다. 이 번호의 페이지를 받아와야 한다.
    NeedFetch(u32),
}

/// 결과 묶음 하나의 페이지 캐시.
///
/// `current`는 1부터 시작하며, 페이지가 하나라도 있으면 항상 `1..=pages.len()` 안에 있다.
#[derive(Debug)]
pub struct ResultSet {
    pages: Vec<Arc<Page>>,
    current: usize,
}

impl Default for ResultSet {
    fn default() -> Self {
        Self {
            pages: Vec::new(),
            current: 1,
        }
    }
}

impl ResultSet {
    pub fn record_page(&mut self, albums: Vec<Album>) -> Arc<Page> {
        let page = Arc::new(Page { albums });
        self.pages.push(Arc::clone(&page));
        self.current = self.pages.len();
        page
    }

    pub fn go_previous(&mut self) -> Result<Arc<Page>, PagerError> {
        if self.current <= 1 || self.pages.is_empty() {
            return Err(PagerError::AtFirstPage);
        }
        self.current -= 1;
        Ok(Arc::clone(&self.pages[self.current - 1]))
    }

    pub fn go_next(&mut self) -> NextPage {
        if self.current >= self.pages.len() {
            return NextPage::NeedFetch(self.pages.len() as u32 + 1);
        }
        self.current += 1;
        NextPage::Cached(Arc::clone(&self.pages[self.current - 1]))
    }

    pub fn reset(&mut self) {
        self.pages.clear();
        self.current = 1;
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn current_page(&self) -> Option<&Arc<Page>> {
        self.pages.get(self.current - 1)
    }

    pub fn has_previous(&self) -> bool {
        self.current > 1
    }

    /// 다음 페이지가 있을 수 있는지. 캐시에 다음 페이지가 있거나,
    /// 마지막 페이지가 꽉 차 있을 때만 참이다. 서비스의 전체 개수는 쓰지 않는다.
    pub fn has_next(&self, page_size: u32) -> bool {
        if self.current < self.pages.len() {
            return true;
        }
        self.current_page()
            .is_some_and(|page| page.is_full(page_size))
    }
}

/// 세 결과 묶음(검색, 인기, 최신)의 페이지 캐시.
#[derive(Debug, Default)]
pub struct PageStore {
    sets: [ResultSet; 3],
}

impl PageStore {
    pub fn get(&self, kind: ResultSetKind) -> &ResultSet {
        &self.sets[kind.index()]
    }

    pub fn record_page(&mut self, kind: ResultSetKind, albums: Vec<Album>) -> Arc<Page> {
        self.sets[kind.index()].record_page(albums)
    }

    pub fn go_previous(&mut self, kind: ResultSetKind) -> Result<Arc<Page>, PagerError> {
        self.sets[kind.index()].go_previous()
    }

    pub fn go_next(&mut self, kind: ResultSetKind) -> NextPage {
        self.sets[kind.index()].go_next()
    }

    pub fn reset(&mut self, kind: ResultSetKind) {
        self.sets[kind.index()].reset();
    }
}
