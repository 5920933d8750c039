use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::{Cell, Table};
use dialoguer::{Input, Select};

use crate::config::{self, AudioFormat, Config};
use crate::core::coordinator::{Coordinator, Navigation};
use crate::core::format::{format_duration, track_label};
use crate::core::pager::ResultSetKind;
use crate::core::player;
use crate::models::PlayTarget;
use crate::sources::jamendo::JamendoClient;
use crate::sources::{CatalogSource, SearchField};

#[derive(Parser)]
#[command(name = "jamendo-sidebar", about = "Jamendo 무료 음악 카탈로그 브라우저")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// GUI 모드로 실행
    #[arg(long)]
    pub gui: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 앨범 목록을 페이지 단위로 둘러보기
    Browse {
        /// 볼 목록
        #[arg(value_enum)]
        tab: TabArg,
        /// 검색어 (search 목록에서 필수)
        #[arg(long, short)]
        query: Option<String>,
        /// 검색어를 적용할 필드
        #[arg(long, value_enum, default_value = "artist")]
        by: FieldArg,
    },
    /// 트랙 또는 앨범의 스트림 주소 출력
    StreamUrl {
        /// 트랙 id (--album이면 앨범 id)
        id: u64,
        #[arg(long)]
        album: bool,
    },
    /// 재생 형식, 페이지 크기, 플레이어 설정
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum TabArg {
    Search,
    Popular,
    Latest,
}

impl From<TabArg> for ResultSetKind {
    fn from(tab: TabArg) -> Self {
        match tab {
            TabArg::Search => ResultSetKind::Search,
            TabArg::Popular => ResultSetKind::Popular,
            TabArg::Latest => ResultSetKind::Latest,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum FieldArg {
    Artist,
    Tag,
}

impl From<FieldArg> for SearchField {
    fn from(field: FieldArg) -> Self {
        match field {
            FieldArg::Artist => SearchField::ArtistName,
            FieldArg::Tag => SearchField::Tag,
        }
    }
}

pub fn run(cli: Cli, cfg: Config) -> Result<()> {
    match cli.command {
        Some(Commands::Browse { tab, query, by }) => cmd_browse(&cfg, tab.into(), query, by.into()),
        Some(Commands::StreamUrl { id, album }) => cmd_stream_url(&cfg, id, album),
        Some(Commands::Config) => cmd_config(cfg),
        None => {
            if cli.gui {
                #[cfg(feature = "gui")]
                {
                    crate::gui::launch(cfg)
                }
                #[cfg(not(feature = "gui"))]
                {
                    anyhow::bail!(
                        "GUI 기능이 활성화되지 않았습니다. 다시 빌드하세요: cargo build --features gui"
                    );
                }
            } else {
                println!("사용법: jamendo-sidebar <명령어> 또는 jamendo-sidebar --gui");
                println!("자세한 정보는 jamendo-sidebar --help를 실행하세요.");
                Ok(())
            }
        }
    }
}

fn new_coordinator(cfg: &Config) -> Result<Coordinator> {
    let client = JamendoClient::new(&cfg.catalog)?;
    Ok(Coordinator::new(
        Arc::new(client),
        player::from_config(&cfg.playback),
        cfg.fetch_settings(),
    ))
}

fn wait_for_fetch(coord: &mut Coordinator) {
    if coord.view(coord.active()).loading {
        println!("앨범을 가져오는 중입니다...");
    }
    while coord.view(coord.active()).loading {
        coord.pump_wait(Duration::from_millis(200));
    }
}

fn print_page(coord: &Coordinator) {
    let view = coord.view(coord.active());
    if let Some(err) = view.error {
        println!("\n{}\n", err);
    }
    if view.albums.is_empty() {
        println!("앨범이 없습니다.");
        return;
    }

    let playing = coord.now_playing();
    let mut table = Table::new();
    table.set_header(vec!["", "앨범", "아티스트", "장르", "발매일", "길이", "트랙"]);
    for album in view.albums {
        let marker = if playing == Some(PlayTarget::Album(album.id))
            || album
                .tracks
                .iter()
                .any(|t| playing == Some(PlayTarget::Track(t.id)))
        {
            "▶"
        } else {
            ""
        };
        table.add_row(vec![
            Cell::new(marker),
            Cell::new(album.display_name()),
            Cell::new(album.display_artist()),
            Cell::new(album.genre.as_deref().unwrap_or("-")),
            Cell::new(
                album
                    .release_date()
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(format_duration(album.duration)),
            Cell::new(album.tracks.len()),
        ]);
    }
    println!("{table}");
    match coord.search().filter(|_| view.kind == ResultSetKind::Search) {
        Some((field, text)) => println!(
            "{} ({}: {}) - {}페이지",
            view.kind.label(),
            field.label(),
            text,
            view.page
        ),
        None => println!("{} - {}페이지", view.kind.label(), view.page),
    }
}

#[derive(Clone, Copy)]
enum Action {
    Next,
    Previous,
    PlayAlbum,
    PlayTrack,
    AlbumPage,
    Quit,
}

fn cmd_browse(
    cfg: &Config,
    kind: ResultSetKind,
    query: Option<String>,
    field: SearchField,
) -> Result<()> {
    let mut coord = new_coordinator(cfg)?;

    if kind == ResultSetKind::Search {
        let query = query.context("search 목록에는 --query 검색어가 필요합니다")?;
        if !coord.submit_search(&query, field) {
            anyhow::bail!("검색어가 비어 있습니다");
        }
    } else {
        coord.switch_tab(kind);
    }

    loop {
        wait_for_fetch(&mut coord);
        print_page(&coord);

        let (can_next, can_previous, has_albums) = {
            let view = coord.view(kind);
            (view.can_next, view.can_previous, !view.albums.is_empty())
        };

        let mut actions = Vec::new();
        if can_next {
            actions.push((Action::Next, "다음 페이지"));
        }
        if can_previous {
            actions.push((Action::Previous, "이전 페이지"));
        }
        if has_albums {
            actions.push((Action::PlayAlbum, "앨범 재생"));
            actions.push((Action::PlayTrack, "트랙 재생"));
            actions.push((Action::AlbumPage, "앨범 웹 페이지 주소"));
        }
        actions.push((Action::Quit, "종료"));

        let labels: Vec<&str> = actions.iter().map(|(_, l)| *l).collect();
        let selection = Select::new()
            .with_prompt("선택하세요")
            .items(&labels)
            .default(0)
            .interact()?;

        match actions[selection].0 {
            Action::Next => {
                if coord.next() == Navigation::NoMore {
                    println!("마지막 페이지입니다.");
                }
            }
            Action::Previous => {
                if let Err(e) = coord.previous() {
                    println!("이동할 수 없습니다: {}", e);
                }
            }
            Action::PlayAlbum => {
                if let Some(id) = pick_album(&coord)? {
                    play(&mut coord, PlayTarget::Album(id))?;
                }
            }
            Action::PlayTrack => {
                if let Some(id) = pick_track(&coord)? {
                    play(&mut coord, PlayTarget::Track(id))?;
                }
            }
            Action::AlbumPage => {
                if let Some(id) = pick_album(&coord)? {
                    let view = coord.view(kind);
                    if let Some(album) = view.albums.iter().find(|a| a.id == id) {
                        println!("{}", coord.album_page_url(album));
                    }
                }
            }
            Action::Quit => break,
        }
    }

    Ok(())
}

fn pick_album(coord: &Coordinator) -> Result<Option<u64>> {
    let view = coord.view(coord.active());
    let mut items: Vec<String> = view.albums.iter().map(|a| a.summary()).collect();
    items.push("취소".to_string());

    let selection = Select::new()
        .with_prompt("앨범을 선택하세요")
        .items(&items)
        .default(0)
        .interact()?;

    Ok(view.albums.get(selection).map(|a| a.id))
}

fn pick_track(coord: &Coordinator) -> Result<Option<u64>> {
    let Some(album_id) = pick_album(coord)? else {
        return Ok(None);
    };
    let view = coord.view(coord.active());
    let Some(album) = view.albums.iter().find(|a| a.id == album_id) else {
        return Ok(None);
    };

    let mut items: Vec<String> = album
        .tracks
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{} ({})", track_label(i, t), format_duration(t.duration)))
        .collect();
    items.push("취소".to_string());

    let selection = Select::new()
        .with_prompt("트랙을 선택하세요")
        .items(&items)
        .default(0)
        .interact()?;

    Ok(album.tracks.get(selection).map(|t| t.id))
}

fn play(coord: &mut Coordinator, target: PlayTarget) -> Result<()> {
    let url = coord.play(target)?;
    println!("재생: {}", url);
    Ok(())
}

fn cmd_stream_url(cfg: &Config, id: u64, album: bool) -> Result<()> {
    let client = JamendoClient::new(&cfg.catalog)?;
    let target = if album {
        PlayTarget::Album(id)
    } else {
        PlayTarget::Track(id)
    };
    println!("{}", client.stream_url(target, cfg.playback.format));
    Ok(())
}

fn cmd_config(mut cfg: Config) -> Result<()> {
    println!("Jamendo 설정\n");

    let formats: Vec<&str> = AudioFormat::ALL.iter().map(|f| f.as_str()).collect();
    let current = AudioFormat::ALL
        .iter()
        .position(|f| *f == cfg.playback.format)
        .unwrap_or(0);
    let format_idx = Select::new()
        .with_prompt("선호하는 재생 형식")
        .items(&formats)
        .default(current)
        .interact()?;

    let per_page: u32 = Input::new()
        .with_prompt("페이지당 앨범 수")
        .with_initial_text(cfg.playback.albums_per_page.to_string())
        .validate_with(|n: &u32| -> Result<(), &str> {
            if *n > 0 {
                Ok(())
            } else {
                Err("1 이상이어야 합니다")
            }
        })
        .interact_text()?;

    let player: String = Input::new()
        .with_prompt("플레이어 명령 (비우면 주소만 출력)")
        .with_initial_text(cfg.playback.player.clone().unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;

    cfg.playback.format = AudioFormat::ALL[format_idx];
    cfg.playback.albums_per_page =
        NonZeroU32::new(per_page).context("페이지당 앨범 수는 1 이상이어야 합니다")?;
    cfg.playback.player = Some(player.trim().to_string()).filter(|p| !p.is_empty());

    config::save_config(&cfg)?;
    println!("\n설정이 저장되었습니다!");
    Ok(())
}
