use std::collections::HashMap;
use std::time::Duration;

use egui::{ColorImage, TextureHandle};

use crate::config::{self, AudioFormat, Config};
use crate::core::coordinator::{Coordinator, Navigation};
use crate::core::format::{album_details, format_duration, track_label};
use crate::core::pager::ResultSetKind;
use crate::core::player;
use crate::models::{Album, PlayTarget};
use crate::sources::SearchField;

/// 이번 프레임에 사용자가 누른 동작. 패널을 다 그린 뒤에 적용한다.
enum UiAction {
    Search,
    SwitchTab(ResultSetKind),
    Previous,
    Next,
    Play(PlayTarget),
    OpenAlbumPage(u64),
}

/// 지금 보이는 앨범이 아닌 표지를 버린다.
fn retain_shown<T>(covers: &mut HashMap<u64, T>, shown: &[Album]) {
    covers.retain(|id, _| shown.iter().any(|a| a.id == *id));
}

pub struct JamendoApp {
    coordinator: Coordinator,
    config: Config,

    // Search
    search_text: String,
    search_field: SearchField,

    // Album covers by album id
    covers: HashMap<u64, TextureHandle>,

    // Settings window
    show_settings: bool,
    draft_format: AudioFormat,
    draft_page_size: u32,
    draft_player: String,

    status_msg: String,
}

impl JamendoApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: Config, coordinator: Coordinator) -> Self {
        Self::setup_korean_fonts(&cc.egui_ctx);

        Self {
            coordinator,
            draft_format: config.playback.format,
            draft_page_size: config.playback.albums_per_page.get(),
            draft_player: config.playback.player.clone().unwrap_or_default(),
            config,
            search_text: String::new(),
            search_field: SearchField::default(),
            covers: HashMap::new(),
            show_settings: false,
            status_msg: String::new(),
        }
    }

    fn setup_korean_fonts(ctx: &egui::Context) {
        let mut fonts = egui::FontDefinitions::default();

        let font_paths = [
            "/System/Library/Fonts/AppleSDGothicNeo.ttc",
            "/System/Library/Fonts/Supplemental/AppleGothic.ttf",
            // Linux
            "/usr/share/fonts/truetype/noto/NotoSansCJK-Regular.ttc",
            "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
            "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
        ];

        for path in &font_paths {
            if let Ok(font_data) = std::fs::read(path) {
                fonts.font_data.insert(
                    "korean_font".to_string(),
                    egui::FontData::from_owned(font_data),
                );
                for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
                    if let Some(list) = fonts.families.get_mut(&family) {
                        list.push("korean_font".to_string());
                    }
                }
                ctx.set_fonts(fonts);
                return;
            }
        }
    }

    /// 화면에 보이는 앨범의 표지만 텍스처로 유지한다.
    fn sync_covers(&mut self, ctx: &egui::Context) {
        let view = self.coordinator.view(self.coordinator.active());
        retain_shown(&mut self.covers, view.albums);
        for album in view.albums {
            if self.covers.contains_key(&album.id) {
                continue;
            }
            let Some(bitmap) = album.image.bitmap() else {
                continue;
            };
            let size = [bitmap.width() as usize, bitmap.height() as usize];
            let color_image = ColorImage::from_rgba_unmultiplied(size, bitmap.as_raw());
            let texture = ctx.load_texture(
                format!("cover_{}", album.id),
                color_image,
                Default::default(),
            );
            self.covers.insert(album.id, texture);
        }
    }

    fn apply(&mut self, action: UiAction, ctx: &egui::Context) {
        match action {
            UiAction::Search => {
                if self
                    .coordinator
                    .submit_search(&self.search_text, self.search_field)
                {
                    self.status_msg.clear();
                }
            }
            UiAction::SwitchTab(kind) => self.coordinator.switch_tab(kind),
            UiAction::Previous => {
                if let Err(e) = self.coordinator.previous() {
                    self.status_msg = e.to_string();
                }
            }
            UiAction::Next => {
                if self.coordinator.next() == Navigation::NoMore {
                    self.status_msg = "마지막 페이지입니다".to_string();
                }
            }
            UiAction::Play(target) => match self.coordinator.play(target) {
                Ok(url) => self.status_msg = format!("재생: {}", url),
                Err(e) => self.status_msg = format!("재생 실패: {:#}", e),
            },
            UiAction::OpenAlbumPage(id) => {
                let view = self.coordinator.view(self.coordinator.active());
                if let Some(album) = view.albums.iter().find(|a| a.id == id) {
                    let url = self.coordinator.album_page_url(album);
                    ctx.open_url(egui::OpenUrl::new_tab(url));
                }
            }
        }
    }

    fn save_settings(&mut self) {
        self.draft_page_size = self.draft_page_size.max(1);
        self.config.playback.format = self.draft_format;
        if let Some(n) = std::num::NonZeroU32::new(self.draft_page_size) {
            self.config.playback.albums_per_page = n;
        }
        let player = self.draft_player.trim();
        self.config.playback.player = (!player.is_empty()).then(|| player.to_string());

        match config::save_config(&self.config) {
            Ok(_) => self.status_msg = "설정이 저장되었습니다".to_string(),
            Err(e) => self.status_msg = format!("설정 저장 실패: {:#}", e),
        }
        self.coordinator
            .set_player(player::from_config(&self.config.playback));
        self.coordinator.apply_settings(self.config.fetch_settings());
        self.covers.clear();
    }

    fn album_row(
        ui: &mut egui::Ui,
        album: &Album,
        cover: Option<&TextureHandle>,
        playing: Option<PlayTarget>,
        action: &mut Option<UiAction>,
    ) {
        ui.horizontal(|ui| {
            if let Some(texture) = cover {
                let size = texture.size_vec2();
                let scale = (50.0 / size.x).min(50.0 / size.y).min(1.0);
                ui.image(egui::load::SizedTexture::new(texture.id(), size * scale));
            } else {
                ui.allocate_space(egui::vec2(50.0, 50.0));
            }

            let details = album_details(album).join("\n");
            ui.vertical(|ui| {
                let mut title = egui::RichText::new(album.display_name()).strong();
                if playing == Some(PlayTarget::Album(album.id)) {
                    title = title.italics();
                }
                ui.label(title).on_hover_text(details.as_str());
                ui.label(format!("아티스트: {}", album.display_artist()));
            });

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(format_duration(album.duration));
                if ui.button("▶").on_hover_text("앨범 재생").clicked() {
                    *action = Some(UiAction::Play(PlayTarget::Album(album.id)));
                }
                if ui.button("웹").on_hover_text("앨범 페이지 열기").clicked() {
                    *action = Some(UiAction::OpenAlbumPage(album.id));
                }
            });
        });

        ui.push_id(album.id, |ui| {
            ui.collapsing(format!("트랙 {}개", album.tracks.len()), |ui| {
                for (i, track) in album.tracks.iter().enumerate() {
                    ui.horizontal(|ui| {
                        let marker = if playing == Some(PlayTarget::Track(track.id)) {
                            "▶ "
                        } else {
                            ""
                        };
                        let label = format!("{}{}", marker, track_label(i, track));
                        if ui
                            .selectable_label(false, egui::RichText::new(label).small())
                            .on_hover_text(format!(
                                "{}\n앨범: {}\n길이: {}",
                                track.name,
                                album.display_name(),
                                format_duration(track.duration)
                            ))
                            .double_clicked()
                        {
                            *action = Some(UiAction::Play(PlayTarget::Track(track.id)));
                        }
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            ui.small(format_duration(track.duration));
                        });
                    });
                }
            });
        });
        ui.separator();
    }
}

impl eframe::App for JamendoApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.coordinator.pump();
        self.sync_covers(ctx);
        if self.coordinator.is_loading() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }

        let mut action = None;
        let active = self.coordinator.active();

        // Top panel: search + tabs
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let response = ui.text_edit_singleline(&mut self.search_text);
                egui::ComboBox::new("search_field", "")
                    .selected_text(self.search_field.label())
                    .show_ui(ui, |ui| {
                        for field in SearchField::ALL {
                            ui.selectable_value(&mut self.search_field, field, field.label());
                        }
                    });
                if ui.button("검색").clicked()
                    || (response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)))
                {
                    action = Some(UiAction::Search);
                }
                if ui.button("⚙").on_hover_text("설정").clicked() {
                    self.show_settings = true;
                }
            });
            ui.horizontal(|ui| {
                for kind in ResultSetKind::ALL {
                    if ui.selectable_label(active == kind, kind.label()).clicked() && active != kind
                    {
                        action = Some(UiAction::SwitchTab(kind));
                    }
                }
            });
        });

        // Bottom panel: paging + status
        egui::TopBottomPanel::bottom("nav_panel").show(ctx, |ui| {
            let view = self.coordinator.view(active);
            if view.loading {
                ui.add(
                    egui::ProgressBar::new(view.progress).text("앨범을 가져오는 중입니다..."),
                );
            }
            ui.horizontal(|ui| {
                if ui
                    .add_enabled(view.can_previous, egui::Button::new("◀ 이전"))
                    .clicked()
                {
                    action = Some(UiAction::Previous);
                }
                ui.label(format!("{}페이지", view.page));
                if ui
                    .add_enabled(view.can_next, egui::Button::new("다음 ▶"))
                    .clicked()
                {
                    action = Some(UiAction::Next);
                }
            });
            if let Some(err) = view.error {
                ui.colored_label(egui::Color32::LIGHT_RED, err);
            } else if !self.status_msg.is_empty() {
                ui.label(&self.status_msg);
            }
        });

        // Central panel: album list
        egui::CentralPanel::default().show(ctx, |ui| {
            let view = self.coordinator.view(active);
            if view.albums.is_empty() && !view.loading {
                ui.centered_and_justified(|ui| {
                    ui.label(match active {
                        ResultSetKind::Search => "검색어를 입력하세요",
                        _ => "앨범이 없습니다",
                    });
                });
                return;
            }
            let playing = self.coordinator.now_playing();
            egui::ScrollArea::vertical().show(ui, |ui| {
                for album in view.albums {
                    Self::album_row(ui, album, self.covers.get(&album.id), playing, &mut action);
                }
            });
        });

        // Settings window
        let mut save = false;
        egui::Window::new("설정")
            .open(&mut self.show_settings)
            .collapsible(false)
            .show(ctx, |ui| {
                egui::Grid::new("settings_grid")
                    .num_columns(2)
                    .spacing([10.0, 6.0])
                    .show(ui, |ui| {
                        ui.label("재생 형식:");
                        egui::ComboBox::new("format_combo", "")
                            .selected_text(self.draft_format.as_str())
                            .show_ui(ui, |ui| {
                                for format in AudioFormat::ALL {
                                    ui.selectable_value(
                                        &mut self.draft_format,
                                        format,
                                        format.as_str(),
                                    );
                                }
                            });
                        ui.end_row();

                        ui.label("페이지당 앨범 수:");
                        ui.add(egui::DragValue::new(&mut self.draft_page_size));
                        ui.end_row();

                        ui.label("플레이어 명령:");
                        ui.text_edit_singleline(&mut self.draft_player);
                        ui.end_row();
                    });
                if ui.button("저장").clicked() {
                    save = true;
                }
            });
        if save {
            self.save_settings();
            self.show_settings = false;
        }

        if let Some(action) = action {
            self.apply(action, ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::testing::albums;

    #[test]
    fn test_covers_follow_shown_page() {
        let mut covers: HashMap<u64, &str> = HashMap::new();
        for id in 1..6 {
            covers.insert(id, "cover");
        }

        retain_shown(&mut covers, &albums(4..9));

        let mut kept: Vec<u64> = covers.keys().copied().collect();
        kept.sort();
        assert_eq!(kept, vec![4, 5]);
    }
}
