use crate::models::{Album, Track};

/// 초 단위 길이를 `MM:SS`로, 한 시간 이상이면 `HH:MM:SS`로 표시한다.
pub fn format_duration(secs: u32) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{:02}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

/// 앨범 행의 툴팁 줄들.
pub fn album_details(album: &Album) -> Vec<String> {
    let release = album
        .release_date()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    vec![
        album.display_name().to_string(),
        format!("아티스트: {}", album.display_artist()),
        format!("장르: {}", album.genre.as_deref().unwrap_or("")),
        format!("발매일: {}", release),
        format!("라이선스: {}", album.license().unwrap_or("")),
    ]
}

/// 트랙 행 이름. 앨범 순서대로 1부터 번호를 붙인다.
pub fn track_label(index: usize, track: &Track) -> String {
    format!("{:02}. {}", index + 1, track.name)
}
