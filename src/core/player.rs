use std::process::{Command, Stdio};

use anyhow::{Context, Result};

use crate::config::PlaybackConfig;

/// 스트림 URL을 받아 실제로 재생하는 외부 플레이어.
pub trait Player {
    fn play(&self, url: &str) -> Result<()>;
}

/// 설정된 명령 뒤에 URL을 붙여 실행한다. 예: `mpv --no-video`.
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
}

impl CommandPlayer {
    pub fn new(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl Player for CommandPlayer {
    fn play(&self, url: &str) -> Result<()> {
        log::info!("launching {} {}", self.program, url);
        Command::new(&self.program)
            .args(&self.args)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("플레이어를 실행할 수 없습니다: {}", self.program))?;
        Ok(())
    }
}

/// 플레이어가 설정되지 않았을 때. URL은 화면에만 표시된다.
pub struct NoPlayer;

impl Player for NoPlayer {
    fn play(&self, url: &str) -> Result<()> {
        log::info!("no player configured, stream url: {}", url);
        Ok(())
    }
}

pub fn from_config(config: &PlaybackConfig) -> Box<dyn Player> {
    match config.player.as_deref().and_then(CommandPlayer::new) {
        Some(player) => Box::new(player),
        None => Box::new(NoPlayer),
    }
}
