use crate::config::{
    DEFAULT_SKILL_LEVEL, MAX_HASH_MB, MAX_SKILL_LEVEL, MIN_HASH_MB, MIN_SKILL_LEVEL,
};

use super::UciCommand;

pub const OPTION_THREADS: &str = "Threads";
pub const OPTION_SKILL_LEVEL: &str = "Skill Level";
pub const OPTION_PONDER: &str = "Ponder";
pub const OPTION_HASH: &str = "Hash";

#[must_use]
pub fn clamp_skill_level(level: i64) -> u8 {
    // Bounds fit in u8, so the cast after clamping is lossless.
    level.clamp(i64::from(MIN_SKILL_LEVEL), i64::from(MAX_SKILL_LEVEL)) as u8
}

#[must_use]
pub fn clamp_hash_mb(mb: i64) -> u32 {
    mb.clamp(i64::from(MIN_HASH_MB), i64::from(MAX_HASH_MB)) as u32
}

/// Option values that outlive any single worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub skill_level: u8,
    /// None until the caller sets it; the worker keeps its own default
    pub hash_mb: Option<u32>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// What the current worker has been told so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedOptions {
    skill_level: Option<u8>,
    hash_mb: Option<u32>,
}

impl EngineOptions {
    #[must_use]
    pub fn new() -> Self {
        EngineOptions {
            skill_level: DEFAULT_SKILL_LEVEL,
            hash_mb: None,
        }
    }

    /// Store a clamped skill level and return the stored value.
    pub fn set_skill_level(&mut self, level: i64) -> u8 {
        self.skill_level = clamp_skill_level(level);
        self.skill_level
    }

    /// Store a clamped hash size and return the stored value.
    pub fn set_hash_mb(&mut self, mb: i64) -> u32 {
        let mb = clamp_hash_mb(mb);
        self.hash_mb = Some(mb);
        mb
    }

    /// Full command sequence written to a freshly launched worker.
    ///
    /// `applied` is reset to reflect exactly what this sequence transmits.
    pub fn handshake_commands(&self, threads: usize, applied: &mut AppliedOptions) -> Vec<UciCommand> {
        *applied = AppliedOptions::default();

        let mut commands = vec![
            UciCommand::Uci,
            UciCommand::UciNewGame,
            UciCommand::set_option(OPTION_THREADS, threads),
        ];
        commands.extend(self.skill_command(applied));
        commands.push(UciCommand::set_option(OPTION_PONDER, false));
        commands.extend(self.hash_command(applied));
        commands
    }

    /// Commands for values that changed since `applied` was recorded.
    pub fn resync_commands(&self, applied: &mut AppliedOptions) -> Vec<UciCommand> {
        self.skill_command(applied)
            .into_iter()
            .chain(self.hash_command(applied))
            .collect()
    }

    fn skill_command(&self, applied: &mut AppliedOptions) -> Option<UciCommand> {
        if applied.skill_level == Some(self.skill_level) {
            return None;
        }
        applied.skill_level = Some(self.skill_level);
        Some(UciCommand::set_option(OPTION_SKILL_LEVEL, self.skill_level))
    }

    fn hash_command(&self, applied: &mut AppliedOptions) -> Option<UciCommand> {
        let mb = self.hash_mb?;
        if applied.hash_mb == Some(mb) {
            return None;
        }
        applied.hash_mb = Some(mb);
        Some(UciCommand::set_option(OPTION_HASH, mb))
    }
}
