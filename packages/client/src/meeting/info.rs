//! 会議 ID と会議情報

use std::fmt;

use rand::Rng;

use crate::error::MeetingError;

/// 会議 ID（6 桁の ASCII 数字）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeetingId(String);

impl MeetingId {
    /// 桁数
    pub const LEN: usize = 6;

    /// 入力文字列を検証して会議 ID を作成する（前後の空白は無視）
    pub fn parse(input: &str) -> Result<Self, MeetingError> {
        let trimmed = input.trim();
        if trimmed.len() == Self::LEN && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(MeetingError::InvalidMeetingId(input.to_string()))
        }
    }

    /// 100000..=999999 の範囲でランダムな ID を生成する
    pub fn generate() -> Self {
        let value: u32 = rand::rng().random_range(100_000..=999_999);
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MeetingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// ローカルにキャッシュされる会議情報
///
/// `participants` の先頭は常にホスト。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingInfo {
    pub meeting_id: MeetingId,
    pub host: String,
    pub participants: Vec<String>,
    /// 作成時刻（Unix ミリ秒）
    pub created_at: i64,
}

impl MeetingInfo {
    pub fn new(meeting_id: MeetingId, host: impl Into<String>, created_at: i64) -> Self {
        let host = host.into();
        Self {
            meeting_id,
            participants: vec![host.clone()],
            host,
            created_at,
        }
    }

    /// 参加者を追加する。既に居る場合は false
    pub fn add_participant(&mut self, username: &str) -> bool {
        if self.has_participant(username) {
            return false;
        }
        self.participants.push(username.to_string());
        true
    }

    /// 参加者を削除する。居なかった場合は false
    pub fn remove_participant(&mut self, username: &str) -> bool {
        let before = self.participants.len();
        self.participants.retain(|p| p != username);
        self.participants.len() != before
    }

    pub fn has_participant(&self, username: &str) -> bool {
        self.participants.iter().any(|p| p == username)
    }

    pub fn is_host(&self, username: &str) -> bool {
        self.host == username
    }
}
