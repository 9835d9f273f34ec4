//! 会議の作成・参加・退出と、受信フレームの解釈を行うコーディネーター
//!
//! 送信は [`SignalSender`] に委ね、失敗しても会議操作自体はローカルで成功させる
//! （オフラインでも会議を作成できる）。

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex},
    time::Duration,
};

use parley_shared::{
    protocol::{Frame, GLOBAL_ROOM, MessageType, UNKNOWN_SENDER},
    time::Clock,
};
use tokio_util::sync::CancellationToken;

use super::{
    ControlSignal, MediaControls, MeetingEvent, MeetingId, MeetingInfo, MeetingListener,
    MeetingStore,
};
use crate::{
    connection::SignalSender,
    error::{ClientError, MeetingError},
};

/// USER_LEFT のペイロード
const LEFT_PAYLOAD: &str = "left the meeting";
/// MEETING_ENDED のペイロード
const ENDED_PAYLOAD: &str = "Meeting ended by host";

fn created_payload(host: &str) -> String {
    format!("New meeting created by {}", host)
}

fn joined_payload(username: &str) -> String {
    format!("{} joined the meeting", username)
}

/// コーディネーターの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// 作成後に MEETING_CREATED を再送するまでの待ち時間（None で再送しない）
    pub confirm_delay: Option<Duration>,
    /// ID が既に使われていた場合の再生成回数
    pub collision_retries: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            confirm_delay: Some(Duration::from_secs(1)),
            collision_retries: 5,
        }
    }
}

/// 会議内での役割
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Participant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => f.write_str("host"),
            Self::Participant => f.write_str("participant"),
        }
    }
}

#[derive(Debug, Clone)]
struct ActiveMeeting {
    meeting_id: MeetingId,
    role: Role,
}

#[derive(Debug, Default)]
struct Session {
    /// 既知の会議（自分が作成・参加したもの、他者の MEETING_CREATED で知ったもの）
    meetings: HashMap<MeetingId, MeetingInfo>,
    active: Option<ActiveMeeting>,
    controls: MediaControls,
    /// 遅延確認送信のキャンセル用
    confirmation: Option<CancellationToken>,
}

impl Session {
    fn end_local(&mut self, meeting_id: &MeetingId) {
        self.meetings.remove(meeting_id);
        self.active = None;
        self.controls.reset();
        if let Some(token) = self.confirmation.take() {
            token.cancel();
        }
    }

    fn is_active(&self, room_id: &str) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| a.meeting_id.as_str() == room_id)
    }
}

/// 会議/セッションコーディネーター
pub struct MeetingCoordinator {
    username: String,
    signal: Arc<dyn SignalSender>,
    store: Arc<dyn MeetingStore>,
    clock: Arc<dyn Clock>,
    config: CoordinatorConfig,
    session: tokio::sync::Mutex<Session>,
    listeners: Mutex<Vec<Arc<dyn MeetingListener>>>,
}

impl MeetingCoordinator {
    pub fn new(
        username: impl Into<String>,
        signal: Arc<dyn SignalSender>,
        store: Arc<dyn MeetingStore>,
        clock: Arc<dyn Clock>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            username: username.into(),
            signal,
            store,
            clock,
            config,
            session: tokio::sync::Mutex::new(Session::default()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn add_listener(&self, listener: Arc<dyn MeetingListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(listener);
    }

    fn emit(&self, event: &MeetingEvent) {
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for listener in listeners {
            listener.on_meeting_event(event);
        }
    }

    /// 送信失敗はログのみ（会議操作は失敗させない）
    fn send(&self, kind: MessageType, room_id: &str, payload: &str) {
        if let Err(e) = self.signal.send(kind.clone(), room_id, &self.username, payload) {
            tracing::warn!("Could not send {} to room {}: {}", kind, room_id, e);
        }
    }

    fn send_control(&self, session: &Session, signal: &ControlSignal) {
        if let Some(active) = &session.active {
            self.send(signal.kind.clone(), active.meeting_id.as_str(), signal.payload);
        }
    }

    /// 現在の会議と役割
    pub async fn active_meeting(&self) -> Option<(MeetingInfo, Role)> {
        let session = self.session.lock().await;
        let active = session.active.as_ref()?;
        session
            .meetings
            .get(&active.meeting_id)
            .map(|info| (info.clone(), active.role))
    }

    pub async fn controls(&self) -> MediaControls {
        self.session.lock().await.controls
    }

    /// キャッシュ済みの会議情報
    pub async fn meeting(&self, meeting_id: &MeetingId) -> Option<MeetingInfo> {
        self.session.lock().await.meetings.get(meeting_id).cloned()
    }

    /// 新しい会議を作成してホストになる
    pub async fn create_meeting(&self) -> Result<MeetingInfo, MeetingError> {
        let mut session = self.session.lock().await;
        if let Some(active) = &session.active {
            return Err(MeetingError::AlreadyInMeeting(active.meeting_id.clone()));
        }
        let meeting_id = self.unused_meeting_id(&session).await?;
        Ok(self.host_meeting(&mut session, meeting_id).await)
    }

    /// 指定 ID で会議を作成する（存在しない会議への参加失敗からの回復用）
    pub async fn create_meeting_with_id(
        &self,
        meeting_id: MeetingId,
    ) -> Result<MeetingInfo, MeetingError> {
        let mut session = self.session.lock().await;
        if let Some(active) = &session.active {
            return Err(MeetingError::AlreadyInMeeting(active.meeting_id.clone()));
        }
        Ok(self.host_meeting(&mut session, meeting_id).await)
    }

    async fn unused_meeting_id(&self, session: &Session) -> Result<MeetingId, MeetingError> {
        let attempts = self.config.collision_retries.saturating_add(1);
        for _ in 0..attempts {
            let candidate = MeetingId::generate();
            if session.meetings.contains_key(&candidate) {
                continue;
            }
            if !self.store.exists(&candidate).await? {
                return Ok(candidate);
            }
            tracing::debug!("Meeting ID {} already in use, generating another", candidate);
        }
        Err(MeetingError::MeetingIdUnavailable(attempts))
    }

    async fn host_meeting(&self, session: &mut Session, meeting_id: MeetingId) -> MeetingInfo {
        let info = MeetingInfo::new(meeting_id.clone(), &self.username, self.clock.now_millis());

        let title = format!("Meeting {}", meeting_id);
        if let Err(e) = self
            .store
            .save(&meeting_id, &self.username, &title, "Auto-generated meeting")
            .await
        {
            tracing::warn!("Could not save meeting {}: {}", meeting_id, e);
        }
        if let Err(e) = self.store.add_participant(&meeting_id, &self.username).await {
            tracing::warn!("Could not record host of meeting {}: {}", meeting_id, e);
        }

        session.meetings.insert(meeting_id.clone(), info.clone());
        session.active = Some(ActiveMeeting {
            meeting_id: meeting_id.clone(),
            role: Role::Host,
        });

        let payload = created_payload(&self.username);
        self.send(MessageType::MeetingCreated, meeting_id.as_str(), &payload);
        session.confirmation = self.schedule_confirmation(&meeting_id);

        tracing::info!("Created meeting {} as host", meeting_id);
        self.emit(&MeetingEvent::Created(info.clone()));
        info
    }

    /// 遅れて購読した参加者向けに MEETING_CREATED を再送する
    fn schedule_confirmation(&self, meeting_id: &MeetingId) -> Option<CancellationToken> {
        let delay = self.config.confirm_delay?;
        let token = CancellationToken::new();
        let cancel = token.clone();
        let signal = self.signal.clone();
        let username = self.username.clone();
        let meeting_id = meeting_id.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if !signal.is_connected() {
                        return;
                    }
                    let payload = created_payload(&username);
                    if let Err(e) = signal.send(
                        MessageType::MeetingCreated,
                        meeting_id.as_str(),
                        &username,
                        &payload,
                    ) {
                        tracing::warn!("Could not confirm meeting {}: {}", meeting_id, e);
                    }
                }
            }
        });

        Some(token)
    }

    /// ストアから会議情報を再構築する
    async fn load_from_store(
        &self,
        meeting_id: &MeetingId,
    ) -> Result<Option<MeetingInfo>, MeetingError> {
        if !self.store.exists(meeting_id).await? {
            return Ok(None);
        }
        let host = self
            .store
            .host(meeting_id)
            .await?
            .unwrap_or_else(|| UNKNOWN_SENDER.to_string());
        let mut info = MeetingInfo::new(meeting_id.clone(), host, self.clock.now_millis());
        for participant in self.store.participants(meeting_id).await? {
            info.add_participant(&participant);
        }
        Ok(Some(info))
    }

    /// 会議に参加者として参加する
    ///
    /// 確認順: 書式 → ローカルキャッシュ → ストア。見つからない場合のエラーは
    /// 同じ ID での作成を [`MeetingError::recovery`] で提案する。
    pub async fn join_meeting(&self, meeting_id: &str) -> Result<MeetingInfo, MeetingError> {
        let meeting_id = MeetingId::parse(meeting_id)?;

        let mut session = self.session.lock().await;
        if let Some(active) = &session.active {
            return Err(MeetingError::AlreadyInMeeting(active.meeting_id.clone()));
        }

        let mut info = match session.meetings.get(&meeting_id) {
            Some(info) => info.clone(),
            None => self
                .load_from_store(&meeting_id)
                .await?
                .ok_or_else(|| MeetingError::MeetingNotFound(meeting_id.clone()))?,
        };

        info.add_participant(&self.username);
        if let Err(e) = self.store.add_participant(&meeting_id, &self.username).await {
            tracing::warn!("Could not record participant in meeting {}: {}", meeting_id, e);
        }

        session.meetings.insert(meeting_id.clone(), info.clone());
        session.active = Some(ActiveMeeting {
            meeting_id: meeting_id.clone(),
            role: Role::Participant,
        });

        self.send(
            MessageType::UserJoined,
            meeting_id.as_str(),
            &joined_payload(&self.username),
        );

        tracing::info!("Joined meeting {} hosted by {}", meeting_id, info.host);
        self.emit(&MeetingEvent::Joined(info.clone()));
        Ok(info)
    }

    /// 会議が存在するか確認する（書式 → キャッシュ → ストア）
    pub async fn validate_meeting(&self, meeting_id: &str) -> Result<bool, MeetingError> {
        let Ok(meeting_id) = MeetingId::parse(meeting_id) else {
            return Ok(false);
        };

        let mut session = self.session.lock().await;
        if session.meetings.contains_key(&meeting_id) {
            return Ok(true);
        }

        match self.load_from_store(&meeting_id).await? {
            Some(info) => {
                session.meetings.insert(meeting_id, info);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// 会議から退出する。ホストの場合は会議を終了する
    pub async fn leave_meeting(&self) -> Result<MeetingId, MeetingError> {
        let mut session = self.session.lock().await;
        let active = session.active.clone().ok_or(MeetingError::NotInMeeting)?;

        match active.role {
            Role::Host => {
                self.end_as_host(&mut session, &active.meeting_id).await;
            }
            Role::Participant => {
                let meeting_id = &active.meeting_id;
                if let Err(e) = self
                    .store
                    .remove_participant(meeting_id, &self.username)
                    .await
                {
                    tracing::warn!("Could not remove participant from {}: {}", meeting_id, e);
                }
                if let Some(info) = session.meetings.get_mut(meeting_id) {
                    info.remove_participant(&self.username);
                }
                session.active = None;
                session.controls.reset();

                self.send(MessageType::UserLeft, meeting_id.as_str(), LEFT_PAYLOAD);
                tracing::info!("Left meeting {}", meeting_id);
                self.emit(&MeetingEvent::Left(meeting_id.clone()));
            }
        }

        Ok(active.meeting_id)
    }

    /// ホストとして会議を終了する
    pub async fn end_meeting(&self) -> Result<MeetingId, MeetingError> {
        let mut session = self.session.lock().await;
        let active = session.active.clone().ok_or(MeetingError::NotInMeeting)?;
        if active.role != Role::Host {
            return Err(MeetingError::NotHost);
        }
        self.end_as_host(&mut session, &active.meeting_id).await;
        Ok(active.meeting_id)
    }

    async fn end_as_host(&self, session: &mut Session, meeting_id: &MeetingId) {
        if let Err(e) = self.store.remove(meeting_id).await {
            tracing::warn!("Could not remove meeting {} from store: {}", meeting_id, e);
        }
        session.end_local(meeting_id);

        self.send(MessageType::MeetingEnded, meeting_id.as_str(), ENDED_PAYLOAD);
        tracing::info!("Ended meeting {}", meeting_id);
        self.emit(&MeetingEvent::Ended {
            meeting_id: meeting_id.clone(),
            by: self.username.clone(),
        });
    }

    /// 新しい接続の上で現在の会議に入り直す
    ///
    /// サーバーは新しい接続を global に置くため、会議中なら USER_JOINED を
    /// 送り直してルームに再登録する。会議外では何もしない。
    pub async fn resync(&self) -> Option<MeetingId> {
        let session = self.session.lock().await;
        self.rejoin(&session)
    }

    fn rejoin(&self, session: &Session) -> Option<MeetingId> {
        let active = session.active.as_ref()?;
        self.send(
            MessageType::UserJoined,
            active.meeting_id.as_str(),
            &joined_payload(&self.username),
        );
        tracing::info!("Rejoined meeting {} on the new connection", active.meeting_id);
        Some(active.meeting_id.clone())
    }

    /// チャット送信（会議中はその会議、それ以外はグローバル）
    pub async fn send_chat(&self, text: &str) -> Result<(), ClientError> {
        let room_id = {
            let session = self.session.lock().await;
            session
                .active
                .as_ref()
                .map(|a| a.meeting_id.to_string())
                .unwrap_or_else(|| GLOBAL_ROOM.to_string())
        };
        self.signal
            .send(MessageType::Chat, &room_id, &self.username, text)
    }

    async fn toggle(&self, apply: fn(&mut MediaControls) -> ControlSignal) -> MediaControls {
        let mut session = self.session.lock().await;
        let signal = apply(&mut session.controls);
        self.send_control(&session, &signal);
        let controls = session.controls;
        self.emit(&MeetingEvent::ControlsChanged(controls));
        controls
    }

    /// ミュート切替。戻り値はミュート中かどうか
    pub async fn toggle_audio(&self) -> bool {
        self.toggle(MediaControls::toggle_audio).await.audio_muted()
    }

    pub async fn toggle_video(&self) -> bool {
        self.toggle(MediaControls::toggle_video).await.video_on()
    }

    pub async fn toggle_recording(&self) -> bool {
        self.toggle(MediaControls::toggle_recording).await.recording()
    }

    pub async fn toggle_deafen(&self) -> bool {
        self.toggle(MediaControls::toggle_deafen).await.deafened()
    }

    /// 全員ミュート切替（ホストのみ）
    pub async fn toggle_mute_all(&self) -> Result<bool, MeetingError> {
        {
            let session = self.session.lock().await;
            let active = session.active.as_ref().ok_or(MeetingError::NotInMeeting)?;
            if active.role != Role::Host {
                return Err(MeetingError::NotHost);
            }
        }
        Ok(self.toggle(MediaControls::toggle_mute_all).await.all_muted())
    }

    /// 受信フレームを解釈してローカル状態とリスナーに反映する
    pub async fn handle_frame(&self, frame: Frame) {
        if frame.sender == self.username {
            return;
        }

        let mut guard = self.session.lock().await;
        let session = &mut *guard;

        if frame.kind == MessageType::MeetingCreated {
            if let Ok(meeting_id) = MeetingId::parse(&frame.room_id) {
                let now = self.clock.now_millis();
                session
                    .meetings
                    .entry(meeting_id.clone())
                    .or_insert_with(|| MeetingInfo::new(meeting_id.clone(), &frame.sender, now));
                self.emit(&MeetingEvent::Announced {
                    meeting_id,
                    host: frame.sender,
                });
            }
            return;
        }

        if !frame.is_global() && !session.is_active(&frame.room_id) {
            tracing::trace!("Ignoring {} for room {}", frame.kind, frame.room_id);
            return;
        }

        match frame.kind {
            MessageType::Chat => self.emit(&MeetingEvent::Chat {
                room_id: frame.room_id,
                sender: frame.sender,
                text: frame.payload,
            }),
            MessageType::UserJoined => {
                if let Some(info) = cached_meeting(session, &frame.room_id) {
                    info.add_participant(&frame.sender);
                }
                self.emit(&MeetingEvent::ParticipantJoined {
                    room_id: frame.room_id,
                    username: frame.sender,
                });
            }
            MessageType::UserLeft => {
                if let Some(info) = cached_meeting(session, &frame.room_id) {
                    info.remove_participant(&frame.sender);
                }
                self.emit(&MeetingEvent::ParticipantLeft {
                    room_id: frame.room_id,
                    username: frame.sender,
                });
            }
            MessageType::MeetingEnded => {
                let Some(active) = session.active.clone() else {
                    return;
                };
                if active.meeting_id.as_str() != frame.room_id {
                    return;
                }
                session.end_local(&active.meeting_id);
                tracing::info!("Meeting {} ended by {}", active.meeting_id, frame.sender);
                self.emit(&MeetingEvent::Ended {
                    meeting_id: active.meeting_id,
                    by: frame.sender,
                });
            }
            MessageType::VideoStatus | MessageType::AudioStatus => {
                self.emit(&MeetingEvent::MediaStatus {
                    sender: frame.sender,
                    kind: frame.kind,
                    status: frame.payload,
                })
            }
            MessageType::AudioControl => self.apply_remote_mute(session, frame),
            MessageType::Welcome => {
                // WELCOME は接続ごとに一度だけ届く
                self.rejoin(session);
                self.emit(&MeetingEvent::System(frame.payload));
            }
            _ => self.emit(&MeetingEvent::Relay(frame)),
        }
    }

    /// ホストの MUTE_ALL/UNMUTE_ALL は状態が異なる場合のみトグルで適用する
    fn apply_remote_mute(&self, session: &mut Session, frame: Frame) {
        let requested = match frame.payload.as_str() {
            "MUTE_ALL" => true,
            "UNMUTE_ALL" => false,
            _ => {
                self.emit(&MeetingEvent::Relay(frame));
                return;
            }
        };

        let from_host = cached_meeting(session, &frame.room_id)
            .is_some_and(|info| info.is_host(&frame.sender));
        if !from_host {
            tracing::debug!("Ignoring {} from non-host {}", frame.payload, frame.sender);
            return;
        }
        if session.controls.audio_muted() == requested {
            return;
        }

        let signal = session.controls.toggle_audio();
        self.send_control(session, &signal);
        self.emit(&MeetingEvent::RemoteMute {
            muted: requested,
            by: frame.sender,
        });
        self.emit(&MeetingEvent::ControlsChanged(session.controls));
    }
}

fn cached_meeting<'a>(session: &'a mut Session, room_id: &str) -> Option<&'a mut MeetingInfo> {
    let meeting_id = MeetingId::parse(room_id).ok()?;
    session.meetings.get_mut(&meeting_id)
}

#[cfg(test)]
mod tests {
    use mockall::{Sequence, predicate::eq};
    use parley_shared::time::FixedClock;

    use super::*;
    use crate::{
        error::{Recovery, StoreError},
        meeting::{InMemoryMeetingStore, MockMeetingStore},
    };

    const NOW: i64 = 1_700_000_000_000;

    /// 送信したフレームを記録する SignalSender
    struct RecordingSignal {
        connected: bool,
        sent: Mutex<Vec<Frame>>,
    }

    impl RecordingSignal {
        fn connected() -> Arc<Self> {
            Arc::new(Self {
                connected: true,
                sent: Mutex::new(Vec::new()),
            })
        }

        fn offline() -> Arc<Self> {
            Arc::new(Self {
                connected: false,
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<Frame> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl SignalSender for RecordingSignal {
        fn send(
            &self,
            kind: MessageType,
            room_id: &str,
            sender: &str,
            payload: &str,
        ) -> Result<(), ClientError> {
            if !self.connected {
                return Err(ClientError::NotConnected);
            }
            self.sent
                .lock()
                .unwrap()
                .push(Frame::new(kind, room_id, sender, payload));
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected
        }
    }

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<MeetingEvent>>,
    }

    impl RecordingListener {
        fn events(&self) -> Vec<MeetingEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl MeetingListener for RecordingListener {
        fn on_meeting_event(&self, event: &MeetingEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn quiet_config() -> CoordinatorConfig {
        CoordinatorConfig {
            confirm_delay: None,
            collision_retries: 2,
        }
    }

    fn coordinator(
        username: &str,
        signal: Arc<RecordingSignal>,
        store: Arc<dyn MeetingStore>,
    ) -> MeetingCoordinator {
        MeetingCoordinator::new(
            username,
            signal,
            store,
            Arc::new(FixedClock::new(NOW)),
            quiet_config(),
        )
    }

    fn meeting_id() -> MeetingId {
        MeetingId::parse("482913").unwrap()
    }

    #[tokio::test]
    async fn test_create_meeting_persists_and_announces() {
        // テスト項目: 会議作成でホストになり、ストアに保存され、MEETING_CREATED が送信される
        // given (前提条件):
        let signal = RecordingSignal::connected();
        let store = Arc::new(InMemoryMeetingStore::new());
        let coordinator = coordinator("alice", signal.clone(), store.clone());

        // when (操作):
        let info = coordinator.create_meeting().await.unwrap();

        // then (期待する結果):
        let id = info.meeting_id.clone();
        assert_eq!(info.host, "alice");
        assert_eq!(info.participants, vec!["alice"]);
        assert_eq!(info.created_at, NOW);
        assert_eq!(
            store.details(&id).await,
            Some((format!("Meeting {}", id), "Auto-generated meeting".to_string()))
        );
        assert_eq!(store.participants(&id).await.unwrap(), vec!["alice"]);
        assert_eq!(
            signal.sent(),
            vec![Frame::new(
                MessageType::MeetingCreated,
                id.as_str(),
                "alice",
                "New meeting created by alice"
            )]
        );
        let (_, role) = coordinator.active_meeting().await.unwrap();
        assert_eq!(role, Role::Host);
    }

    #[tokio::test]
    async fn test_create_meeting_succeeds_offline() {
        // テスト項目: 未接続でも会議はローカルで作成される（送信失敗はログのみ）
        // given (前提条件):
        let signal = RecordingSignal::offline();
        let coordinator = coordinator(
            "alice",
            signal.clone(),
            Arc::new(InMemoryMeetingStore::new()),
        );

        // when (操作):
        let result = coordinator.create_meeting().await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert!(signal.sent().is_empty());
        assert!(coordinator.active_meeting().await.is_some());
    }

    #[tokio::test]
    async fn test_create_meeting_rerolls_taken_id() {
        // テスト項目: 生成した ID がストアに既にある場合は再生成する
        // given (前提条件):
        let mut store = MockMeetingStore::new();
        let mut seq = Sequence::new();
        store
            .expect_exists()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(true));
        store
            .expect_exists()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(false));
        store
            .expect_save()
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        store
            .expect_add_participant()
            .times(1)
            .returning(|_, _| Ok(()));
        let coordinator = coordinator("alice", RecordingSignal::connected(), Arc::new(store));

        // when (操作):
        let result = coordinator.create_meeting().await;

        // then (期待する結果):
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_create_meeting_gives_up_after_retries() {
        // テスト項目: 再生成の上限を超えると MeetingIdUnavailable になる
        // given (前提条件):
        let mut store = MockMeetingStore::new();
        store.expect_exists().times(3).returning(|_| Ok(true));
        let coordinator = coordinator("alice", RecordingSignal::connected(), Arc::new(store));

        // when (操作):
        let result = coordinator.create_meeting().await;

        // then (期待する結果):
        assert_eq!(result, Err(MeetingError::MeetingIdUnavailable(3)));
        assert!(coordinator.active_meeting().await.is_none());
    }

    #[tokio::test]
    async fn test_join_rejects_bad_format_before_lookup() {
        // テスト項目: 書式が不正な ID はストアを参照せずに拒否される
        // given (前提条件):
        let store = MockMeetingStore::new();
        let coordinator = coordinator("bob", RecordingSignal::connected(), Arc::new(store));

        // when (操作):
        let result = coordinator.join_meeting("48291").await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(MeetingError::InvalidMeetingId("48291".to_string()))
        );
    }

    #[tokio::test]
    async fn test_join_unknown_meeting_offers_create() {
        // テスト項目: 存在しない会議への参加は失敗し、同じ ID での作成が提案される
        // given (前提条件):
        let mut store = MockMeetingStore::new();
        store
            .expect_exists()
            .with(eq(meeting_id()))
            .times(1)
            .returning(|_| Ok(false));
        let signal = RecordingSignal::connected();
        let coordinator = coordinator("bob", signal.clone(), Arc::new(store));

        // when (操作):
        let error = coordinator.join_meeting("482913").await.unwrap_err();

        // then (期待する結果):
        assert_eq!(error, MeetingError::MeetingNotFound(meeting_id()));
        assert_eq!(
            error.recovery(),
            Some(Recovery::CreateMeeting(meeting_id()))
        );
        assert!(signal.sent().is_empty());
    }

    #[tokio::test]
    async fn test_join_reconstructs_meeting_from_store() {
        // テスト項目: キャッシュにない会議はストアからホスト付きで再構築して参加する
        // given (前提条件):
        let mut store = MockMeetingStore::new();
        store.expect_exists().returning(|_| Ok(true));
        store
            .expect_host()
            .returning(|_| Ok(Some("alice".to_string())));
        store
            .expect_participants()
            .returning(|_| Ok(vec!["alice".to_string()]));
        store
            .expect_add_participant()
            .with(eq(meeting_id()), eq("bob"))
            .times(1)
            .returning(|_, _| Ok(()));
        let signal = RecordingSignal::connected();
        let coordinator = coordinator("bob", signal.clone(), Arc::new(store));

        // when (操作):
        let info = coordinator.join_meeting("482913").await.unwrap();

        // then (期待する結果):
        assert_eq!(info.host, "alice");
        assert_eq!(info.participants, vec!["alice", "bob"]);
        assert_eq!(
            signal.sent(),
            vec![Frame::new(
                MessageType::UserJoined,
                "482913",
                "bob",
                "bob joined the meeting"
            )]
        );
        let (_, role) = coordinator.active_meeting().await.unwrap();
        assert_eq!(role, Role::Participant);
    }

    #[tokio::test]
    async fn test_join_surfaces_store_failure() {
        // テスト項目: ストアが利用できない場合は参加がエラーになる
        // given (前提条件):
        let mut store = MockMeetingStore::new();
        store
            .expect_exists()
            .returning(|_| Err(StoreError::Unavailable("timeout".to_string())));
        let coordinator = coordinator("bob", RecordingSignal::connected(), Arc::new(store));

        // when (操作):
        let result = coordinator.join_meeting("482913").await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(MeetingError::Store(StoreError::Unavailable(
                "timeout".to_string()
            )))
        );
    }

    #[tokio::test]
    async fn test_join_while_in_meeting_is_rejected() {
        // テスト項目: 会議中に別の会議へ参加しようとするとエラーになる
        // given (前提条件):
        let coordinator = coordinator(
            "alice",
            RecordingSignal::connected(),
            Arc::new(InMemoryMeetingStore::new()),
        );
        let info = coordinator.create_meeting().await.unwrap();

        // when (操作):
        let result = coordinator.join_meeting("482913").await;

        // then (期待する結果):
        assert_eq!(result, Err(MeetingError::AlreadyInMeeting(info.meeting_id)));
    }

    #[tokio::test]
    async fn test_validate_meeting() {
        // テスト項目: 書式不正・未登録は false、ストアにある会議は true になりキャッシュされる
        // given (前提条件):
        let store = Arc::new(InMemoryMeetingStore::new());
        store
            .save(&meeting_id(), "alice", "Meeting 482913", "")
            .await
            .unwrap();
        let coordinator = coordinator("bob", RecordingSignal::connected(), store);

        // when (操作):
        let bad_format = coordinator.validate_meeting("abc").await.unwrap();
        let unknown = coordinator.validate_meeting("111111").await.unwrap();
        let known = coordinator.validate_meeting("482913").await.unwrap();

        // then (期待する結果):
        assert!(!bad_format);
        assert!(!unknown);
        assert!(known);
        let cached = coordinator.meeting(&meeting_id()).await.unwrap();
        assert_eq!(cached.host, "alice");
    }

    #[tokio::test]
    async fn test_host_leaving_ends_meeting() {
        // テスト項目: ホストの退出は会議終了となり、ストアから削除され、状態がリセットされる
        // given (前提条件):
        let signal = RecordingSignal::connected();
        let store = Arc::new(InMemoryMeetingStore::new());
        let coordinator = coordinator("alice", signal.clone(), store.clone());
        let info = coordinator.create_meeting().await.unwrap();
        coordinator.toggle_audio().await;
        coordinator.toggle_recording().await;

        // when (操作):
        let ended = coordinator.leave_meeting().await.unwrap();

        // then (期待する結果):
        assert_eq!(ended, info.meeting_id);
        assert!(!store.exists(&ended).await.unwrap());
        assert!(coordinator.active_meeting().await.is_none());
        assert!(coordinator.meeting(&ended).await.is_none());
        assert_eq!(coordinator.controls().await, MediaControls::default());
        let last = signal.sent().pop().unwrap();
        assert_eq!(
            last,
            Frame::new(
                MessageType::MeetingEnded,
                ended.as_str(),
                "alice",
                "Meeting ended by host"
            )
        );
    }

    #[tokio::test]
    async fn test_participant_leaving_removes_only_self() {
        // テスト項目: 参加者の退出は自分だけを削除し、USER_LEFT を送信する
        // given (前提条件):
        let signal = RecordingSignal::connected();
        let store = Arc::new(InMemoryMeetingStore::new());
        store.save(&meeting_id(), "alice", "t", "n").await.unwrap();
        store.add_participant(&meeting_id(), "alice").await.unwrap();
        let coordinator = coordinator("bob", signal.clone(), store.clone());
        coordinator.join_meeting("482913").await.unwrap();
        coordinator.toggle_video().await;

        // when (操作):
        coordinator.leave_meeting().await.unwrap();

        // then (期待する結果):
        assert!(store.exists(&meeting_id()).await.unwrap());
        assert_eq!(store.participants(&meeting_id()).await.unwrap(), vec!["alice"]);
        assert!(!coordinator.controls().await.video_on());
        let last = signal.sent().pop().unwrap();
        assert_eq!(
            last,
            Frame::new(MessageType::UserLeft, "482913", "bob", "left the meeting")
        );
    }

    #[tokio::test]
    async fn test_leave_without_meeting() {
        // テスト項目: 会議外での退出・終了はエラーになる
        // given (前提条件):
        let coordinator = coordinator(
            "alice",
            RecordingSignal::connected(),
            Arc::new(InMemoryMeetingStore::new()),
        );

        // when (操作):
        let leave = coordinator.leave_meeting().await;
        let end = coordinator.end_meeting().await;

        // then (期待する結果):
        assert_eq!(leave, Err(MeetingError::NotInMeeting));
        assert_eq!(end, Err(MeetingError::NotInMeeting));
    }

    #[tokio::test]
    async fn test_toggles_send_only_inside_meeting() {
        // テスト項目: 会議外のトグルは状態だけ変わり、送信はされない
        // given (前提条件):
        let signal = RecordingSignal::connected();
        let coordinator = coordinator(
            "alice",
            signal.clone(),
            Arc::new(InMemoryMeetingStore::new()),
        );

        // when (操作):
        let muted = coordinator.toggle_audio().await;

        // then (期待する結果):
        assert!(muted);
        assert!(signal.sent().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_twice_sends_both_states() {
        // テスト項目: 会議中のトグル 2 回で muted → unmuted が送信され、元の状態に戻る
        // given (前提条件):
        let signal = RecordingSignal::connected();
        let coordinator = coordinator(
            "alice",
            signal.clone(),
            Arc::new(InMemoryMeetingStore::new()),
        );
        let info = coordinator.create_meeting().await.unwrap();

        // when (操作):
        let first = coordinator.toggle_audio().await;
        let second = coordinator.toggle_audio().await;

        // then (期待する結果):
        assert!(first);
        assert!(!second);
        let payloads: Vec<String> = signal
            .sent()
            .into_iter()
            .filter(|f| f.kind == MessageType::AudioStatus)
            .map(|f| {
                assert_eq!(f.room_id, info.meeting_id.as_str());
                f.payload
            })
            .collect();
        assert_eq!(payloads, vec!["muted", "unmuted"]);
    }

    #[tokio::test]
    async fn test_mute_all_is_host_only() {
        // テスト項目: 全員ミュートはホストのみ実行できる
        // given (前提条件):
        let store = Arc::new(InMemoryMeetingStore::new());
        store.save(&meeting_id(), "alice", "t", "n").await.unwrap();
        let participant = coordinator("bob", RecordingSignal::connected(), store.clone());
        participant.join_meeting("482913").await.unwrap();
        let host = coordinator("carol", RecordingSignal::connected(), store);
        host.create_meeting().await.unwrap();

        // when (操作):
        let denied = participant.toggle_mute_all().await;
        let allowed = host.toggle_mute_all().await;

        // then (期待する結果):
        assert_eq!(denied, Err(MeetingError::NotHost));
        assert_eq!(allowed, Ok(true));
    }

    #[tokio::test]
    async fn test_remote_mute_all_applies_once() {
        // テスト項目: ホストからの MUTE_ALL は一度だけ適用され、重複通知では変化しない
        // given (前提条件):
        let signal = RecordingSignal::connected();
        let store = Arc::new(InMemoryMeetingStore::new());
        store.save(&meeting_id(), "alice", "t", "n").await.unwrap();
        let coordinator = coordinator("bob", signal.clone(), store);
        coordinator.join_meeting("482913").await.unwrap();
        let listener = Arc::new(RecordingListener::default());
        coordinator.add_listener(listener.clone());
        let mute_all = Frame::new(MessageType::AudioControl, "482913", "alice", "MUTE_ALL");

        // when (操作):
        coordinator.handle_frame(mute_all.clone()).await;
        coordinator.handle_frame(mute_all).await;

        // then (期待する結果):
        assert!(coordinator.controls().await.audio_muted());
        let remote_mutes = listener
            .events()
            .into_iter()
            .filter(|e| matches!(e, MeetingEvent::RemoteMute { .. }))
            .count();
        assert_eq!(remote_mutes, 1);
        let statuses = signal
            .sent()
            .into_iter()
            .filter(|f| f.kind == MessageType::AudioStatus)
            .count();
        assert_eq!(statuses, 1);
    }

    #[tokio::test]
    async fn test_remote_mute_from_non_host_is_ignored() {
        // テスト項目: ホスト以外からの MUTE_ALL は無視される
        // given (前提条件):
        let store = Arc::new(InMemoryMeetingStore::new());
        store.save(&meeting_id(), "alice", "t", "n").await.unwrap();
        let coordinator = coordinator("bob", RecordingSignal::connected(), store);
        coordinator.join_meeting("482913").await.unwrap();

        // when (操作):
        coordinator
            .handle_frame(Frame::new(
                MessageType::AudioControl,
                "482913",
                "mallory",
                "MUTE_ALL",
            ))
            .await;

        // then (期待する結果):
        assert!(!coordinator.controls().await.audio_muted());
    }

    #[tokio::test]
    async fn test_meeting_created_populates_cache() {
        // テスト項目: 他者の MEETING_CREATED でキャッシュされた会議にはストアなしで参加できる
        // given (前提条件):
        let mut store = MockMeetingStore::new();
        store.expect_add_participant().returning(|_, _| Ok(()));
        let coordinator = coordinator("bob", RecordingSignal::connected(), Arc::new(store));
        let listener = Arc::new(RecordingListener::default());
        coordinator.add_listener(listener.clone());

        // when (操作):
        coordinator
            .handle_frame(Frame::new(
                MessageType::MeetingCreated,
                "482913",
                "alice",
                "New meeting created by alice",
            ))
            .await;
        let info = coordinator.join_meeting("482913").await.unwrap();

        // then (期待する結果):
        assert_eq!(info.host, "alice");
        assert_eq!(
            listener.events()[0],
            MeetingEvent::Announced {
                meeting_id: meeting_id(),
                host: "alice".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_meeting_ended_by_host_clears_state() {
        // テスト項目: 参加中の会議の MEETING_ENDED を受信するとローカルで終了する
        // given (前提条件):
        let store = Arc::new(InMemoryMeetingStore::new());
        store.save(&meeting_id(), "alice", "t", "n").await.unwrap();
        let coordinator = coordinator("bob", RecordingSignal::connected(), store);
        coordinator.join_meeting("482913").await.unwrap();
        coordinator.toggle_deafen().await;

        // when (操作):
        coordinator
            .handle_frame(Frame::new(
                MessageType::MeetingEnded,
                "482913",
                "alice",
                "Meeting ended by host",
            ))
            .await;

        // then (期待する結果):
        assert!(coordinator.active_meeting().await.is_none());
        assert_eq!(coordinator.controls().await, MediaControls::default());
    }

    #[tokio::test]
    async fn test_handle_frame_filters_echo_and_foreign_rooms() {
        // テスト項目: 自分のエコーと他の会議宛てのフレームは無視される
        // given (前提条件):
        let coordinator = coordinator(
            "bob",
            RecordingSignal::connected(),
            Arc::new(InMemoryMeetingStore::new()),
        );
        let listener = Arc::new(RecordingListener::default());
        coordinator.add_listener(listener.clone());

        // when (操作):
        coordinator
            .handle_frame(Frame::new(MessageType::Chat, "global", "bob", "echo"))
            .await;
        coordinator
            .handle_frame(Frame::new(MessageType::Chat, "555555", "carol", "elsewhere"))
            .await;
        coordinator
            .handle_frame(Frame::new(MessageType::Chat, "global", "carol", "hi all"))
            .await;

        // then (期待する結果):
        assert_eq!(
            listener.events(),
            vec![MeetingEvent::Chat {
                room_id: "global".to_string(),
                sender: "carol".to_string(),
                text: "hi all".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_welcome_rejoins_active_meeting() {
        // テスト項目: 会議中に新しい接続の WELCOME を受信すると USER_JOINED を送り直す
        // given (前提条件):
        let signal = RecordingSignal::connected();
        let store = Arc::new(InMemoryMeetingStore::new());
        store.save(&meeting_id(), "alice", "t", "n").await.unwrap();
        let coordinator = coordinator("bob", signal.clone(), store);
        coordinator.join_meeting("482913").await.unwrap();

        // when (操作):
        coordinator.handle_frame(Frame::welcome()).await;

        // then (期待する結果):
        let joined = Frame::new(
            MessageType::UserJoined,
            "482913",
            "bob",
            "bob joined the meeting",
        );
        assert_eq!(signal.sent(), vec![joined.clone(), joined]);
        assert!(coordinator.active_meeting().await.is_some());
    }

    #[tokio::test]
    async fn test_resync_outside_meeting_sends_nothing() {
        // テスト項目: 会議外での再同期や WELCOME は何も送信しない
        // given (前提条件):
        let signal = RecordingSignal::connected();
        let coordinator = coordinator(
            "bob",
            signal.clone(),
            Arc::new(InMemoryMeetingStore::new()),
        );
        let listener = Arc::new(RecordingListener::default());
        coordinator.add_listener(listener.clone());

        // when (操作):
        let rejoined = coordinator.resync().await;
        coordinator.handle_frame(Frame::welcome()).await;

        // then (期待する結果):
        assert_eq!(rejoined, None);
        assert!(signal.sent().is_empty());
        assert_eq!(
            listener.events(),
            vec![MeetingEvent::System(
                "Connected to signaling server".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_resync_as_host_returns_meeting() {
        // テスト項目: ホストも再同期で自分の会議に USER_JOINED を送る
        // given (前提条件):
        let signal = RecordingSignal::connected();
        let coordinator = coordinator(
            "alice",
            signal.clone(),
            Arc::new(InMemoryMeetingStore::new()),
        );
        let info = coordinator.create_meeting().await.unwrap();

        // when (操作):
        let rejoined = coordinator.resync().await;

        // then (期待する結果):
        assert_eq!(rejoined, Some(info.meeting_id.clone()));
        assert_eq!(
            signal.sent().last().unwrap(),
            &Frame::new(
                MessageType::UserJoined,
                info.meeting_id.as_str(),
                "alice",
                "alice joined the meeting"
            )
        );
    }

    #[tokio::test]
    async fn test_unknown_frames_are_relayed() {
        // テスト項目: 解釈しないタイプはフレームのまま通知される
        // given (前提条件):
        let coordinator = coordinator(
            "bob",
            RecordingSignal::connected(),
            Arc::new(InMemoryMeetingStore::new()),
        );
        let listener = Arc::new(RecordingListener::default());
        coordinator.add_listener(listener.clone());
        let frame = Frame::new(
            MessageType::Unknown("PING".to_string()),
            "global",
            "carol",
            "1",
        );

        // when (操作):
        coordinator.handle_frame(frame.clone()).await;

        // then (期待する結果):
        assert_eq!(listener.events(), vec![MeetingEvent::Relay(frame)]);
    }

    #[tokio::test]
    async fn test_send_chat_targets_active_room() {
        // テスト項目: チャットは会議中なら会議、それ以外はグローバルに送信される
        // given (前提条件):
        let signal = RecordingSignal::connected();
        let coordinator = coordinator(
            "alice",
            signal.clone(),
            Arc::new(InMemoryMeetingStore::new()),
        );

        // when (操作):
        coordinator.send_chat("before").await.unwrap();
        let info = coordinator.create_meeting().await.unwrap();
        coordinator.send_chat("during").await.unwrap();

        // then (期待する結果):
        let chats: Vec<(String, String)> = signal
            .sent()
            .into_iter()
            .filter(|f| f.kind == MessageType::Chat)
            .map(|f| (f.room_id, f.payload))
            .collect();
        assert_eq!(
            chats,
            vec![
                ("global".to_string(), "before".to_string()),
                (info.meeting_id.to_string(), "during".to_string()),
            ]
        );
    }
}
