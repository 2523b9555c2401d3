//! Wall-clock playback of recorded body animations.
//!
//! The player is a single-threaded state machine advanced only by the
//! renderer's frame tick. Every method is synchronous and non-blocking;
//! control calls before an animation is loaded are safe no-ops.
//!
//! State transitions:
//! `Stopped → Start → Playing ⇄ Paused`, and `Playing → Finished` once the
//! last row's timestamp is exceeded. With looping enabled the finish wraps
//! back to row 0 without the delegate ever observing `Finished`.

use anyhow::Result;
use std::sync::{Arc, Weak};

use crate::body::{BodyAnimationData, JointFrame};
use crate::time::current_time_millis;

/// 再生状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayStatus {
    Stopped,
    Start,
    Playing,
    Paused,
    Finished,
}

/// レンダリングtickのコンテキスト
#[derive(Debug, Clone, Copy)]
pub struct RenderContext {
    pub now_ms: f64,
}

impl RenderContext {
    /// 実時間のコンテキスト
    pub fn now() -> Self {
        Self {
            now_ms: current_time_millis(),
        }
    }

    /// 明示した時刻のコンテキスト（決定的な再生・テスト用）
    pub fn at(now_ms: f64) -> Self {
        Self { now_ms }
    }
}

/// 再生イベントの受け手
///
/// プレイヤーは `Weak` 参照しか持たない。受け手が破棄されていれば
/// 配送はスキップされる（エラーではない）。
pub trait BodyPlayerDelegate: Send + Sync {
    /// `start()` 後の最初のtickで、非再生状態からの遷移ごとに一度だけ呼ばれる
    fn on_body_playback_starting(&self, anim: &BodyAnimationData);
    /// 行を跨ぐたびに行順で一度ずつ呼ばれる（スキップ・並べ替えなし）
    fn on_body_joints_playback(&self, joints: &JointFrame, status: PlayStatus);
}

/// ロード済みアニメーションに束縛された再生状態。
/// プレイヤー自身の遷移メソッド以外からは変更されない。
struct PlaybackInfo {
    anim: Arc<BodyAnimationData>,
    status: PlayStatus,
    current_row: usize,
    looping: bool,
    /// pause/seek時点で確定した経過時間
    elapsed_ms: f64,
    /// wall-clock原点。None なら次のtickで elapsed_ms から再設定
    start_wall_ms: Option<f64>,
    last_tick_ms: f64,
}

impl PlaybackInfo {
    fn new(anim: Arc<BodyAnimationData>) -> Self {
        Self {
            anim,
            status: PlayStatus::Stopped,
            current_row: 0,
            looping: false,
            elapsed_ms: 0.0,
            start_wall_ms: None,
            last_tick_ms: 0.0,
        }
    }

    /// 再生位置を t ミリ秒へシークする。
    /// 行は t を下から挟む行（timestamp <= t の最後の行）に合わせる。
    fn seek(&mut self, t_ms: f64) {
        let bound = self
            .anim
            .rows
            .partition_point(|row| row.timestamp_ms <= t_ms);
        self.current_row = bound.saturating_sub(1);
        self.elapsed_ms = t_ms;
        self.start_wall_ms = None;
        if self.status == PlayStatus::Finished {
            self.status = PlayStatus::Playing;
        }
    }

    fn finish_threshold(&self) -> f64 {
        self.anim.total_time_ms.max(self.anim.last_row_timestamp())
    }
}

/// 記録済みボディアニメーションのプレイヤー
pub struct BodyPlayer {
    info: Option<PlaybackInfo>,
    delegate: Option<Weak<dyn BodyPlayerDelegate>>,
}

impl BodyPlayer {
    pub fn new() -> Self {
        Self {
            info: None,
            delegate: None,
        }
    }

    pub fn set_delegate(&mut self, delegate: &Arc<dyn BodyPlayerDelegate>) {
        self.delegate = Some(Arc::downgrade(delegate));
    }

    /// JSONアニメーション記述をロードし、新しい再生状態を構築する。
    ///
    /// パース/検証に失敗した場合は既存の状態に一切触れない。成功時は
    /// 古い状態が丸ごと置き換わる（新旧が混ざった状態は観測されない）。
    pub fn load_animation_json(&mut self, json: &str) -> Result<()> {
        let data = BodyAnimationData::from_json(json)?;
        self.load_animation(data);
        Ok(())
    }

    pub fn load_animation(&mut self, data: BodyAnimationData) {
        self.info = Some(PlaybackInfo::new(Arc::new(data)));
    }

    pub fn animation(&self) -> Option<&Arc<BodyAnimationData>> {
        self.info.as_ref().map(|i| &i.anim)
    }

    /// 現在の状態。未ロードなら Stopped。
    pub fn status(&self) -> PlayStatus {
        self.info
            .as_ref()
            .map(|i| i.status)
            .unwrap_or(PlayStatus::Stopped)
    }

    pub fn current_row_index(&self) -> Option<usize> {
        self.info.as_ref().map(|i| i.current_row)
    }

    pub fn is_looping(&self) -> bool {
        self.info.as_ref().map(|i| i.looping).unwrap_or(false)
    }

    /// 再生を開始する。Stopped/Finished からは先頭から、Paused からは
    /// 停止位置から再開する。未ロードなら何もしない。
    pub fn start(&mut self) {
        let info = match &mut self.info {
            Some(i) => i,
            None => return,
        };
        match info.status {
            PlayStatus::Stopped | PlayStatus::Finished => {
                info.current_row = 0;
                info.elapsed_ms = 0.0;
            }
            PlayStatus::Paused => {} // resume: keep row and elapsed
            PlayStatus::Start | PlayStatus::Playing => return,
        }
        info.status = PlayStatus::Start;
        info.start_wall_ms = None;
    }

    /// 一時停止。行位置と経過時間は保持され、`start()` で再開できる。
    pub fn pause(&mut self) {
        let info = match &mut self.info {
            Some(i) => i,
            None => return,
        };
        if !matches!(info.status, PlayStatus::Playing | PlayStatus::Start) {
            return;
        }
        if let Some(start_wall) = info.start_wall_ms {
            info.elapsed_ms = info.last_tick_ms - start_wall;
        }
        info.start_wall_ms = None;
        info.status = PlayStatus::Paused;
    }

    /// ループ再生フラグ。どの状態でも設定でき、次の終端で効く。
    pub fn set_looping(&mut self, looping: bool) {
        if let Some(info) = &mut self.info {
            info.looping = looping;
        }
    }

    /// 再生位置をミリ秒でシークする。どの状態でも合法。
    pub fn set_time(&mut self, t_ms: f64) {
        if let Some(info) = &mut self.info {
            info.seek(t_ms);
        }
    }

    /// レンダリングtick。状態に応じて 0 行以上をデリゲートへ配送する。
    ///
    /// レンダリングがアニメーションレートより遅い場合、1 tick で複数行を
    /// 跨ぐ（行ごとに1回のデリゲート呼び出し、tickごとではない）。
    pub fn on_frame_will_render(&mut self, context: &RenderContext) {
        let delegate = self.delegate.as_ref().and_then(|weak| weak.upgrade());
        let info = match &mut self.info {
            Some(i) => i,
            None => return,
        };
        info.last_tick_ms = context.now_ms;

        if info.status == PlayStatus::Finished {
            if info.looping {
                info.seek(0.0); // wraps to row 0, status back to Playing
            } else {
                return;
            }
        }
        if matches!(info.status, PlayStatus::Paused | PlayStatus::Stopped) {
            return;
        }

        if info.status == PlayStatus::Start {
            if let Some(delegate) = &delegate {
                delegate.on_body_playback_starting(&info.anim);
            }
            info.status = PlayStatus::Playing;
        }

        let start_wall = *info
            .start_wall_ms
            .get_or_insert(context.now_ms - info.elapsed_ms);
        let frame_time = context.now_ms - start_wall;

        while info.current_row < info.anim.rows.len()
            && frame_time >= info.anim.rows[info.current_row].timestamp_ms
        {
            if let Some(delegate) = &delegate {
                let joints = info.anim.rows[info.current_row].to_joint_frame();
                delegate.on_body_joints_playback(&joints, info.status);
            }
            info.current_row += 1;
        }

        if info.current_row >= info.anim.rows.len() && frame_time >= info.finish_threshold() {
            info.status = PlayStatus::Finished;
        }
    }

    /// 拡張点として予約。現状は何もしない。
    pub fn on_frame_did_render(&mut self, _context: &RenderContext) {}
}

impl Default for BodyPlayer {
    fn default() -> Self {
        Self::new()
    }
}
