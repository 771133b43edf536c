use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// 参照動作の静止期間
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(300);

/// デバウンス状態。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    /// タイマー稼働中。`armed_at + quiet_period` で発火する。
    Pending { armed_at: Instant },
    /// 最後の入力で1回発火済み。次のキー入力までこのまま。
    Settled,
}

/// キー入力をまとめて1回の下流アクションにするタイマー状態。
///
/// 時刻は呼び出し側から渡すので、ランタイムなしでテストできる。
/// 同時に張られるタイマーは常に高々1つ。
#[derive(Debug, Clone)]
pub struct Debouncer {
    quiet_period: Duration,
    /// 0ならガードなし。それ以外は「trim後が空でなく、かつこの文字数以上」
    min_chars: usize,
    last_input: String,
    state: DebounceState,
}

impl Debouncer {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            min_chars: 0,
            last_input: String::new(),
            state: DebounceState::Idle,
        }
    }

    /// 短い入力ではタイマーを張らないようにする。
    pub fn with_min_chars(mut self, min_chars: usize) -> Self {
        self.min_chars = min_chars;
        self
    }

    pub fn state(&self) -> &DebounceState {
        &self.state
    }

    pub fn last_input(&self) -> &str {
        &self.last_input
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// 発火予定時刻。Pending以外はNone。
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            DebounceState::Pending { armed_at } => Some(armed_at + self.quiet_period),
            _ => None,
        }
    }

    /// キー入力1回分。タイマーを張り直したら新しい発火予定時刻を返す。
    ///
    /// ガードに通らない入力は予定済みタイマーごと破棄してIdleに戻す。
    pub fn keystroke(&mut self, input: &str, now: Instant) -> Option<Instant> {
        self.last_input = input.to_string();
        if !self.accepts(input) {
            self.state = DebounceState::Idle;
            return None;
        }
        self.state = DebounceState::Pending { armed_at: now };
        self.deadline()
    }

    /// 静止期間が過ぎていれば発火する入力を返し、Settledに遷移する。
    pub fn poll(&mut self, now: Instant) -> Option<String> {
        match self.deadline() {
            Some(deadline) if now >= deadline => {
                self.state = DebounceState::Settled;
                Some(self.last_input.clone())
            }
            _ => None,
        }
    }

    /// 「今すぐ検索」。タイマーを取り消し、現在の入力で即発火する。
    pub fn flush(&mut self) -> Option<String> {
        if !self.accepts(&self.last_input) {
            self.state = DebounceState::Idle;
            return None;
        }
        self.state = DebounceState::Settled;
        Some(self.last_input.clone())
    }

    pub fn cancel(&mut self) {
        self.state = DebounceState::Idle;
    }

    /// タイマーを張らずに現在の入力だけ差し替える。
    pub fn set_input(&mut self, input: &str) {
        self.last_input = input.to_string();
    }

    fn accepts(&self, input: &str) -> bool {
        if self.min_chars == 0 {
            return true;
        }
        !input.trim().is_empty() && input.chars().count() >= self.min_chars
    }
}

/// デバウンス後に実行される下流アクション。
#[async_trait]
pub trait SearchAction: Send + Sync + 'static {
    async fn fire(&self, query: String);
}

/// [`Debouncer`] をtokio上で駆動するコントローラ。
///
/// 発火したアクションは別タスクで走らせるので、後続のキー入力で
/// 進行中のリクエストが取り消されることはない。
pub struct DebouncedSearch<A: SearchAction> {
    debouncer: Arc<Mutex<Debouncer>>,
    action: Arc<A>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl<A: SearchAction> DebouncedSearch<A> {
    pub fn new(debouncer: Debouncer, action: Arc<A>) -> Self {
        Self {
            debouncer: Arc::new(Mutex::new(debouncer)),
            action,
            timer: Mutex::new(None),
        }
    }

    pub fn action(&self) -> &Arc<A> {
        &self.action
    }

    pub fn state(&self) -> DebounceState {
        lock(&self.debouncer).state().clone()
    }

    pub fn current_input(&self) -> String {
        lock(&self.debouncer).last_input().to_string()
    }

    /// キー入力。保留中のタイマーを取り消し、必要なら張り直す。
    pub fn keystroke(&self, input: &str) {
        let deadline = lock(&self.debouncer).keystroke(input, Instant::now());

        let mut timer = lock(&self.timer);
        if let Some(previous) = timer.take() {
            previous.abort();
        }
        let Some(deadline) = deadline else {
            tracing::trace!(input, "input below guard, nothing scheduled");
            return;
        };

        let debouncer = Arc::clone(&self.debouncer);
        let action = Arc::clone(&self.action);
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let fired = lock(&debouncer).poll(Instant::now());
            if let Some(query) = fired {
                tracing::debug!(query = %query, "quiet period elapsed, firing search");
                tokio::spawn(async move { action.fire(query).await });
            }
        }));
    }

    /// タイマーを待たずに現在の入力で発火する。ガードに通らなければNone。
    pub fn search_now(&self) -> Option<JoinHandle<()>> {
        if let Some(previous) = lock(&self.timer).take() {
            previous.abort();
        }
        let query = lock(&self.debouncer).flush()?;
        tracing::debug!(query = %query, "explicit search");
        let action = Arc::clone(&self.action);
        Some(tokio::spawn(async move { action.fire(query).await }))
    }

    /// 入力を差し替えてから [`DebouncedSearch::search_now`] する。
    pub fn search_now_with(&self, input: &str) -> Option<JoinHandle<()>> {
        lock(&self.debouncer).set_input(input);
        self.search_now()
    }

    pub fn cancel(&self) {
        if let Some(previous) = lock(&self.timer).take() {
            previous.abort();
        }
        lock(&self.debouncer).cancel();
    }
}

impl<A: SearchAction> Drop for DebouncedSearch<A> {
    fn drop(&mut self) {
        if let Some(timer) = lock(&self.timer).take() {
            timer.abort();
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
