use std::sync::OnceLock;
use std::time::Instant;

static PROCESS_START: OnceLock<Instant> = OnceLock::new();

/// プロセス起動からの経過ミリ秒（単調増加）
pub fn current_time_millis() -> f64 {
    let start = *PROCESS_START.get_or_init(Instant::now);
    start.elapsed().as_secs_f64() * 1000.0
}
