use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use hitoe_body::body::{BodyAnimationData, JointFrame};
use hitoe_body::playback::{BodyPlayer, BodyPlayerDelegate, PlayStatus, RenderContext};

/// 配送された行を標準出力に書くデリゲート
struct PrintDelegate;

impl BodyPlayerDelegate for PrintDelegate {
    fn on_body_playback_starting(&self, anim: &BodyAnimationData) {
        println!(
            "playback starting: {} rows, {:.0}ms total (version {})",
            anim.rows.len(),
            anim.total_time_ms,
            anim.version
        );
    }

    fn on_body_joints_playback(&self, joints: &JointFrame, status: PlayStatus) {
        let mut line = String::new();
        for (joint, sample) in joints.iter() {
            line.push_str(&format!(
                " {}=({:.3},{:.3},{:.3})",
                joint.name(),
                sample.position[0],
                sample.position[1],
                sample.position[2]
            ));
        }
        println!("[{:?}]{}", status, line);
    }
}

fn main() -> Result<()> {
    println!("=== Playback Demo ({}) ===", env!("GIT_VERSION"));

    let path = std::env::args()
        .nth(1)
        .context("usage: playback_demo <animation.json> [--loop]")?;
    let looping = std::env::args().any(|a| a == "--loop");

    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path))?;

    let mut player = BodyPlayer::new();
    player.load_animation_json(&json)?;

    let delegate: Arc<dyn BodyPlayerDelegate> = Arc::new(PrintDelegate);
    player.set_delegate(&delegate);
    player.set_looping(looping);
    player.start();

    // 60fps相当のレンダリングtickをエミュレートする
    loop {
        player.on_frame_will_render(&RenderContext::now());
        if player.status() == PlayStatus::Finished {
            break;
        }
        std::thread::sleep(Duration::from_millis(16));
    }

    println!("playback finished");
    Ok(())
}
