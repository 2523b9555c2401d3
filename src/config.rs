use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub dampening: DampeningConfig,
    #[serde(default)]
    pub mesher: MesherConfig,
}

/// One Euro Filter のパラメータ
#[derive(Debug, Deserialize, Clone)]
pub struct FilterConfig {
    /// 最小カットオフ周波数 (Hz)
    #[serde(default = "default_min_cutoff")]
    pub min_cutoff: f32,
    /// 速度感応係数
    #[serde(default = "default_beta")]
    pub beta: f32,
    /// 微分信号のカットオフ周波数 (Hz)
    #[serde(default = "default_d_cutoff")]
    pub d_cutoff: f32,
    /// この信頼度未満のジョイントはフィルタに入れない
    #[serde(default = "default_filter_confidence")]
    pub confidence_threshold: f32,
}

/// ダンプニングサンプラーのパラメータ
#[derive(Debug, Deserialize, Clone)]
pub struct DampeningConfig {
    /// ウィンドウ長（ミリ秒）。0で無効
    #[serde(default = "default_dampening_period")]
    pub period_ms: f64,
}

/// メッシュ再構成エンジンのパラメータ
#[derive(Debug, Deserialize, Clone)]
pub struct MesherConfig {
    /// UVキャリブレーションテーブルのパス
    #[serde(default = "default_calibration_path")]
    pub calibration_path: String,
    /// テクセル採用の信頼度閾値
    #[serde(default = "default_mesher_confidence")]
    pub confidence_threshold: f32,
    /// サンプリングカーネルの最大探索距離（テクセル）
    #[serde(default = "default_max_sampling_distance")]
    pub max_sampling_distance: i32,
}

fn default_min_cutoff() -> f32 { 1.0 }
fn default_beta() -> f32 { 0.05 }
fn default_d_cutoff() -> f32 { 1.0 }
fn default_filter_confidence() -> f32 { 0.15 }
fn default_dampening_period() -> f64 { 0.0 }
fn default_calibration_path() -> String { "uv_calibration.json".to_string() }
fn default_mesher_confidence() -> f32 { 0.3 }
fn default_max_sampling_distance() -> i32 { 4 }

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_cutoff: default_min_cutoff(),
            beta: default_beta(),
            d_cutoff: default_d_cutoff(),
            confidence_threshold: default_filter_confidence(),
        }
    }
}

impl Default for DampeningConfig {
    fn default() -> Self {
        Self {
            period_ms: default_dampening_period(),
        }
    }
}

impl Default for MesherConfig {
    fn default() -> Self {
        Self {
            calibration_path: default_calibration_path(),
            confidence_threshold: default_mesher_confidence(),
            max_sampling_distance: default_max_sampling_distance(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// 設定ファイルが無ければデフォルト値で起動する
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::load(path).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.dampening.period_ms, 0.0);
        assert_eq!(config.mesher.max_sampling_distance, 4);
        assert!(config.filter.min_cutoff > 0.0);
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml_str = r#"
            [dampening]
            period_ms = 120.0

            [mesher]
            confidence_threshold = 0.5
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.dampening.period_ms, 120.0);
        assert_eq!(config.mesher.confidence_threshold, 0.5);
        // unspecified sections fall back to defaults
        assert_eq!(config.filter.d_cutoff, 1.0);
        assert_eq!(config.mesher.max_sampling_distance, 4);
    }
}
