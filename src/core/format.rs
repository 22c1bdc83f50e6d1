use super::error::{PlayerError, Result};
use super::types::FrameRate;
use serde::{Deserialize, Serialize};

const NTSC_CADENCE: &[u32] = &[1602, 1601, 1602, 1601, 1602];
const NTSC_HFR_CADENCE: &[u32] = &[801, 800, 801, 801, 801];

type Preset = (&'static str, u32, u32, FieldMode, u32, u32, Option<&'static [u32]>);

/// 预设格式：名称、宽高、场模式、帧率分子分母、音频节奏（None 为按 48k 推导）
const PRESETS: &[Preset] = &[
    ("PAL", 720, 576, FieldMode::Upper, 25, 1, None),
    ("NTSC", 720, 486, FieldMode::Lower, 30000, 1001, Some(NTSC_CADENCE)),
    ("720p5000", 1280, 720, FieldMode::Progressive, 50, 1, None),
    ("720p5994", 1280, 720, FieldMode::Progressive, 60000, 1001, Some(NTSC_HFR_CADENCE)),
    ("720p6000", 1280, 720, FieldMode::Progressive, 60, 1, None),
    ("1080i5000", 1920, 1080, FieldMode::Upper, 25, 1, None),
    ("1080i5994", 1920, 1080, FieldMode::Upper, 30000, 1001, Some(NTSC_CADENCE)),
    ("1080p2398", 1920, 1080, FieldMode::Progressive, 24000, 1001, None),
    ("1080p2400", 1920, 1080, FieldMode::Progressive, 24, 1, None),
    ("1080p2500", 1920, 1080, FieldMode::Progressive, 25, 1, None),
    ("1080p2997", 1920, 1080, FieldMode::Progressive, 30000, 1001, Some(NTSC_CADENCE)),
    ("1080p3000", 1920, 1080, FieldMode::Progressive, 30, 1, None),
    ("1080p5000", 1920, 1080, FieldMode::Progressive, 50, 1, None),
    ("1080p5994", 1920, 1080, FieldMode::Progressive, 60000, 1001, Some(NTSC_HFR_CADENCE)),
    ("1080p6000", 1920, 1080, FieldMode::Progressive, 60, 1, None),
];

/// 场模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldMode {
    Progressive,
    /// 隔行，上场优先
    Upper,
    /// 隔行，下场优先
    Lower,
}

impl FieldMode {
    pub fn is_interlaced(&self) -> bool {
        !matches!(self, FieldMode::Progressive)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldMode::Progressive => "progressive",
            FieldMode::Upper => "upper",
            FieldMode::Lower => "lower",
        }
    }
}

/// 输出格式（OutputFormat）
///
/// 通道启动后不可变；所有生产者都必须对齐到这个时间域。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputFormat {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub field_mode: FieldMode,
    /// 帧率（隔行格式下为帧率而非场率，例如 1080i50 为 25）
    pub frame_rate: FrameRate,
    pub audio_sample_rate: u32,
    /// 每帧音频采样数的循环序列
    pub audio_cadence: Vec<u32>,
}

impl OutputFormat {
    /// 自定义格式，音频节奏按 48k 自动推导
    pub fn new(
        name: &str,
        width: u32,
        height: u32,
        field_mode: FieldMode,
        frame_rate: FrameRate,
    ) -> Self {
        let audio_sample_rate = 48000;
        Self {
            name: name.to_string(),
            width,
            height,
            field_mode,
            frame_rate,
            audio_sample_rate,
            audio_cadence: derive_cadence(audio_sample_rate, frame_rate),
        }
    }

    pub fn fps(&self) -> f64 {
        self.frame_rate.as_f64()
    }

    /// 替换音频节奏（预设格式使用广播行业的标准序列）
    pub fn with_cadence(mut self, cadence: &[u32]) -> Self {
        self.audio_cadence = cadence.to_vec();
        self
    }

    /// 按名称查找预设格式（大小写不敏感）
    pub fn by_name(name: &str) -> Result<Self> {
        let (name, width, height, field_mode, num, den, cadence) = PRESETS
            .iter()
            .find(|preset| preset.0.eq_ignore_ascii_case(name))
            .copied()
            .ok_or_else(|| PlayerError::ConfigurationError(format!("未知的视频格式: {}", name)))?;

        let format = Self::new(name, width, height, field_mode, FrameRate::new(num, den));
        Ok(match cadence {
            Some(cadence) => format.with_cadence(cadence),
            None => format,
        })
    }

    /// 一个节奏周期内的总采样数
    pub fn cadence_sum(&self) -> u64 {
        self.audio_cadence.iter().map(|&n| n as u64).sum()
    }
}

/// 根据采样率与帧率推导每帧采样数的循环序列
///
/// 采用累加取整：第 i 帧分到 floor((i+1)*r) - floor(i*r) 个采样，
/// 周期长度为使 r*n 为整数的最小 n。
pub fn derive_cadence(sample_rate: u32, frame_rate: FrameRate) -> Vec<u32> {
    if frame_rate.num == 0 {
        return vec![0];
    }
    let numerator = sample_rate as u64 * frame_rate.den as u64;
    let denominator = frame_rate.num as u64;
    let period = denominator / gcd(numerator, denominator);

    let mut cadence = Vec::with_capacity(period as usize);
    for i in 0..period {
        let start = i * numerator / denominator;
        let end = (i + 1) * numerator / denominator;
        cadence.push((end - start) as u32);
    }
    cadence
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_cadences() {
        let format = OutputFormat::by_name("1080i5000").unwrap();
        assert_eq!(format.audio_cadence, vec![1920]);
        assert!(format.field_mode.is_interlaced());

        let p50 = OutputFormat::by_name("720P5000").unwrap();
        assert_eq!(p50.audio_cadence, vec![960]);
        assert_eq!(p50.field_mode, FieldMode::Progressive);

        let p2398 = OutputFormat::by_name("1080p2398").unwrap();
        assert_eq!(p2398.audio_cadence, vec![2002]);
    }

    #[test]
    fn test_ntsc_cadence() {
        let format = OutputFormat::by_name("1080p2997").unwrap();
        assert_eq!(format.audio_cadence, vec![1602, 1601, 1602, 1601, 1602]);
        // 5 帧 = 5 * 1001 / 30000 秒 = 8008 个采样
        assert_eq!(format.cadence_sum(), 8008);

        let p5994 = OutputFormat::by_name("720p5994").unwrap();
        assert_eq!(p5994.audio_cadence.len(), 5);
        assert_eq!(p5994.cadence_sum(), 4004);
    }

    #[test]
    fn test_derived_cadence_conserves_samples() {
        let rate = FrameRate::new(30000, 1001);
        let custom = OutputFormat::new("custom", 1280, 720, FieldMode::Progressive, rate);
        assert_eq!(custom.audio_cadence.len(), 5);
        assert_eq!(custom.cadence_sum(), 8008);
        assert!(custom.audio_cadence.iter().all(|&n| n == 1601 || n == 1602));

        let odd = derive_cadence(44100, FrameRate::new(24, 1));
        assert_eq!(odd.iter().map(|&n| n as u64).sum::<u64>(), 44100 * odd.len() as u64 / 24);
    }

    #[test]
    fn test_unknown_format() {
        assert!(matches!(
            OutputFormat::by_name("4320p12000"),
            Err(PlayerError::ConfigurationError(_))
        ));
    }
}
