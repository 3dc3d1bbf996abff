//! Stream Aligner 指标收集模块
//!
//! 基于 AlignerStatus 发布 gauge，并在内存中统计输出延迟。

use std::collections::BTreeMap;

use contracts::{AlignerStatus, Timestamp};
use metrics::{gauge, histogram};

/// 从 AlignerStatus 发布指标
///
/// 计数器类字段以 gauge 形式发布（快照值），由调用方按需周期性调用。
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_aligner_status;
///
/// while aligner.step() {}
/// record_aligner_status(&aligner.status());
/// ```
pub fn record_aligner_status(status: &AlignerStatus) {
    let aligner = status.name.clone();

    // 对齐延迟 (latest - current)
    gauge!("stream_aligner_latency_seconds", "aligner" => aligner.clone())
        .set(status.latency().as_seconds());

    gauge!("stream_aligner_dropped_late", "aligner" => aligner.clone())
        .set(status.samples_dropped_late_arriving as f64);

    if let Some(current) = status.current_time {
        gauge!("stream_aligner_current_time_seconds", "aligner" => aligner.clone())
            .set(current.as_seconds());
    }

    // 各流缓冲区与计数
    for (_, stream) in status.active_streams() {
        let labels = [
            ("aligner", aligner.clone()),
            ("stream", stream.name.clone()),
        ];
        gauge!("stream_aligner_buffer_fill", &labels).set(stream.buffer_fill as f64);
        gauge!("stream_aligner_buffer_size", &labels).set(stream.buffer_size as f64);
        gauge!("stream_aligner_stream_received", &labels).set(stream.samples_received as f64);
        gauge!("stream_aligner_stream_processed", &labels).set(stream.samples_processed as f64);
        gauge!("stream_aligner_stream_dropped_buffer_full", &labels)
            .set(stream.samples_dropped_buffer_full as f64);
        gauge!("stream_aligner_stream_dropped_late", &labels)
            .set(stream.samples_dropped_late_arriving as f64);
        gauge!("stream_aligner_stream_backward_in_time", &labels)
            .set(stream.samples_backward_in_time as f64);
    }
}

/// 记录单个样本输出时的延迟 (latest - 样本时间)
pub fn record_sample_latency(stream: &str, latency: Timestamp) {
    histogram!(
        "stream_aligner_sample_latency_seconds",
        "stream" => stream.to_string()
    )
    .record(latency.as_seconds());
}

/// 对齐输出聚合器
///
/// 在内存中聚合输出样本数与延迟，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct AlignmentMetricsAggregator {
    /// 输出样本总数
    pub total_emitted: u64,

    /// 全部样本的延迟统计 (秒)
    pub latency: LatencyStats,

    /// 各流输出样本数
    pub emitted_per_stream: BTreeMap<String, u64>,

    /// 各流延迟统计 (秒)
    pub latency_per_stream: BTreeMap<String, LatencyStats>,
}

impl AlignmentMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个输出样本
    pub fn record_emitted(&mut self, stream: &str, latency: Timestamp) {
        self.total_emitted += 1;
        *self.emitted_per_stream.entry(stream.to_string()).or_insert(0) += 1;

        let seconds = latency.as_seconds();
        self.latency.push(seconds);
        self.latency_per_stream
            .entry(stream.to_string())
            .or_default()
            .push(seconds);
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_emitted: self.total_emitted,
            latency_s: StatsSummary::from(&self.latency),
            streams: self
                .emitted_per_stream
                .iter()
                .map(|(name, count)| {
                    let latency = self
                        .latency_per_stream
                        .get(name)
                        .map(StatsSummary::from)
                        .unwrap_or_default();
                    (name.clone(), (*count, latency))
                })
                .collect(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_emitted: u64,
    pub latency_s: StatsSummary,
    /// stream -> (输出样本数, 延迟统计)
    pub streams: BTreeMap<String, (u64, StatsSummary)>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Alignment Summary ===")?;
        writeln!(f, "Emitted samples: {}", self.total_emitted)?;
        writeln!(f, "Latency (s): {}", self.latency_s)?;

        if !self.streams.is_empty() {
            writeln!(f, "Per stream:")?;
            for (stream, (count, latency)) in &self.streams {
                writeln!(f, "  {stream}: {count} emitted, latency {latency}")?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&LatencyStats> for StatsSummary {
    fn from(stats: &LatencyStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.6}, max={:.6}, mean={:.6}, std={:.6} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线延迟统计 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct LatencyStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl LatencyStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

impl std::fmt::Display for LatencyStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&StatsSummary::from(self), f)
    }
}
