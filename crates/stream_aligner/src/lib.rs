//! # Stream Aligner
//!
//! 多路时间戳数据流的时间对齐合并。
//!
//! 负责：
//! - 每路流固定容量的环形缓冲（满时覆盖最旧数据）
//! - 按时间戳全局有序输出，相同时间戳按优先级
//! - 有界等待：缺失样本最多阻塞 `timeout`（数据时间域）
//! - 丢弃计数：迟到 / 时间倒退 / 缓冲区满
//!
//! ## 使用示例
//!
//! ```ignore
//! use stream_aligner::{AlignerConfig, StreamAligner, StreamConfig, Timestamp};
//!
//! let mut aligner = StreamAligner::new(AlignerConfig {
//!     timeout_s: 2.0,
//!     ..Default::default()
//! });
//!
//! let imu = aligner.register_stream(
//!     StreamConfig::new("imu", Timestamp::from_millis(10)).with_buffer_size(200),
//!     |ts, sample: &ImuSample| handle_imu(ts, sample),
//! )?;
//!
//! aligner.push(imu, ts, sample)?;
//! while aligner.step() {}
//! ```

mod aligner;
mod pull;
mod ring_buffer;
mod stream;

pub use aligner::StreamAligner;
pub use pull::{PullAligner, PullSource};
pub use ring_buffer::{Iter, RingBuffer};
pub use stream::{SampleCallback, Stream, StreamBase};

// Re-export contracts types
pub use contracts::{
    AlignerConfig, AlignerError, AlignerSetup, AlignerStatus, StreamConfig, StreamStatus,
    Timestamp,
};
