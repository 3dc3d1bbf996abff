//! 配置校验模块
//!
//! 校验规则：
//! - 字段范围 (derive: timeout_s >= 0, max_streams >= 1, buffer_size >= 1)
//! - 数值有限 (timeout_s / period_s 不可为 NaN / inf)
//! - stream name 非空且唯一
//! - stream 数量 <= max_streams

use std::collections::HashSet;

use ::validator::Validate;
use contracts::{AlignerError, AlignerSetup};

/// 校验 AlignerSetup 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(setup: &AlignerSetup) -> Result<(), AlignerError> {
    validate_finite(setup)?;
    validate_ranges(setup)?;
    validate_stream_names(setup)?;
    validate_stream_count(setup)?;
    Ok(())
}

/// 校验浮点字段为有限值
fn validate_finite(setup: &AlignerSetup) -> Result<(), AlignerError> {
    if !setup.aligner.timeout_s.is_finite() {
        return Err(AlignerError::invalid_config(
            "aligner.timeout_s",
            format!("timeout_s must be finite, got {}", setup.aligner.timeout_s),
        ));
    }
    for (idx, stream) in setup.streams.iter().enumerate() {
        if !stream.period_s.is_finite() {
            return Err(AlignerError::invalid_config(
                format!("streams[{idx}].period_s"),
                format!("period_s must be finite, got {}", stream.period_s),
            ));
        }
    }
    Ok(())
}

/// 校验 derive 声明的范围约束
fn validate_ranges(setup: &AlignerSetup) -> Result<(), AlignerError> {
    setup.validate().map_err(|errors| {
        let field = errors
            .errors()
            .keys()
            .next()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "setup".to_string());
        AlignerError::invalid_config(field, errors.to_string())
    })
}

/// 校验 stream name 非空且唯一
fn validate_stream_names(setup: &AlignerSetup) -> Result<(), AlignerError> {
    let mut seen = HashSet::new();
    for (idx, stream) in setup.streams.iter().enumerate() {
        if stream.name.is_empty() {
            return Err(AlignerError::invalid_config(
                format!("streams[{idx}].name"),
                "stream name cannot be empty",
            ));
        }
        if !seen.insert(stream.name.as_str()) {
            return Err(AlignerError::invalid_config(
                format!("streams[name={}]", stream.name),
                "duplicate stream name",
            ));
        }
    }
    Ok(())
}

/// 校验 stream 数量不超过 slot 表容量
fn validate_stream_count(setup: &AlignerSetup) -> Result<(), AlignerError> {
    if setup.streams.len() > setup.aligner.max_streams {
        return Err(AlignerError::invalid_config(
            "streams",
            format!(
                "{} streams configured but max_streams is {}",
                setup.streams.len(),
                setup.aligner.max_streams
            ),
        ));
    }
    Ok(())
}
