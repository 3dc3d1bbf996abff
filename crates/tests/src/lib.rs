//! # Integration Tests
//!
//! 跨 crate 集成测试。
//!
//! 负责：
//! - 配置加载 -> 对齐器回放
//! - 多生产者并发写入（外部互斥）
//! - 状态复制 (copy_state) 等价性
//! - Pull 模式合并

#[cfg(test)]
mod config_tests {
    use std::sync::{Arc, Mutex};

    use config_loader::{ConfigFormat, ConfigLoader};
    use stream_aligner::{StreamAligner, Timestamp};

    const SETUP: &str = r#"
        [aligner]
        name = "fusion"
        timeout_s = 1.0
        max_streams = 4

        [[streams]]
        name = "camera"
        period_s = 0.5
        priority = 2
        buffer_size = 8

        [[streams]]
        name = "imu"
        period_s = 0.5
        priority = 1
        buffer_size = 8
    "#;

    fn build(seen: &Arc<Mutex<Vec<String>>>) -> StreamAligner {
        let setup = ConfigLoader::load_from_str(SETUP, ConfigFormat::Toml).unwrap();
        let mut aligner = StreamAligner::new(setup.aligner.clone());
        for config in setup.streams {
            let name = config.name.clone();
            let sink = seen.clone();
            aligner
                .register_stream(config, move |_, _: &u32| sink.lock().unwrap().push(name.clone()))
                .unwrap();
        }
        aligner
    }

    #[test]
    fn test_config_to_aligner() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut aligner = build(&seen);

        assert_eq!(aligner.name(), "fusion");
        assert_eq!(aligner.capacity(), 4);
        assert_eq!(aligner.stream_count(), 2);
        assert_eq!(aligner.timeout(), Timestamp::from_seconds(1.0));

        // camera first, then imu with the same timestamp
        aligner.push(0, Timestamp::from_seconds(1.0), 1u32).unwrap();
        assert!(!aligner.step());
        aligner.push(1, Timestamp::from_seconds(1.0), 2u32).unwrap();
        while aligner.step() {}

        // equal timestamps: lower priority value first
        assert_eq!(*seen.lock().unwrap(), vec!["imu", "camera"]);

        let status = aligner.status();
        assert_eq!(status.name, "fusion");
        assert_eq!(status.current_time, Some(Timestamp::from_seconds(1.0)));
        assert_eq!(status.streams[0].samples_processed, 1);
        assert_eq!(status.streams[1].samples_processed, 1);
    }

    #[test]
    fn test_config_round_trip_keeps_behaviour() {
        let setup = ConfigLoader::load_from_str(SETUP, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&setup).unwrap();
        let reloaded = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();

        assert_eq!(reloaded.aligner.name, setup.aligner.name);
        assert_eq!(reloaded.stream_index("imu"), Some(1));
        assert_eq!(reloaded.streams[0].period(), Timestamp::from_millis(500));
    }

    #[test]
    fn test_wrong_sample_type_is_rejected() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut aligner = build(&seen);

        assert!(aligner
            .push(0, Timestamp::from_seconds(1.0), "not a u32".to_string())
            .is_err());
        assert_eq!(aligner.status().streams[0].samples_received, 0);
    }
}

#[cfg(test)]
mod concurrency_tests {
    use std::sync::{Arc, Mutex};

    use observability::AlignmentMetricsAggregator;
    use stream_aligner::{AlignerConfig, StreamAligner, StreamConfig, Timestamp};
    use tokio::sync::mpsc;

    const STREAMS: usize = 3;
    const SAMPLES: u64 = 50;

    struct Sample {
        stream: usize,
        ts: Timestamp,
        value: u64,
    }

    fn aligner(emitted: &Arc<Mutex<Vec<(Timestamp, usize)>>>) -> StreamAligner {
        let mut aligner = StreamAligner::new(AlignerConfig {
            name: "producers".to_string(),
            timeout_s: 0.5,
            max_streams: STREAMS,
        });
        for stream in 0..STREAMS {
            let sink = emitted.clone();
            aligner
                .register_stream(
                    StreamConfig::new(format!("s{stream}"), Timestamp::from_millis(10))
                        .with_priority(stream as i32)
                        .with_buffer_size(SAMPLES as usize),
                    move |ts, _: &u64| sink.lock().unwrap().push((ts, stream)),
                )
                .unwrap();
        }
        aligner
    }

    fn sample_time(stream: usize, i: u64) -> Timestamp {
        Timestamp::from_millis(10 * i as i64 + stream as i64)
    }

    fn assert_ordered(emitted: &[(Timestamp, usize)]) {
        for pair in emitted.windows(2) {
            assert!(pair[0].0 <= pair[1].0, "out of order: {:?}", pair);
        }
    }

    fn assert_accounted(aligner: &StreamAligner) -> u64 {
        let status = aligner.status();
        let mut late = 0;
        for stream in &status.streams {
            assert_eq!(
                stream.samples_received,
                stream.samples_accounted() + stream.buffer_fill as u64,
                "{stream}"
            );
            assert_eq!(stream.samples_received, SAMPLES);
            late += stream.samples_dropped_late_arriving;
        }
        late
    }

    /// Producers -> channel -> single consumer owning the aligner
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_channel_producers() {
        let (tx, mut rx) = mpsc::channel::<Sample>(16);

        let mut producers = Vec::new();
        for stream in 0..STREAMS {
            let tx = tx.clone();
            producers.push(tokio::spawn(async move {
                for i in 0..SAMPLES {
                    let sample = Sample {
                        stream,
                        ts: sample_time(stream, i),
                        value: i,
                    };
                    if tx.send(sample).await.is_err() {
                        break;
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }
        drop(tx);

        let emitted = Arc::new(Mutex::new(Vec::new()));
        let consumer_emitted = emitted.clone();
        let consumer = tokio::spawn(async move {
            let mut aligner = aligner(&consumer_emitted);
            let mut metrics = AlignmentMetricsAggregator::new();

            while let Some(sample) = rx.recv().await {
                aligner.push(sample.stream, sample.ts, sample.value).unwrap();
                while aligner.step() {
                    metrics.record_emitted("any", aligner.latency());
                }
            }

            for stream in 0..STREAMS {
                aligner.disable_stream(stream).unwrap();
            }
            while aligner.step() {
                metrics.record_emitted("any", aligner.latency());
            }
            observability::record_aligner_status(&aligner.status());
            (aligner, metrics)
        });

        for producer in producers {
            producer.await.unwrap();
        }
        let (aligner, metrics) = consumer.await.unwrap();

        let emitted = emitted.lock().unwrap();
        assert_ordered(&emitted);

        let late = assert_accounted(&aligner);
        assert_eq!(emitted.len() as u64 + late, STREAMS as u64 * SAMPLES);
        assert_eq!(metrics.total_emitted, emitted.len() as u64);
        assert!(aligner.status().streams.iter().all(|s| s.buffer_fill == 0));
    }

    /// Producers share the aligner behind a mutex and step it themselves
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shared_aligner_behind_mutex() {
        let emitted = Arc::new(Mutex::new(Vec::new()));
        let shared = Arc::new(Mutex::new(aligner(&emitted)));

        let mut producers = Vec::new();
        for stream in 0..STREAMS {
            let shared = shared.clone();
            producers.push(tokio::spawn(async move {
                for i in 0..SAMPLES {
                    {
                        let mut aligner = shared.lock().unwrap();
                        aligner.push(stream, sample_time(stream, i), i).unwrap();
                        while aligner.step() {}
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }
        for producer in producers {
            producer.await.unwrap();
        }

        let mut aligner = shared.lock().unwrap();
        for stream in 0..STREAMS {
            aligner.disable_stream(stream).unwrap();
        }
        while aligner.step() {}

        let emitted = emitted.lock().unwrap();
        assert_ordered(&emitted);

        let late = assert_accounted(&aligner);
        assert_eq!(emitted.len() as u64 + late, STREAMS as u64 * SAMPLES);
    }
}

#[cfg(test)]
mod snapshot_tests {
    use std::sync::{Arc, Mutex};

    use stream_aligner::{AlignerConfig, AlignerError, StreamAligner, StreamConfig, Timestamp};

    type Seen = Arc<Mutex<Vec<(Timestamp, String)>>>;

    fn aligner(seen: &Seen) -> StreamAligner {
        let mut aligner = StreamAligner::new(AlignerConfig {
            name: "snapshot".to_string(),
            timeout_s: 2.0,
            max_streams: 3,
        });
        for (name, priority) in [("gps", 0), ("odom", 1)] {
            let sink = seen.clone();
            aligner
                .register_stream(
                    StreamConfig::new(name, Timestamp::from_seconds(1.0))
                        .with_priority(priority)
                        .with_buffer_size(6),
                    move |ts, v: &String| sink.lock().unwrap().push((ts, v.clone())),
                )
                .unwrap();
        }
        aligner
    }

    fn feed(aligner: &mut StreamAligner, samples: &[(usize, f64, &str)]) {
        for &(idx, t, v) in samples {
            aligner
                .push(idx, Timestamp::from_seconds(t), v.to_string())
                .unwrap();
            while aligner.step() {}
        }
    }

    #[test]
    fn test_copy_state_continues_identically() {
        let first_half = [(0, 1.0, "g1"), (1, 1.5, "o1"), (0, 2.0, "g2"), (0, 3.0, "g3")];
        let second_half = [(1, 2.5, "o2"), (1, 3.5, "o3"), (0, 4.0, "g4"), (1, 4.5, "o4")];

        let original_seen = Seen::default();
        let mut original = aligner(&original_seen);
        feed(&mut original, &first_half);

        let copy_seen = Seen::default();
        let mut copy = aligner(&copy_seen);
        copy.copy_state(&original).unwrap();
        assert_eq!(copy.current_time(), original.current_time());
        assert_eq!(copy.latest_time(), original.latest_time());

        original_seen.lock().unwrap().clear();
        feed(&mut original, &second_half);
        feed(&mut copy, &second_half);

        assert!(!original_seen.lock().unwrap().is_empty());
        assert_eq!(*original_seen.lock().unwrap(), *copy_seen.lock().unwrap());

        let a = original.status();
        let b = copy.status();
        for (x, y) in a.streams.iter().zip(&b.streams) {
            assert_eq!(x.samples_received, y.samples_received);
            assert_eq!(x.samples_processed, y.samples_processed);
            assert_eq!(x.buffer_fill, y.buffer_fill);
        }
    }

    #[test]
    fn test_copy_state_into_other_layout_fails_cleanly() {
        let seen = Seen::default();
        let mut original = aligner(&seen);
        feed(&mut original, &[(0, 1.0, "g1")]);

        let mut other = StreamAligner::new(AlignerConfig::default());
        other
            .register_silent_stream::<String>(StreamConfig::new("gps", Timestamp::from_seconds(1.0)))
            .unwrap();

        assert!(matches!(
            other.copy_state(&original),
            Err(AlignerError::StructuralMismatch { .. })
        ));
        assert_eq!(other.current_time(), None);
    }
}

#[cfg(test)]
mod pull_tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use stream_aligner::{AlignerConfig, PullAligner, StreamConfig, Timestamp};

    fn recorded(times: &[f64]) -> impl FnMut() -> Option<(Timestamp, f64)> + Send + 'static {
        let mut log: VecDeque<(Timestamp, f64)> = times
            .iter()
            .map(|&t| (Timestamp::from_seconds(t), t))
            .collect();
        move || log.pop_front()
    }

    #[test]
    fn test_pull_merges_recorded_logs() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut aligner = PullAligner::new(AlignerConfig {
            name: "pull".to_string(),
            timeout_s: 1.0,
            max_streams: 2,
        });

        for (name, times) in [("a", vec![0.1, 0.4, 0.7, 1.0]), ("b", vec![0.2, 0.3, 0.9])] {
            let sink = seen.clone();
            aligner
                .register_pull_stream(
                    StreamConfig::new(name, Timestamp::from_millis(300)).with_buffer_size(8),
                    recorded(&times),
                    move |_, v: &f64| sink.lock().unwrap().push(*v),
                )
                .unwrap();
        }

        while aligner.pull().unwrap() {
            while aligner.step() {}
        }
        for idx in 0..2 {
            aligner.aligner_mut().disable_stream(idx).unwrap();
        }
        while aligner.step() {}

        assert_eq!(
            *seen.lock().unwrap(),
            vec![0.1, 0.2, 0.3, 0.4, 0.7, 0.9, 1.0]
        );
        assert_eq!(aligner.aligner().status().samples_dropped_late_arriving, 0);
    }
}
