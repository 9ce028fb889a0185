//! Console reporting
//!
//! Pure rendering over finished results: the suite banner, the summary
//! block printed after each configuration, and the final per-mode table
//! with key metrics. Metrics are read from the results, never recomputed.

use std::fmt::Write;

use crate::config::{BenchmarkMode, SuiteConfig};
use crate::models::BenchmarkResult;
use crate::util::units::{format_realtime, format_seconds, format_seconds_list};

const TABLE_WIDTH: usize = 110;
const BANNER_WIDTH: usize = 70;

/// Results grouped by mode, in report order, skipping empty modes
pub fn group_by_mode(results: &[BenchmarkResult]) -> Vec<(BenchmarkMode, Vec<&BenchmarkResult>)> {
    BenchmarkMode::ALL
        .iter()
        .map(|&mode| (mode, results.iter().filter(|r| r.mode == mode).collect::<Vec<_>>()))
        .filter(|(_, group)| !group.is_empty())
        .collect()
}

/// The result with the lowest mean generation time
pub fn fastest<'a>(results: &[&'a BenchmarkResult]) -> Option<&'a BenchmarkResult> {
    results
        .iter()
        .copied()
        .min_by(|a, b| a.metrics.avg_time_sec.total_cmp(&b.metrics.avg_time_sec))
}

/// Fastest configuration of each mode
pub fn fastest_per_mode(results: &[BenchmarkResult]) -> Vec<(BenchmarkMode, &BenchmarkResult)> {
    group_by_mode(results)
        .into_iter()
        .filter_map(|(mode, group)| fastest(&group).map(|r| (mode, r)))
        .collect()
}

/// Longest clip duration across every result, regardless of mode
pub fn longest_duration(results: &[BenchmarkResult]) -> Option<f64> {
    results
        .iter()
        .map(|r| r.configuration.duration_sec)
        .max_by(f64::total_cmp)
}

/// Fastest `mode` result producing a clip of exactly `duration_sec`
///
/// `None` when no configuration of that duration survived in `mode`.
pub fn best_longest_duration(
    results: &[BenchmarkResult],
    mode: BenchmarkMode,
    duration_sec: f64,
) -> Option<&BenchmarkResult> {
    let candidates: Vec<&BenchmarkResult> = results
        .iter()
        .filter(|r| r.mode == mode && r.configuration.duration_sec == duration_sec)
        .collect();
    fastest(&candidates)
}

/// Suite banner shown before any job is submitted
pub fn render_banner(config: &SuiteConfig, modes: &[BenchmarkMode]) -> String {
    let tags: Vec<&str> = modes.iter().map(|m| m.tag()).collect();
    let rule = "=".repeat(BANNER_WIDTH);

    let mut out = String::new();
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "Video Generation Latency Benchmark");
    let _ = writeln!(
        out,
        "Generate: {} -> Upscale: {} @ {}fps",
        config.geometry.generation, config.geometry.output, config.geometry.fps
    );
    let _ = writeln!(out, "Server: {}", config.server);
    let _ = writeln!(out, "Modes: {}", tags.join(", "));
    let _ = writeln!(out, "Warmup runs per config: {}", config.warmup_runs);
    let _ = writeln!(out, "Timed runs per config: {}", config.timed_runs);
    let _ = write!(out, "{}", rule);
    out
}

/// Summary block for one finished configuration
pub fn render_summary(result: &BenchmarkResult) -> String {
    let m = &result.metrics;
    let mut out = String::new();
    let _ = writeln!(out, "[SUMMARY] {}", result.config_name);
    let _ = writeln!(out, "  Warmup times:     {}", format_seconds_list(&result.warmup_times()));
    let _ = writeln!(out, "  Compile overhead: ~{}", format_seconds(m.compile_time_sec));
    let _ = writeln!(
        out,
        "  Avg gen time:     {} ± {}",
        format_seconds(m.avg_time_sec),
        format_seconds(m.std_dev_sec)
    );
    let _ = writeln!(out, "  Frames/sec:       {:.2}", m.fps_generated);
    let _ = writeln!(out, "  Sec/frame:        {:.3}s", m.sec_per_frame);
    let _ = write!(out, "  Realtime factor:  {}", format_realtime(m.realtime_factor));
    out
}

/// Fixed-width results table, one section per mode
pub fn render_table(results: &[BenchmarkResult]) -> String {
    let rule = "-".repeat(TABLE_WIDTH);
    let mut out = String::new();

    for (mode, group) in group_by_mode(results) {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", mode.description().to_uppercase());
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(
            out,
            "{:<20} {:<8} {:<6} {:<10} {:<12} {:<10} {:<8} {:<10}",
            "Config", "Frames", "Steps", "Compile", "Avg Time", "Std Dev", "FPS", "Realtime"
        );
        let _ = writeln!(out, "{}", rule);

        for r in group {
            let m = &r.metrics;
            let _ = writeln!(
                out,
                "{:<20} {:<8} {:<6} {:<10.2} {:<12.2} {:<10.2} {:<8.2} {:<10.2}x",
                r.config_name,
                r.configuration.frames,
                r.configuration.steps,
                m.compile_time_sec,
                m.avg_time_sec,
                m.std_dev_sec,
                m.fps_generated,
                m.realtime_factor
            );
        }
    }

    out
}

/// Fastest configuration and best longest-clip configuration per mode
pub fn render_key_metrics(results: &[BenchmarkResult]) -> String {
    let mut out = String::new();
    if results.is_empty() {
        return out;
    }

    let longest = longest_duration(results);
    let _ = writeln!(out, "KEY METRICS:");
    for (mode, best) in fastest_per_mode(results) {
        let tag = mode.tag().to_uppercase();
        let m = &best.metrics;
        let _ = writeln!(out);
        let _ = writeln!(out, "  {} Fastest: {}", tag, best.config_name);
        let _ = writeln!(
            out,
            "    - {}s video in {}",
            best.configuration.duration_sec,
            format_seconds(m.avg_time_sec)
        );
        let _ = writeln!(out, "    - {} realtime", format_realtime(m.realtime_factor));
        let _ = writeln!(out, "    - Compile overhead: ~{}", format_seconds(m.compile_time_sec));

        if let Some(longest) = longest.and_then(|d| best_longest_duration(results, mode, d)) {
            let _ = writeln!(
                out,
                "  {} {}s Video: {} ({} realtime)",
                tag,
                longest.configuration.duration_sec,
                format_seconds(longest.metrics.avg_time_sec),
                format_realtime(longest.metrics.realtime_factor)
            );
        }
    }

    out
}

/// Complete final report
pub fn render_report(results: &[BenchmarkResult]) -> String {
    let rule = "=".repeat(TABLE_WIDTH);
    let mut out = String::new();
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "FINAL BENCHMARK REPORT");
    let _ = writeln!(out, "{}", rule);
    out.push_str(&render_table(results));
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", rule);
    if results.is_empty() {
        let _ = writeln!(out, "No configurations produced results.");
    } else {
        let _ = writeln!(out);
        out.push_str(&render_key_metrics(results));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::models::{Resolution, RunSample, SamplePhase};

    fn result(mode: BenchmarkMode, name: &str, frames: u32, duration: f64, times: &[f64]) -> BenchmarkResult {
        let warmups = vec![
            RunSample::new(SamplePhase::Warmup, 0, 42, times[0] + 30.0),
            RunSample::new(SamplePhase::Warmup, 1, 42, times[0]),
        ];
        let timed = times
            .iter()
            .enumerate()
            .map(|(i, &t)| RunSample::new(SamplePhase::Timed, i, 1000 + i as u64, t))
            .collect();
        BenchmarkResult::from_samples(
            mode,
            Configuration::new(name, frames, 8, duration),
            Resolution::new(576, 1024),
            Resolution::new(1080, 1920),
            warmups,
            timed,
        )
        .unwrap()
    }

    fn sample_results() -> Vec<BenchmarkResult> {
        vec![
            result(BenchmarkMode::TextImageToVideo, "5s_8steps", 121, 5.0, &[25.0]),
            result(BenchmarkMode::TextToVideo, "5s_8steps", 121, 5.0, &[20.0, 21.0, 19.0]),
            result(BenchmarkMode::TextToVideo, "10s_8steps", 241, 10.0, &[38.0]),
            result(BenchmarkMode::TextToVideo, "10s_10steps", 241, 10.0, &[45.0]),
        ]
    }

    #[test]
    fn test_group_by_mode_orders_t2v_first() {
        let results = sample_results();
        let groups = group_by_mode(&results);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, BenchmarkMode::TextToVideo);
        assert_eq!(groups[0].1.len(), 3);
        assert_eq!(groups[1].0, BenchmarkMode::TextImageToVideo);
    }

    #[test]
    fn test_fastest_per_mode() {
        let results = sample_results();
        let fastest = fastest_per_mode(&results);
        assert_eq!(fastest[0].1.config_name, "t2v_5s_8steps");
        assert_eq!(fastest[1].1.config_name, "ti2v_5s_8steps");
    }

    #[test]
    fn test_best_longest_duration() {
        let results = sample_results();
        assert_eq!(longest_duration(&results), Some(10.0));
        let best = best_longest_duration(&results, BenchmarkMode::TextToVideo, 10.0).unwrap();
        assert_eq!(best.config_name, "t2v_10s_8steps");

        // Only 5 s clips were measured in this mode
        assert!(best_longest_duration(&results, BenchmarkMode::TextImageToVideo, 10.0).is_none());

        assert!(longest_duration(&[]).is_none());
        assert!(best_longest_duration(&[], BenchmarkMode::TextToVideo, 10.0).is_none());
    }

    #[test]
    fn test_key_metrics_skip_mode_without_longest_clip() {
        let results = sample_results();
        let text = render_key_metrics(&results);
        assert!(text.contains("T2V 10s Video:"));
        assert!(!text.contains("TI2V 5s Video"));
        assert!(!text.contains("TI2V 10s Video"));
    }

    #[test]
    fn test_table_layout() {
        let results = sample_results();
        let table = render_table(&results);
        let lines: Vec<&str> = table.lines().collect();

        assert!(lines.contains(&"TEXT-TO-VIDEO (T2V)"));
        assert!(lines.contains(&"TEXT+IMAGE-TO-VIDEO (TI2V)"));
        assert!(lines.iter().any(|l| l.len() == TABLE_WIDTH && l.chars().all(|c| c == '-')));

        let row = lines
            .iter()
            .find(|l| l.starts_with("t2v_5s_8steps"))
            .unwrap();
        assert!(row.starts_with("t2v_5s_8steps        121      8      30.00      20.00        1.00       6.05     0.25      x"));

        let t2v_pos = table.find("TEXT-TO-VIDEO").unwrap();
        let ti2v_pos = table.find("TEXT+IMAGE-TO-VIDEO").unwrap();
        assert!(t2v_pos < ti2v_pos);
    }

    #[test]
    fn test_key_metrics() {
        let results = sample_results();
        let text = render_key_metrics(&results);
        assert!(text.contains("T2V Fastest: t2v_5s_8steps"));
        assert!(text.contains("5s video in 20.00s"));
        assert!(text.contains("T2V 10s Video: 38.00s (0.26x realtime)"));
        assert!(text.contains("TI2V Fastest: ti2v_5s_8steps"));
        assert!(render_key_metrics(&[]).is_empty());
    }

    #[test]
    fn test_summary_block() {
        let results = sample_results();
        let summary = render_summary(&results[1]);
        assert!(summary.starts_with("[SUMMARY] t2v_5s_8steps"));
        assert!(summary.contains("Warmup times:     [50.00s, 20.00s]"));
        assert!(summary.contains("Compile overhead: ~30.00s"));
        assert!(summary.contains("Avg gen time:     20.00s ± 1.00s"));
        assert!(summary.contains("Sec/frame:        0.165s"));
        assert!(summary.contains("Realtime factor:  0.25x"));
    }

    #[test]
    fn test_banner() {
        let config = SuiteConfig::default();
        let banner = render_banner(&config, &BenchmarkMode::ALL);
        assert!(banner.contains("Generate: 576x1024 -> Upscale: 1080x1920 @ 24fps"));
        assert!(banner.contains("Server: http://localhost:8188"));
        assert!(banner.contains("Modes: t2v, ti2v"));
        assert!(banner.contains("Warmup runs per config: 3"));
    }

    #[test]
    fn test_empty_report() {
        let report = render_report(&[]);
        assert!(report.contains("No configurations produced results."));
        assert!(!report.contains("KEY METRICS"));
    }
}
