use std::time::Instant;

use vigil_core::AnalysisResult;
use vigil_search::{display_list, SortKey, ViewQuery};

fn gen_result(i: usize) -> AnalysisResult {
    let site = format!("site-{:03}", i % 250);
    AnalysisResult {
        id: i as i64,
        website_url: format!("https://{}.example.gov", site),
        website_name: site,
        content_title: format!("page {}", i % 40),
        question_text: format!("What does program {} provide?", i % 1000),
        llm_service: if i % 2 == 0 { "openai".into() } else { "anthropic".into() },
        response_text: String::new(),
        accuracy_score: (i % 100) as f64 / 100.0,
        misrepresentation_detected: i % 4 == 0,
        analyzed_at: format!("2024-{:02}-{:02} {:02}:00:00", 1 + i % 12, 1 + i % 28, i % 24),
        analysis_details: None,
    }
}

fn percentile_us(xs: &mut [u128], p: f64) -> u128 {
    if xs.is_empty() {
        return 0;
    }
    xs.sort_unstable();
    let idx = ((xs.len() as f64 - 1.0) * p).round() as usize;
    xs[idx]
}

fn main() {
    let n: usize = std::env::var("VIGIL_BENCH_DOCS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(100_000);
    let rounds: usize = std::env::var("VIGIL_BENCH_ROUNDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(20)
        .max(1);

    eprintln!("building result set: {} rows", n);
    let t0 = Instant::now();
    let results: Vec<AnalysisResult> = (0..n).map(gen_result).collect();
    println!("build: {:.1}ms rows={}", t0.elapsed().as_secs_f64() * 1_000.0, n);

    let mut run = |label: &str, q: ViewQuery| {
        let mut times: Vec<u128> = Vec::with_capacity(rounds);
        let mut shown = 0;
        for _ in 0..rounds {
            let t = Instant::now();
            shown = display_list(&results, &q).len();
            times.push(t.elapsed().as_micros());
        }
        let p50 = percentile_us(&mut times.clone(), 0.50) as f64 / 1000.0;
        let p99 = percentile_us(&mut times, 0.99) as f64 / 1000.0;
        println!("{}: p50={:.3}ms p99={:.3}ms shown={} ({} rounds)", label, p50, p99, shown, rounds);
    };

    for sort in SortKey::ALL {
        run(&format!("sort={}", sort), ViewQuery { sort, ..Default::default() });
        run(&format!("sort={} misrep-only", sort), ViewQuery { sort, misrepresentations_only: true, text: String::new() });
    }
    run("text=program 42", ViewQuery { text: "program 42".into(), ..Default::default() });
}

#[cfg(test)]
mod tests {
    use super::percentile_us;

    #[test]
    fn percentile_of_no_samples_is_zero() {
        assert_eq!(percentile_us(&mut [], 0.99), 0);
        assert_eq!(percentile_us(&mut [30, 10, 20], 0.50), 20);
    }
}
