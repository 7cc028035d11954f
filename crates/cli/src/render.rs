//! Human-readable table output.

use vigil_api::{Ack, DashboardStats, HealthReport, MonitoringStatus, Question, Website};
use vigil_core::{percent, Summary};
use vigil_monitor::ResultsFrame;
use vigil_search::ViewQuery;

fn trunc(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

pub fn clear_screen() {
    print!("\x1b[2J\x1b[H");
}

pub fn frame(f: &ResultsFrame, query: &ViewQuery) {
    println!(
        "Total Misrepresentations: {}   Affected Websites: {}   Recent Issues: {}",
        f.tiles.total_misrepresentations, f.tiles.affected_websites, f.tiles.recent_issues
    );
    let mut scope = format!("sort: {}", query.sort);
    if query.misrepresentations_only {
        scope.push_str(", misrepresentations only");
    }
    if !query.text.trim().is_empty() {
        scope.push_str(&format!(", filter: {:?}", query.text.trim()));
    }
    println!("Showing {} of {} results ({})\n", f.shown, f.total, scope);
    if f.rows.is_empty() {
        println!("No analysis results found.");
        return;
    }
    println!("{:<6} {:<22} {:<40} {:<10} {:<9} {:<7} {}", "ID", "WEBSITE", "QUESTION", "SERVICE", "ACCURACY", "MISREP", "ANALYZED");
    for r in &f.rows {
        println!(
            "{:<6} {:<22} {:<40} {:<10} {:<9} {:<7} {}",
            r.id,
            trunc(&r.website_name, 22),
            trunc(&r.question_text, 40),
            trunc(&r.llm_service, 10),
            format!("{} {}", r.accuracy, &r.severity.label()[..1]),
            if r.misrepresentation_detected { "yes" } else { "no" },
            r.analyzed_at
        );
    }
}

pub fn summary(s: &Summary) {
    println!("Total Misrepresentations: {}", s.total_misrepresentations);
    println!("Affected Websites:        {}", s.affected_websites());
    println!("Recent Issues:            {}\n", s.recent_issues());
    if !s.by_website.is_empty() {
        println!("{:<28} {:<40} {}", "WEBSITE", "URL", "MISREPRESENTATIONS");
        for w in &s.by_website {
            println!("{:<28} {:<40} {}", trunc(&w.name, 28), trunc(&w.url, 40), w.misrepresentation_count);
        }
    }
    if !s.recent_misrepresentations.is_empty() {
        println!("\nRecent:");
        for r in &s.recent_misrepresentations {
            println!("  {}  {:<22} {:>6}  {}", r.analyzed_at, trunc(&r.website_name, 22), percent(r.accuracy_score), trunc(&r.question_text, 60));
        }
    }
}

pub fn websites(sites: &[Website]) {
    if sites.is_empty() {
        println!("No websites.");
        return;
    }
    println!("{:<5} {:<24} {:<40} {:<8} {}", "ID", "NAME", "URL", "ACTIVE", "LAST SCRAPED");
    for w in sites {
        println!(
            "{:<5} {:<24} {:<40} {:<8} {}",
            w.id,
            trunc(&w.name, 24),
            trunc(&w.url, 40),
            if w.is_active { "yes" } else { "no" },
            w.last_scraped.as_deref().unwrap_or("never")
        );
    }
}

pub fn questions(qs: &[Question]) {
    if qs.is_empty() {
        println!("No questions.");
        return;
    }
    println!("{:<5} {:<12} {}", "ID", "CATEGORY", "QUESTION");
    for q in qs {
        println!("{:<5} {:<12} {}", q.id, q.category.as_deref().unwrap_or("-"), q.question_text);
    }
}

pub fn ack(a: &Ack) {
    let mark = if a.success { "ok" } else { "failed" };
    match a.id {
        Some(id) => println!("{}: {} (id {})", mark, a.message, id),
        None => println!("{}: {}", mark, a.message),
    }
}

pub fn monitoring_status(s: &MonitoringStatus) {
    println!("running:         {}", s.is_running);
    println!("session:         {}", s.current_session_id.map(|id| id.to_string()).unwrap_or_else(|| "-".into()));
    println!("scheduled jobs:  {}", s.scheduled_jobs);
    println!("active websites: {}", s.active_websites);
}

pub fn health(h: &HealthReport) {
    let flag = |ok: bool| if ok { "ok" } else { "FAIL" };
    println!("status:      {} ({})", h.status, h.timestamp);
    println!("database:    {}", flag(h.components.database));
    println!("llm client:  {}", flag(h.components.llm_client));
    println!("web scraper: {}", flag(h.components.web_scraper));
}

pub fn stats(s: &DashboardStats) {
    println!("websites:            {}", s.total_websites);
    println!("analyses:            {}", s.total_analyses);
    println!("misrepresentations:  {}", s.total_misrepresentations);
    println!("last 24h:            {}", s.recent_activity);
    println!("average accuracy:    {}", percent(s.average_accuracy));
    println!("misrepresentation %: {:.2}%", s.misrepresentation_rate);
}
