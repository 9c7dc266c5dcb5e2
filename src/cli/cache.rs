use chrono::{TimeZone, Utc};
use helpdesk::assistant::Assistant;
use helpdesk::offline::ConnectivityEvent;
use helpdesk::proactive::section_display_name;
use log::warn;

fn format_time(ms: Option<i64>) -> String {
    ms.and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string())
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or(text)
}

/// Run the search command
pub fn run_search(query: &str, section: Option<&str>) -> Result<(), String> {
    let mut assistant = Assistant::open()?;
    let results = assistant.offline().search(query, section);

    if results.is_empty() {
        println!("No cached entries match.");
        return Ok(());
    }

    for entry in results {
        println!("[{}] {}", entry.id, entry.question);
        println!("    {}\n", first_line(&entry.answer));
    }

    Ok(())
}

/// Run the status command
pub fn run_status() -> Result<(), String> {
    let mut assistant = Assistant::open()?;
    let status = assistant.offline().get_status();

    println!("Connectivity:  {}", if status.is_online { "online" } else { "offline" });
    println!("Last sync:     {}", format_time(status.last_sync));
    println!("Sync pending:  {}", if status.pending_sync { "yes" } else { "no" });
    if let Some(fingerprint) = &status.fingerprint {
        println!("Cached data:   {}", fingerprint);
    }

    let live = assistant.knowledge().map(|k| k.fingerprint());
    match (live, &status.fingerprint) {
        (Some(live), Some(cached)) if live != *cached => {
            println!("\nKnowledge changed since the last sync. Run 'helpdesk online' or 'helpdesk load'.")
        }
        (None, _) => println!("\nNo live knowledge; answers come from the offline cache."),
        _ => {}
    }

    Ok(())
}

/// Run the online command
pub fn run_online() -> Result<(), String> {
    let mut assistant = Assistant::open()?;
    let before = assistant.offline().get_status().fingerprint;
    assistant.set_connectivity(ConnectivityEvent::Online);

    let status = assistant.offline().get_status();
    println!("Online");
    if assistant.knowledge().is_none() {
        println!("No live knowledge to sync from");
    } else if status.fingerprint != before {
        println!("Offline cache refreshed at {}", format_time(status.last_sync));
    } else {
        println!("Offline cache already up to date");
    }

    Ok(())
}

/// Run the offline command
pub fn run_offline() -> Result<(), String> {
    let mut assistant = Assistant::open()?;
    assistant.set_connectivity(ConnectivityEvent::Offline);

    let stats = assistant.offline().cache_stats();
    println!("Offline; answering from {} cached entries", stats.entries_count);

    Ok(())
}

/// Run the stats command
pub fn run_stats() -> Result<(), String> {
    let mut assistant = Assistant::open()?;
    let stats = assistant.offline().cache_stats();

    println!("Help Statistics");
    println!("===============\n");

    println!("Cached entries:  {}", stats.entries_count);
    println!("Cached sections: {}", stats.sections_count);
    println!("Last sync:       {}", format_time(stats.last_sync));
    println!("Online:          {}", if stats.is_online { "yes" } else { "no" });

    let keywords = assistant.offline().keyword_counts();
    if !keywords.is_empty() {
        println!("\nTop keywords:");
        for (keyword, count) in keywords.iter().take(10) {
            println!("  {:20} {}", keyword, count);
        }
    }

    let behavior = assistant.behavior().load();
    let mut sections: Vec<_> = behavior.section_visits.iter().collect();
    sections.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

    if !sections.is_empty() {
        println!("\nSections visited:");
        for (section, visits) in sections {
            let marker = if assistant.behavior().is_user_struggling(section) {
                " *"
            } else {
                ""
            };
            println!(
                "  {:24} {:3} visits {:6}s{}",
                section_display_name(section),
                visits,
                behavior.time_spent(section) / 1000,
                marker
            );
        }
        println!("\nStruggling indicators: {}", behavior.struggling_indicators);
    }

    let common = assistant.behavior().most_common_questions(5);
    if !common.is_empty() {
        println!("\nMost asked:");
        for (question, count) in common {
            println!("  {:3}  {}", count, question);
        }
    }

    Ok(())
}

/// Run the export command
pub fn run_export(format: &str) -> Result<(), String> {
    let mut assistant = Assistant::open()?;
    let entries = assistant.offline().get_entries();

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&entries).map_err(|e| e.to_string())?;
            println!("{}", json);
        }
        "md" | "markdown" => {
            for entry in entries {
                println!("## [{}] {}\n", entry.id, entry.question);
                if let Some(section) = &entry.section {
                    println!("*Section: {}*\n", section_display_name(section));
                }
                println!("{}\n", entry.answer);
                for (i, step) in entry.steps.iter().enumerate() {
                    println!("{}. {}", i + 1, step.text);
                }
                if !entry.steps.is_empty() {
                    println!();
                }
                println!("---\n");
            }
        }
        _ => return Err(format!("Unknown format: {}. Use 'json' or 'md'.", format)),
    }

    Ok(())
}

/// Run the clear command. With neither flag, clears both.
pub fn run_clear(behavior: bool, cache: bool) -> Result<(), String> {
    let both = !behavior && !cache;
    let mut assistant = Assistant::open()?;

    if behavior || both {
        match assistant.behavior().clear() {
            Ok(()) => println!("Cleared behavior data"),
            Err(e) => warn!("Could not clear behavior data: {}", e),
        }
    }
    if cache || both {
        if assistant.offline().clear_cache() {
            println!("Cleared offline cache");
        } else {
            println!("Offline cache unavailable; nothing cleared");
        }
    }

    Ok(())
}
