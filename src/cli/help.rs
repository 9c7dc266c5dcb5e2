use super::guide::{print_current_step, print_next_action};
use chrono::Utc;
use helpdesk::assistant::{Answer, Assistant};
use helpdesk::config::{find_help_path, HelpConfig, HELP_DIR};
use helpdesk::context::SearchStrategy;
use helpdesk::guide::{progress_summary, UserLevel};
use helpdesk::knowledge::{resolve_section, KnowledgeStore};
use helpdesk::matcher::search;
use helpdesk::proactive::{proactive_tip_message, section_display_name, ProactiveSuggestion};
use helpdesk::types::HelpEntry;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

fn absolute(path: &str) -> Result<String, String> {
    let absolute = fs::canonicalize(path).map_err(|e| format!("{}: {}", path, e))?;
    Ok(absolute.to_string_lossy().into_owned())
}

/// Run the init command
pub fn run_init(path: &str, knowledge: Option<&str>) -> Result<(), String> {
    let path = Path::new(path);
    let help_path = path.join(HELP_DIR);

    if help_path.exists() {
        return Err(format!(".helpdesk already exists at {}", help_path.display()));
    }

    if let Some(knowledge) = knowledge {
        let knowledge = absolute(knowledge)?;
        KnowledgeStore::load(Path::new(&knowledge))?;
        HelpConfig::new(help_path.clone()).set("knowledge_path", &knowledge)?;
    }

    let mut assistant = Assistant::init(path)?;
    println!("Initialized .helpdesk at {}", help_path.display());

    if assistant.knowledge().is_some() {
        assistant.preload()?;
        print_cache_summary(&mut assistant);
    }

    Ok(())
}

/// Run the load command
pub fn run_load(path: Option<&str>) -> Result<(), String> {
    let help_path = find_help_path().ok_or("No .helpdesk directory found. Run 'helpdesk init' first.")?;

    if let Some(path) = path {
        let path = absolute(path)?;
        KnowledgeStore::load(Path::new(&path))?;
        HelpConfig::new(help_path.clone()).set("knowledge_path", &path)?;
    }

    let mut assistant = Assistant::open_at(help_path)?;
    let knowledge = assistant
        .knowledge()
        .ok_or("No knowledge loaded. Pass a path or set knowledge_path.")?;
    println!(
        "Loaded {} sections, {} entries",
        knowledge.sections().len(),
        knowledge.entries().len()
    );

    assistant.preload()?;
    print_cache_summary(&mut assistant);

    Ok(())
}

fn print_cache_summary(assistant: &mut Assistant) {
    let stats = assistant.offline().cache_stats();
    if stats.entries_count == 0 {
        println!("Offline cache is empty (see --verbose for details)");
    } else {
        println!(
            "Cached {} entries in {} sections for offline use",
            stats.entries_count, stats.sections_count
        );
    }
}

/// Run the ask command
pub fn run_ask(query: &str, section: Option<&str>, route: Option<&str>) -> Result<(), String> {
    let section = section.or_else(|| route.map(resolve_section));

    let mut assistant = Assistant::open()?;
    let answer = assistant.ask(query, section);
    print_answer(&answer);

    Ok(())
}

/// Run the visit command
pub fn run_visit(section: &str) -> Result<(), String> {
    let mut assistant = Assistant::open()?;
    let suggestion = assistant.visit_section(section);

    let behavior = assistant.behavior().load();
    println!(
        "Visited {} ({} visits)",
        section_display_name(section),
        behavior.visits(section)
    );

    match suggestion {
        Some(s) => print_suggestion(&s),
        None => println!("\n{}", proactive_tip_message(section)),
    }

    Ok(())
}

/// Run the suggest command
pub fn run_suggest(section: &str) -> Result<(), String> {
    let mut assistant = Assistant::open()?;
    let behavior = assistant.behavior().load();
    let (entries, _) = assistant.entries();
    let suggester = assistant.suggester();

    println!("{}\n", section_display_name(section));
    println!(
        "Visits: {}, time spent: {}s{}",
        behavior.visits(section),
        behavior.time_spent(section) / 1000,
        if assistant.behavior().is_user_struggling(section) {
            " (struggling)"
        } else {
            ""
        }
    );

    match suggester.get_proactive_suggestion(&behavior, section, &entries) {
        Some(s) => print_suggestion(&s),
        None => println!("\n{}", proactive_tip_message(section)),
    }

    let last_entry = behavior
        .last_question()
        .and_then(|q| search(q, &entries, assistant.threshold()).into_iter().next())
        .map(|r| r.entry.id);
    let next = suggester.get_suggested_next_steps(section, last_entry.as_deref(), &entries);
    print_entry_list("Next steps", &next);

    if let Some(last) = behavior.last_question() {
        let also = suggester.get_people_also_asked(&behavior, last, &entries);
        print_entry_list("People also asked", &also);
    }

    Ok(())
}

/// Run the chat command
pub fn run_chat(section: Option<&str>) -> Result<(), String> {
    let mut assistant = Assistant::open()?;
    let mut section = section.map(str::to_string);

    if let Some(s) = &section {
        match assistant.visit_section(s) {
            Some(suggestion) => print_suggestion(&suggestion),
            None => println!("{}", proactive_tip_message(s)),
        }
    }
    println!("Ask a question. Commands: next, skip, done, section <id>, +, -, quit\n");

    let stdin = io::stdin();
    let mut last_answer: Option<String> = None;

    loop {
        print!("> ");
        io::stdout().flush().map_err(|e| e.to_string())?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).map_err(|e| e.to_string())? == 0 {
            break;
        }

        match line.trim() {
            "" => continue,
            "quit" | "exit" => break,
            "next" => advance_guide(&mut assistant, false),
            "skip" => advance_guide(&mut assistant, true),
            "done" => match assistant.close_guide() {
                Some(progress) => println!("{}", progress_summary(&progress)),
                None => println!("No guide in progress."),
            },
            "+" | "-" => {
                let helpful = line.trim() == "+";
                match &last_answer {
                    Some(id) if assistant.attach_feedback(id, helpful) => println!("Thanks for the feedback."),
                    _ => println!("Nothing to rate yet."),
                }
            }
            cmd if cmd.starts_with("section ") => {
                let s = cmd.trim_start_matches("section ").trim().to_string();
                match assistant.visit_section(&s) {
                    Some(suggestion) => print_suggestion(&suggestion),
                    None => println!("Now in {}", section_display_name(&s)),
                }
                section = Some(s);
            }
            query => {
                let answer = assistant.ask(query, section.as_deref());
                print_answer(&answer);
                last_answer = Some(answer.message_id.clone());

                if answer.entry.as_ref().is_some_and(|e| e.has_steps()) {
                    println!("\nType 'next' when a step is done or 'skip' to jump it.");
                }
            }
        }
        println!();
    }

    Ok(())
}

fn advance_guide(assistant: &mut Assistant, skip: bool) {
    let Some(progress) = assistant.guide_mut() else {
        println!("No guide in progress.");
        return;
    };

    if let Some(started) = progress.started_at {
        progress.time_spent = (Utc::now() - started).num_seconds().max(0) as u64;
    }

    let step = progress.current_step;
    let moved = if skip {
        progress.skip_step(step)
    } else {
        progress.complete_step(step)
    };
    if !moved {
        println!("Step {} cannot be {}.", step, if skip { "skipped" } else { "completed" });
    }

    let progress = progress.clone();
    println!("{}", progress_summary(&progress));

    if !progress.is_complete() {
        if let Some(entry) = assistant.guide_entry() {
            println!();
            print_current_step(&entry, &progress, UserLevel::default());
        }
    }
    if let Some(action) = assistant.guide_next_action() {
        print_next_action(&action);
    }
}

fn strategy_label(strategy: SearchStrategy) -> &'static str {
    match strategy {
        SearchStrategy::FollowUp => "follow-up",
        SearchStrategy::ContextAware => "context",
        SearchStrategy::Standard => "match",
    }
}

fn print_entry_list(title: &str, entries: &[HelpEntry]) {
    if entries.is_empty() {
        return;
    }
    println!("\n{}:", title);
    for entry in entries {
        println!("  [{}] {}", entry.id, entry.question);
    }
}

fn print_suggestion(suggestion: &ProactiveSuggestion) {
    println!("\n* {}", suggestion.suggestion);
    if let Some(entry) = &suggestion.entry {
        println!("  [{}] {}", entry.id, entry.question);
    }
}

/// Print an answer with everything attached to it
pub fn print_answer(answer: &Answer) {
    if answer.offline {
        println!("(offline)");
    }

    if let Some(entry) = &answer.entry {
        println!(
            "[{}] {}  ({}, score: {:.2})\n",
            entry.id,
            entry.question,
            strategy_label(answer.strategy),
            answer.score
        );
    }

    println!("{}", answer.content);

    if !answer.steps.is_empty() {
        println!();
        for (i, step) in answer.steps.iter().enumerate() {
            println!("  {}. {}", i + 1, step.text);
        }
    }

    if answer.is_contextual {
        if let Some(topic) = &answer.previous_topic {
            println!("\n(continuing from: {})", topic);
        }
    }

    if !answer.suggestions.is_empty() {
        println!("\nTry asking:");
        for s in &answer.suggestions {
            println!("  - {}", s);
        }
    }

    print_entry_list("See also", &answer.alternatives);
    print_entry_list("Next steps", &answer.next_steps);
    print_entry_list("People also asked", &answer.people_also_asked);

    if let Some(suggestion) = &answer.proactive {
        print_suggestion(suggestion);
    }
}
