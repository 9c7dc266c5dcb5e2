use helpdesk::assistant::Assistant;
use helpdesk::guide::{
    adapt_explanation, detect_stuckness, enrich_steps, generate_reminders, progress_summary, step_context,
    Difficulty, GuideProgress, NextAction, NextActionKind, ProgressiveStep, StepStatus, UserLevel,
};
use helpdesk::types::HelpEntry;

/// Run the guide command
pub fn run_guide(entry_id: &str, done: &str, skip: &str, minutes: u64, level: &str) -> Result<(), String> {
    let level = parse_level(level)?;
    let done = parse_steps(done)?;
    let skip = parse_steps(skip)?;

    let mut assistant = Assistant::open()?;
    assistant.open_guide(entry_id)?;

    let progress = assistant.guide_mut().ok_or("Guide did not open")?;
    for step in done {
        if !progress.complete_step(step) {
            return Err(format!("Step {} is out of range", step));
        }
    }
    for step in skip {
        if !progress.skip_step(step) {
            return Err(format!("Step {} cannot be skipped", step));
        }
    }
    progress.add_time(minutes * 60);

    let progress = progress.clone();
    let entry = assistant.guide_entry().ok_or("Guide entry disappeared")?;

    print_guide(&entry, &progress, level);
    if let Some(action) = assistant.guide_next_action() {
        print_next_action(&action);
    }

    Ok(())
}

fn parse_level(level: &str) -> Result<UserLevel, String> {
    match level {
        "beginner" => Ok(UserLevel::Beginner),
        "intermediate" => Ok(UserLevel::Intermediate),
        "advanced" => Ok(UserLevel::Advanced),
        other => Err(format!(
            "Unknown level '{}'. Use beginner, intermediate or advanced.",
            other
        )),
    }
}

fn parse_steps(list: &str) -> Result<Vec<usize>, String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(|_| format!("Invalid step number: {}", s)))
        .collect()
}

fn difficulty_label(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Easy => "easy",
        Difficulty::Medium => "medium",
        Difficulty::Hard => "hard",
    }
}

/// Full guide: summary, every step with its status, detail for the current one
pub fn print_guide(entry: &HelpEntry, progress: &GuideProgress, level: UserLevel) {
    println!("{}\n", entry.question);
    println!("{}\n", progress_summary(progress));

    for step in enrich_steps(entry, Some(progress)) {
        let marker = match progress.step_status(step.step_number) {
            StepStatus::Completed => "[x]",
            StepStatus::Skipped => "[-]",
            StepStatus::Pending if step.is_current_step => "[>]",
            StepStatus::Pending => "[ ]",
        };
        println!("{} {}. {}", marker, step.step_number, step.text);

        if step.is_current_step && !progress.is_complete() {
            print_step_detail(entry, &step, level);
        }
    }

    if let Some(stuck) = detect_stuckness(progress) {
        println!("\n! {}", stuck.reason);
    }
}

/// Detail for the step the guide is on
pub fn print_current_step(entry: &HelpEntry, progress: &GuideProgress, level: UserLevel) {
    let current = enrich_steps(entry, Some(progress))
        .into_iter()
        .find(|s| s.is_current_step);

    if let Some(step) = current {
        println!("{}. {}", step.step_number, step.text);
        print_step_detail(entry, &step, level);
    }
}

fn print_step_detail(entry: &HelpEntry, step: &ProgressiveStep, level: UserLevel) {
    let context = step_context(step);
    println!(
        "    {} (~{}, {})",
        context.title,
        step.estimated_time,
        difficulty_label(step.difficulty)
    );
    println!("    {}", context.motivation);

    if level != UserLevel::Intermediate {
        if let Some(raw) = entry.steps.get(step.step_number - 1) {
            for line in adapt_explanation(raw, level).lines().filter(|l| !l.is_empty()) {
                println!("    {}", line);
            }
        }
    }

    if let Some(image) = &step.image {
        println!("    image: {}", image);
    }
    for tip in &step.tips {
        println!("    tip: {}", tip);
    }
    for error in &step.common_errors {
        println!("    watch out: {}", error);
    }
    for reminder in generate_reminders(step) {
        println!("    reminder: {}", reminder);
    }
    if let Some(preview) = &step.next_step_preview {
        println!("    {}", preview);
    }
    if !context.related_questions.is_empty() {
        println!("    related: {}", context.related_questions.join(" | "));
    }
}

pub fn print_next_action(action: &NextAction) {
    let label = match action.kind {
        NextActionKind::Continue => "continue",
        NextActionKind::Restart => "restart",
        NextActionKind::Related => "related",
        NextActionKind::Support => "support",
    };
    println!("\n[{}] {}", label, action.message);
    if let Some(entry) = &action.related_entry {
        println!("    helpdesk guide {}", entry.id);
    }
}
