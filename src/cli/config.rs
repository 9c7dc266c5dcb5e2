use helpdesk::config::{find_help_path, get_global_config, set_global_config, HelpConfig, CONFIG_KEYS};

/// Run the config command
pub fn run_config(key: Option<&str>, value: Option<&str>, global: bool) -> Result<(), String> {
    if global {
        return run_global(key, value);
    }

    let help_path = find_help_path().ok_or("No .helpdesk directory found. Run 'helpdesk init' first.")?;
    let mut config = HelpConfig::new(help_path);

    match (key, value) {
        (None, None) => {
            println!("Current configuration:\n");
            for k in CONFIG_KEYS {
                match config.get(k) {
                    Some(v) => println!("  {:22} {}", k, v),
                    None => println!("  {:22} (not set)", k),
                }
            }

            let workflows = &config.settings().workflows;
            if !workflows.0.is_empty() {
                println!("\nWorkflows:");
                for (section, ids) in &workflows.0 {
                    println!("  {:22} {}", section, ids.join(" -> "));
                }
            }

            if let Some(path) = config.knowledge_path() {
                println!("\nKnowledge resolves to {}", path.display());
            }
        }
        (Some(k), None) => match config.get(k) {
            Some(v) => println!("{}: {}", k, v),
            None => println!("{}: (not set)", k),
        },
        (Some(k), Some(v)) => {
            config.set(k, v).map_err(|e| format!("Failed to save: {}", e))?;
            println!("Set {} = {}", k, v);
        }
        (None, Some(_)) => {
            return Err("Key required when setting a value".to_string());
        }
    }

    Ok(())
}

fn run_global(key: Option<&str>, value: Option<&str>) -> Result<(), String> {
    let config = get_global_config();

    match (key, value) {
        (None, None) => {
            if config.is_empty() {
                println!("No global configuration.");
                return Ok(());
            }
            println!("Global configuration:\n");
            let mut keys: Vec<_> = config.iter().collect();
            keys.sort();
            for (k, v) in keys {
                println!("  {:22} {}", k, v);
            }
        }
        (Some(k), None) => match config.get(k) {
            Some(v) => println!("{}: {}", k, v),
            None => println!("{}: (not set)", k),
        },
        (Some(k), Some(v)) => {
            set_global_config(k, v).map_err(|e| format!("Failed to save: {}", e))?;
            println!("Set global {} = {}", k, v);
        }
        (None, Some(_)) => {
            return Err("Key required when setting a value".to_string());
        }
    }

    Ok(())
}
